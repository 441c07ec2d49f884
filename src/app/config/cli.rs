use clap::Parser;
use std::path::PathBuf;

use super::PipelineConfig;
use crate::dispatch::ProcessingMode;
use crate::domain::{ConfigError, LogLevel};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(long, short, env = "RASK_LOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logger threshold, overrides the configuration file
    #[arg(long)]
    pub level: Option<LogLevel>,

    /// Processing mode (background, synchronous, fire-and-forget)
    #[arg(long)]
    pub mode: Option<ProcessingMode>,

    /// Severity of the entries emitted by this invocation
    #[arg(long, default_value = "info")]
    pub entry_level: LogLevel,

    /// Extended property attached to every entry, as key=value
    #[arg(long = "property", short = 'p', value_parser = parse_property)]
    pub properties: Vec<(String, String)>,

    /// Log every line read from stdin as its own entry
    #[arg(long)]
    pub stdin: bool,

    /// Message to log
    pub message: Vec<String>,
}

impl Cli {
    /// Loads the configuration file (or defaults) and applies command-line
    /// overrides on top.
    pub fn load_config(&self) -> Result<PipelineConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::from_env()?,
        };

        if let Some(level) = self.level {
            config.level = level;
        }
        if let Some(mode) = self.mode {
            config.processing_mode = mode;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty property name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        let cli = Cli::parse_from([
            "rask-log-pipeline",
            "--level",
            "debug",
            "--mode",
            "synchronous",
            "-p",
            "request_id=abc",
            "-p",
            "tenant=a=b",
            "disk",
            "almost",
            "full",
        ]);

        assert_eq!(cli.level, Some(LogLevel::Debug));
        assert_eq!(cli.mode, Some(ProcessingMode::Synchronous));
        assert_eq!(cli.entry_level, LogLevel::Info);
        assert_eq!(
            cli.properties,
            vec![
                ("request_id".to_string(), "abc".to_string()),
                ("tenant".to_string(), "a=b".to_string()),
            ]
        );
        assert_eq!(cli.message.join(" "), "disk almost full");
    }

    #[test]
    fn test_property_requires_key() {
        assert!(parse_property("novalue").is_err());
        assert!(parse_property("=x").is_err());
        assert_eq!(
            parse_property("k=").unwrap(),
            ("k".to_string(), String::new())
        );
    }
}
