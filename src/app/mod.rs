pub mod config;
pub mod tracing;

pub use config::{Cli, PipelineConfig};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::caller_info;
use crate::domain::LogEntry;
use crate::logger::Logger;

/// Binary entry point: parse arguments, assemble the logger, emit entries.
pub async fn main() -> anyhow::Result<()> {
    tracing::init_tracing(::tracing::Level::WARN)?;
    let cli = Cli::parse();
    run(cli).await
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.load_config().context("failed to load pipeline configuration")?;
    let logger = config
        .build_logger()
        .context("failed to assemble logger")?;
    ::tracing::debug!(logger = ?logger, "starting rask-log-pipeline v{}", crate::VERSION);

    if !cli.message.is_empty() {
        emit(&logger, &cli, cli.message.join(" ")).await?;
    }

    if cli.stdin {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            emit(&logger, &cli, line).await?;
        }
    }

    logger.close().await;
    Ok(())
}

async fn emit(logger: &Logger, cli: &Cli, message: String) -> anyhow::Result<()> {
    let mut entry = LogEntry::new(cli.entry_level, message).with_caller(caller_info!());
    for (key, value) in &cli.properties {
        entry.set_property(key.clone(), value.clone());
    }
    logger.log(entry).await?;
    Ok(())
}
