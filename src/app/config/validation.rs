use std::collections::HashSet;

use super::groups::{ErrorHandlerKind, SinkConfig};
use super::PipelineConfig;
use crate::dispatch::RetryConfig;
use crate::domain::ConfigError;
use crate::sink::rolling::MAX_FILE_SIZE_KILOBYTES;

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.level.is_defined() {
            return Err(ConfigError::InvalidLevel(self.level.to_string()));
        }

        if self.max_write_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_write_attempts must be greater than 0".to_string(),
            ));
        }

        if self.error_handler == ErrorHandlerKind::Retry {
            RetryConfig::from(&self.retry).validate()?;
        }

        let mut names = HashSet::new();
        for (index, sink) in self.sinks.iter().enumerate() {
            validate_sink(sink, index)?;

            let name = sink.name(index);
            if !names.insert(name.clone()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "Duplicate sink name '{name}'"
                )));
            }
        }

        Ok(())
    }
}

fn validate_sink(sink: &SinkConfig, index: usize) -> Result<(), ConfigError> {
    let level = sink.level();
    if !level.is_defined() {
        return Err(ConfigError::InvalidLevel(format!(
            "{level} (sink {})",
            sink.name(index)
        )));
    }

    if let Some(millis) = sink.timeout_ms()
        && millis < 0
    {
        return Err(ConfigError::NegativeTimeout(millis));
    }

    let path = match sink {
        SinkConfig::File(file) => Some(&file.path),
        SinkConfig::RollingFile(rolling) => Some(&rolling.path),
        SinkConfig::Console(_) | SinkConfig::Debug(_) => None,
    };
    if let Some(path) = path
        && path.as_os_str().is_empty()
    {
        return Err(ConfigError::InvalidConfig(format!(
            "Sink '{}' requires a path",
            sink.name(index)
        )));
    }

    if let SinkConfig::RollingFile(rolling) = sink
        && !(0..=MAX_FILE_SIZE_KILOBYTES).contains(&rolling.max_file_size_kilobytes)
    {
        return Err(ConfigError::OutOfRange {
            field: "max_file_size_kilobytes",
            value: rolling.max_file_size_kilobytes,
            min: 0,
            max: MAX_FILE_SIZE_KILOBYTES,
        });
    }

    Ok(())
}
