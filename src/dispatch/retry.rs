use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::failure::{ErrorHandler, SinkFailure};
use crate::domain::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    #[default]
    ExponentialBackoff,
    LinearBackoff,
    FixedDelay,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per entry and sink, the first write included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: RetryStrategy,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            strategy: RetryStrategy::ExponentialBackoff,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        if self.base_delay > self.max_delay {
            return Err(ConfigError::InvalidConfig(
                "retry base_delay must not exceed max_delay".to_string(),
            ));
        }
        Ok(())
    }

    /// Delay before retry number `attempt` (0 for the first retry).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_millis = self.base_delay.as_millis() as u64;
        let delay = match self.strategy {
            RetryStrategy::ExponentialBackoff => {
                let multiplier = 2_u64.checked_pow(attempt).unwrap_or(u64::MAX);
                Duration::from_millis(base_millis.saturating_mul(multiplier))
            }
            RetryStrategy::LinearBackoff => {
                Duration::from_millis(base_millis.saturating_mul(u64::from(attempt) + 1))
            }
            RetryStrategy::FixedDelay => self.base_delay,
        };

        let capped = delay.min(self.max_delay);
        if self.jitter {
            apply_jitter(capped)
        } else {
            capped
        }
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let mut rng = rand::rng();
    let jitter_factor = rng.random_range(0.5..1.5);
    Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64)
}

/// Retries failed writes with backoff until `max_attempts` is reached.
#[derive(Debug, Clone, Default)]
pub struct RetryingErrorHandler {
    config: RetryConfig,
}

impl RetryingErrorHandler {
    pub fn new(config: RetryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl ErrorHandler for RetryingErrorHandler {
    fn handle_error(&self, failure: &mut SinkFailure) {
        if failure.failure_count < self.config.max_attempts {
            let delay = self.config.calculate_delay(failure.failure_count - 1);
            debug!(
                sink = %failure.sink_name(),
                failure_count = failure.failure_count,
                delay_ms = delay.as_millis() as u64,
                "retrying sink write"
            );
            failure.should_retry = true;
            failure.retry_after = Some(delay);
        } else {
            warn!(
                sink = %failure.sink_name(),
                failure_count = failure.failure_count,
                timeout = failure.is_timeout(),
                "giving up on sink write: {}",
                failure.message
            );
            failure.should_retry = false;
            failure.retry_after = None;
        }
    }
}
