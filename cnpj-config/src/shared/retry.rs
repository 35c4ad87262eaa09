use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::ValidationError;

/// Bounded fixed-delay retries for establishing the destination connection.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectRetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl ConnectRetryConfig {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;

    pub const DEFAULT_DELAY_MS: u64 = 5_000;

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::invalid(
                "destination.postgres.connect_retry.max_attempts",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for ConnectRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    ConnectRetryConfig::DEFAULT_MAX_ATTEMPTS
}

fn default_delay_ms() -> u64 {
    ConnectRetryConfig::DEFAULT_DELAY_MS
}
