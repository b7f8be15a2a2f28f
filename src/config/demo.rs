//! Demo stream pacing

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_min_jitter")]
    pub min_jitter_ms: u64,

    #[serde(default = "default_max_jitter")]
    pub max_jitter_ms: u64,

    /// Pause between words of `getFooResponse`
    #[serde(default = "default_word_delay")]
    pub word_delay_ms: u64,
}

impl DemoConfig {
    pub fn min_jitter(&self) -> Duration {
        Duration::from_millis(self.min_jitter_ms)
    }

    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }

    pub fn word_delay(&self) -> Duration {
        Duration::from_millis(self.word_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.min_jitter_ms > self.max_jitter_ms {
            return Err(ValidationError::InvalidJitterRange);
        }
        Ok(())
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            min_jitter_ms: default_min_jitter(),
            max_jitter_ms: default_max_jitter(),
            word_delay_ms: default_word_delay(),
        }
    }
}

fn default_min_jitter() -> u64 {
    200
}

fn default_max_jitter() -> u64 {
    2000
}

fn default_word_delay() -> u64 {
    60
}
