use std::time::Duration;

use config::ConfigError;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Jittered exponential backoff for connecting to the coordination store
///
/// Attempt `n` (zero based) sleeps `base_delay_ms * k` where `k` is drawn
/// uniformly from `1..=2^(n+1)`, capped at `max_delay_ms`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Retries after the first attempt (total attempts = `max_retries + 1`)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Upper bound on the exponent so the multiplier never overflows
const MAX_BACKOFF_SHIFT: usize = 29;

impl BackoffPolicy {
    pub fn new(
        max_retries: usize,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_retries,
            base_delay_ms: u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX),
            max_delay_ms: u64::try_from(max_delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn total_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    /// Largest sleep attempt `attempt` may draw
    pub fn delay_ceiling(
        &self,
        attempt: usize,
    ) -> Duration {
        let multiplier = 1u64 << (attempt + 1).min(MAX_BACKOFF_SHIFT);
        Duration::from_millis(self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms))
    }

    /// Jittered sleep after failed attempt `attempt`
    pub fn delay_for_attempt(
        &self,
        attempt: usize,
    ) -> Duration {
        let multiplier_ceiling = 1u64 << (attempt + 1).min(MAX_BACKOFF_SHIFT);
        let multiplier = rand::thread_rng().gen_range(1..=multiplier_ceiling);
        Duration::from_millis(self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms))
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "connection.retry.base_delay_ms must be greater than 0".into(),
            )));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "connection.retry.max_delay_ms ({}) must not be less than base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            ))));
        }

        Ok(())
    }
}

fn default_max_retries() -> usize {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
