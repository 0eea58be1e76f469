use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::Error;
use crate::Result;

/// Channel sizing for the in-process coordinator's watch delivery
///
/// # Example
///
/// ```toml
/// [watch]
/// event_queue_size = 1000
/// watcher_buffer_size = 10
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Backlog between writers and the dispatcher thread above which a
    /// warning is logged
    ///
    /// The queue itself is unbounded; writers never wait on it.
    ///
    /// **Default**: 1000
    #[serde(default = "default_event_queue_size")]
    pub event_queue_size: usize,

    /// Capacity of each watcher's channel
    ///
    /// Events a full channel cannot take are parked by the dispatcher and
    /// delivered in order once the consumer catches up.
    ///
    /// **Default**: 10
    #[serde(default = "default_watcher_buffer_size")]
    pub watcher_buffer_size: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            event_queue_size: default_event_queue_size(),
            watcher_buffer_size: default_watcher_buffer_size(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.event_queue_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.event_queue_size must be greater than 0".into(),
            )));
        }

        if self.event_queue_size > 100_000 {
            warn!(
                "watch.event_queue_size ({}) is very large; backlog warnings will rarely fire",
                self.event_queue_size
            );
        }

        if self.watcher_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.watcher_buffer_size must be greater than 0".into(),
            )));
        }

        Ok(())
    }
}

fn default_event_queue_size() -> usize {
    1000
}
fn default_watcher_buffer_size() -> usize {
    10
}
