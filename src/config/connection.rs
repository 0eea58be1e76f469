use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use super::BackoffPolicy;
use crate::constants::DEFAULT_CONNECTION_TIMEOUT_MS;
use crate::constants::DEFAULT_CONNECT_STRING;
use crate::Error;
use crate::Result;

/// How the service reaches the coordination store
///
/// Only consulted when the service creates its own client through a
/// [`crate::ClientFactory`]; the retry policy and timeout also govern
/// `connect()` on injected clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Comma separated `host:port` list handed to the client factory
    #[serde(default = "default_connect_string")]
    pub connect_string: String,

    /// Per-attempt connect timeout (unit: milliseconds)
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    #[serde(default)]
    pub retry: BackoffPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_string: default_connect_string(),
            connection_timeout_ms: default_connection_timeout_ms(),
            retry: BackoffPolicy::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_string.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "connection.connect_string must not be empty".into(),
            )));
        }

        if self.connection_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "connection.connection_timeout_ms must be greater than 0".into(),
            )));
        }

        self.retry.validate()
    }
}

fn default_connect_string() -> String {
    DEFAULT_CONNECT_STRING.to_string()
}
fn default_connection_timeout_ms() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_MS
}
