//! Feature Switch Error Hierarchy
//!
//! Errors are grouped by the concern that raised them: lifecycle gating, key
//! naming rules, connectivity to the coordination store and configuration.
//! Unparseable flag values are not errors: they degrade to "unset" and
//! fall through to the next candidate.

use config::ConfigError;

use crate::coordination::ClientError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation not permitted in the current lifecycle state
    #[error(transparent)]
    State(#[from] StateError),

    /// Feature key violates the naming rules
    #[error(transparent)]
    Format(#[from] KeyFormatError),

    /// Coordination store unreachable, or local host identity unavailable
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("Feature switch service is not running")]
    NotRunning,

    #[error("Configuration changes to a running feature switch service are not allowed")]
    ConfigurationLocked,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyFormatError {
    #[error("Feature key must not be empty")]
    Empty,

    #[error("Feature key `{0}` must not start with `/`")]
    LeadingSeparator(String),

    #[error("Feature key `{0}` must not end with `/`")]
    TrailingSeparator(String),

    #[error("Feature key `{0}` contains an empty segment")]
    EmptySegment(String),

    #[error("Feature key `{key}` uses the relative segment `{segment}`")]
    RelativeSegment { key: String, segment: String },

    #[error("Feature key `{key}` contains illegal character U+{code:04X} at position {position}")]
    IllegalCharacter {
        key: String,
        code: u32,
        position: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectivityError {
    /// The client factory could not produce a client
    #[error("Failed to create coordination client for `{connect_string}`: {source}")]
    ClientCreation {
        connect_string: String,
        #[source]
        source: ClientError,
    },

    /// Every connect attempt failed
    #[error("Failed to connect after {attempts} attempt(s): {last}")]
    RetryExhausted { attempts: usize, last: ClientError },

    /// Local hostname required by the hostname sub-key could not be resolved
    #[error("Failed to resolve local hostname: {0}")]
    Hostname(String),

    /// Registering the watch for a candidate path failed
    #[error("Failed to install watch on `{path}`: {source}")]
    WatchInstall {
        path: String,
        #[source]
        source: ClientError,
    },

    /// Closing the client at stop failed
    #[error("Failed to close coordination client: {0}")]
    Close(#[source] ClientError),
}

impl Error {
    /// True for lifecycle gating errors
    pub fn is_state_error(&self) -> bool {
        matches!(self, Error::State(_))
    }

    /// True for key naming violations
    pub fn is_format_error(&self) -> bool {
        matches!(self, Error::Format(_))
    }

    /// True for store/hostname connectivity failures
    pub fn is_connectivity_error(&self) -> bool {
        matches!(self, Error::Connectivity(_))
    }
}
