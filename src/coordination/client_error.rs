//! Error types for coordination client operations.

use std::time::Duration;

/// Result type for coordination client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors reported by a [`super::CoordinationClient`] implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Operation attempted before `connect()` succeeded
    #[error("Coordination client is not connected")]
    NotConnected,

    /// Client was closed
    #[error("Coordination client is closed")]
    Closed,

    /// Operation exceeded its timeout
    #[error("Coordination operation timed out after {0:?}")]
    Timeout(Duration),

    /// Target node does not exist
    #[error("Node `{0}` does not exist")]
    NoNode(String),

    /// Node already exists (create)
    #[error("Node `{0}` already exists")]
    NodeExists(String),

    /// Path is not an absolute node path
    #[error("Invalid node path `{0}`")]
    InvalidPath(String),

    /// Backend specific failure
    #[error("Coordination backend error: {0}")]
    Backend(String),
}
