//! Lookup API and lifecycle of the feature switch service.

mod switch_service;

pub use switch_service::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Result;

/// Boolean feature flags looked up by key
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FeatureSwitch: Send + Sync {
    /// Whether `key` is on. Off when no override is set.
    ///
    /// # Errors
    /// - [`crate::StateError::NotRunning`] outside the running phase
    /// - [`crate::KeyFormatError`] for keys violating the naming rules
    /// - [`crate::ConnectivityError::WatchInstall`] when a first-time path
    ///   cannot be watched
    async fn is_enabled(
        &self,
        key: &str,
    ) -> Result<bool>;
}
