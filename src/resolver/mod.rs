//! Override precedence: most specific set value wins.

use std::sync::Arc;

use tracing::debug;

use crate::cache::WatchCache;
use crate::key::FeatureKey;
use crate::key::KeyPathBuilder;
use crate::metrics::LOOKUP_TOTAL;
use crate::Result;


/// Outcome of a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub enabled: bool,
    /// Candidate path that decided the outcome; `None` when nothing was set
    /// and the default applied
    pub matched_path: Option<String>,
}

impl Resolution {
    fn matched(
        path: String,
        enabled: bool,
    ) -> Self {
        Self {
            enabled,
            matched_path: Some(path),
        }
    }

    fn default_off() -> Self {
        Self {
            enabled: false,
            matched_path: None,
        }
    }
}

/// Walks the candidate chain through the watch cache
#[derive(Debug)]
pub struct PrecedenceResolver {
    paths: KeyPathBuilder,
    cache: Arc<WatchCache>,
}

impl PrecedenceResolver {
    pub fn new(
        paths: KeyPathBuilder,
        cache: Arc<WatchCache>,
    ) -> Self {
        Self { paths, cache }
    }

    pub fn paths(&self) -> &KeyPathBuilder {
        &self.paths
    }

    pub async fn resolve(
        &self,
        key: &str,
    ) -> Result<bool> {
        Ok(self.explain(key).await?.enabled)
    }

    /// Resolve `key` and report which path decided it.
    ///
    /// Candidates after the deciding one are neither read nor watched.
    pub async fn explain(
        &self,
        key: &str,
    ) -> Result<Resolution> {
        let result = self.walk(key).await;

        let outcome = match &result {
            Ok(Resolution {
                matched_path: None, ..
            }) => "default",
            Ok(Resolution { enabled: true, .. }) => "enabled",
            Ok(Resolution { enabled: false, .. }) => "disabled",
            Err(_) => "error",
        };
        LOOKUP_TOTAL.with_label_values(&[outcome]).inc();

        result
    }

    async fn walk(
        &self,
        key: &str,
    ) -> Result<Resolution> {
        let key = FeatureKey::parse(key)?;

        for path in self.paths.candidates(&key) {
            let state = self.cache.resolve(&path).await?;
            if let Some(enabled) = state.as_bool() {
                debug!(key = %key, path = %path, enabled, "Feature switch resolved");
                return Ok(Resolution::matched(path, enabled));
            }
        }

        debug!(key = %key, "No override set; feature switch defaults to off");
        Ok(Resolution::default_off())
    }
}
