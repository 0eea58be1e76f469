use super::normalize_namespace;
use super::FeatureKey;
use crate::ServiceConfig;

/// Expands a feature key into the ordered override chain
///
/// ```text
/// {namespace}{key}/{application}/{host}   application set and host tier on
/// {namespace}{key}/{application}          application set
/// {namespace}{key}/{host}                 host tier on
/// {namespace}{key}                        always
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPathBuilder {
    namespace: String,
    application_name: Option<String>,
    hostname: Option<String>,
}

impl KeyPathBuilder {
    /// `hostname` is `None` when host-scoped overrides are disabled.
    pub fn new(
        namespace: &str,
        application_name: Option<String>,
        hostname: Option<String>,
    ) -> Self {
        Self {
            namespace: normalize_namespace(namespace),
            application_name,
            hostname,
        }
    }

    /// Builder for `config`. The hostname is dropped when the config disables
    /// the host tier.
    pub fn from_config(
        config: &ServiceConfig,
        hostname: Option<String>,
    ) -> Self {
        let hostname = if config.use_hostname_subkey { hostname } else { None };
        Self::new(&config.namespace, config.application_name.clone(), hostname)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Candidate paths, most specific first
    pub fn candidates(
        &self,
        key: &FeatureKey,
    ) -> Vec<String> {
        let base = format!("{}{}", self.namespace, key);
        let mut paths = Vec::with_capacity(4);

        if let Some(app) = &self.application_name {
            if let Some(host) = &self.hostname {
                paths.push(format!("{base}/{app}/{host}"));
            }
            paths.push(format!("{base}/{app}"));
        }
        if let Some(host) = &self.hostname {
            // Equal application and host names collapse onto one path.
            let host_path = format!("{base}/{host}");
            if !paths.contains(&host_path) {
                paths.push(host_path);
            }
        }
        paths.push(base);

        paths
    }
}
