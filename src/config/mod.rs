//! Configuration for the feature switch service.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - A fluent builder for programmatic setup
mod connection;
mod retry;
mod watch;
pub use connection::*;
pub use retry::*;
pub use watch::*;

use std::env;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::key::normalize_namespace;
use crate::key::FeatureKey;
use crate::Error;
use crate::Result;

/// Prefix for environment overrides, e.g. `SWITCH__NAMESPACE=/flags/`
pub const ENV_PREFIX: &str = "SWITCH";

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Settings captured by the service at `start()`
///
/// Sources are merged in this order (later sources override earlier):
/// 1. Type defaults
/// 2. Configuration file from `CONFIG_PATH` (if set)
/// 3. Environment variables with the `SWITCH__` prefix
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Root of every candidate path. Always begins and ends with `/` once
    /// normalized.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Optional application tier between the feature key and the host tier
    #[serde(default)]
    pub application_name: Option<String>,

    /// Whether host-scoped overrides are consulted
    #[serde(default = "default_use_hostname_subkey")]
    pub use_hostname_subkey: bool,

    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            application_name: None,
            use_hostname_subkey: default_use_hostname_subkey(),
            connection: ConnectionConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// # Note
    /// Validation is deferred so further overrides can be applied with
    /// `with_override_config()`. Callers MUST call `validate()` before use.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/switch.toml");
    /// std::env::set_var("SWITCH__APPLICATION_NAME", "checkout");
    /// let cfg = ServiceConfig::load()?.validate()?;
    /// ```
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies overrides from `path` on top of the current values.
    ///
    /// Environment variables still take precedence over the file. Not
    /// validated.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Normalizes the namespace and checks every field.
    ///
    /// # Errors
    /// - namespace or application name with illegal segments or characters
    /// - empty connect string, zero timeout, inconsistent retry delays
    /// - zero sized watch channels
    pub fn validate(mut self) -> Result<Self> {
        self.namespace = normalize_namespace(&self.namespace);
        validate_namespace(&self.namespace)?;

        if let Some(name) = &self.application_name {
            validate_application_name(name)?;
        }

        self.connection.validate()?;
        self.watch.validate()?;
        Ok(self)
    }

    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

fn validate_namespace(namespace: &str) -> Result<()> {
    let inner = namespace.trim_matches('/');
    if inner.is_empty() {
        return Ok(());
    }
    FeatureKey::parse(inner)
        .map(|_| ())
        .map_err(|e| Error::Config(ConfigError::Message(format!("invalid namespace `{namespace}`: {e}"))))
}

fn validate_application_name(name: &str) -> Result<()> {
    if name.contains('/') {
        return Err(Error::Config(ConfigError::Message(format!(
            "application_name `{name}` must be a single path segment"
        ))));
    }
    FeatureKey::parse(name)
        .map(|_| ())
        .map_err(|e| Error::Config(ConfigError::Message(format!("invalid application_name: {e}"))))
}

/// Fluent construction of a validated [`ServiceConfig`]
///
/// ```ignore
/// let config = ServiceConfig::builder()
///     .namespace("flags")
///     .application_name("checkout")
///     .disable_hostname_subkey()
///     .build()?;
/// assert_eq!(config.namespace, "/flags/");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn from_config(config: ServiceConfig) -> Self {
        Self { config }
    }

    pub fn namespace(
        mut self,
        namespace: impl AsRef<str>,
    ) -> Self {
        self.config.namespace = normalize_namespace(namespace.as_ref());
        self
    }

    pub fn application_name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.config.application_name = Some(name.into());
        self
    }

    pub fn no_application_name(mut self) -> Self {
        self.config.application_name = None;
        self
    }

    pub fn enable_hostname_subkey(mut self) -> Self {
        self.config.use_hostname_subkey = true;
        self
    }

    pub fn disable_hostname_subkey(mut self) -> Self {
        self.config.use_hostname_subkey = false;
        self
    }

    pub fn connect_string(
        mut self,
        connect_string: impl Into<String>,
    ) -> Self {
        self.config.connection.connect_string = connect_string.into();
        self
    }

    pub fn connection_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.connection.connection_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn retry_policy(
        mut self,
        policy: BackoffPolicy,
    ) -> Self {
        self.config.connection.retry = policy;
        self
    }

    pub fn watch(
        mut self,
        watch: WatchConfig,
    ) -> Self {
        self.config.watch = watch;
        self
    }

    pub fn build(self) -> Result<ServiceConfig> {
        self.config.validate()
    }
}

fn default_namespace() -> String {
    crate::constants::DEFAULT_NAMESPACE.to_string()
}
fn default_use_hostname_subkey() -> bool {
    true
}
