use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::FeatureSwitch;
use crate::cache::WatchCache;
use crate::coordination::connect_with_backoff;
use crate::key::normalize_namespace;
use crate::key::KeyPathBuilder;
use crate::resolver::PrecedenceResolver;
use crate::resolver::Resolution;
use crate::BackoffPolicy;
use crate::ClientFactory;
use crate::ConnectivityError;
use crate::CoordinationClient;
use crate::HostnameResolver;
use crate::MemoryClientFactory;
use crate::Result;
use crate::ServiceConfig;
use crate::StateError;
use crate::SystemHostname;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stopped,
    Starting,
    Running,
}

/// Everything that may only change while stopped
struct PendingState {
    phase: Phase,
    config: ServiceConfig,
    client: Option<Arc<dyn CoordinationClient>>,
    factory: Arc<dyn ClientFactory>,
    hostname: Arc<dyn HostnameResolver>,
}

/// Components built at `start()` and torn down at `stop()`
struct RunningState {
    client: Arc<dyn CoordinationClient>,
    cache: Arc<WatchCache>,
    resolver: PrecedenceResolver,
}

/// Feature switch service backed by a watchable coordination store.
///
/// Lifecycle:
/// - `new()` / `with_config()` / `from_env()` - create, stopped
/// - setters - adjust configuration while stopped
/// - `start()` - connect, resolve hostname, begin serving lookups
/// - `is_enabled()` - resolve a key through the override chain
/// - `stop()` - release every watch and close the client
///
/// A stopped service may be reconfigured and started again; it starts with an
/// empty cache.
///
/// # Example
/// ```ignore
/// use d_switch::{FeatureSwitch, FeatureSwitchService};
///
/// let service = FeatureSwitchService::new();
/// service.set_application_name("checkout")?.disable_hostname_subkey()?;
/// service.start().await?;
///
/// if service.is_enabled("new-flow").await? {
///     // ...
/// }
///
/// service.stop().await?;
/// ```
pub struct FeatureSwitchService {
    pending: Mutex<PendingState>,

    /// Published at start, cleared at stop; lookups only touch this
    running: ArcSwapOption<RunningState>,

    /// Serializes start/stop
    transition: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for FeatureSwitchService {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let pending = self.pending.lock();
        f.debug_struct("FeatureSwitchService")
            .field("phase", &pending.phase)
            .field("config", &pending.config)
            .finish_non_exhaustive()
    }
}

impl Default for FeatureSwitchService {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureSwitchService {
    /// Service with default settings and the in-process store.
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default())
    }

    /// Validation is deferred to `start()`.
    pub fn with_config(config: ServiceConfig) -> Self {
        Self {
            pending: Mutex::new(PendingState {
                phase: Phase::Stopped,
                config,
                client: None,
                factory: Arc::new(MemoryClientFactory),
                hostname: Arc::new(SystemHostname),
            }),
            running: ArcSwapOption::empty(),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    /// Service configured from defaults, `CONFIG_PATH` and `SWITCH__*`
    /// environment variables.
    pub fn from_env() -> Result<Self> {
        let config = ServiceConfig::load()?.validate()?;
        Ok(Self::with_config(config))
    }

    pub fn is_running(&self) -> bool {
        self.running.load().is_some()
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> ServiceConfig {
        self.pending.lock().config.clone()
    }

    /// Client in use, whether injected or created at start. `None` before the
    /// first start and after stop unless one was injected since.
    pub fn client(&self) -> Option<Arc<dyn CoordinationClient>> {
        self.pending.lock().client.clone()
    }

    //---
    // Configuration (stopped only)

    pub fn set_namespace(
        &self,
        namespace: impl AsRef<str>,
    ) -> Result<&Self> {
        let namespace = normalize_namespace(namespace.as_ref());
        self.configure(|pending| pending.config.namespace = namespace)
    }

    pub fn set_application_name(
        &self,
        name: impl Into<String>,
    ) -> Result<&Self> {
        let name = name.into();
        self.configure(|pending| pending.config.application_name = Some(name))
    }

    pub fn clear_application_name(&self) -> Result<&Self> {
        self.configure(|pending| pending.config.application_name = None)
    }

    pub fn enable_hostname_subkey(&self) -> Result<&Self> {
        self.configure(|pending| pending.config.use_hostname_subkey = true)
    }

    pub fn disable_hostname_subkey(&self) -> Result<&Self> {
        self.configure(|pending| pending.config.use_hostname_subkey = false)
    }

    pub fn set_connect_string(
        &self,
        connect_string: impl Into<String>,
    ) -> Result<&Self> {
        let connect_string = connect_string.into();
        self.configure(|pending| pending.config.connection.connect_string = connect_string)
    }

    pub fn set_connection_timeout(
        &self,
        timeout: Duration,
    ) -> Result<&Self> {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.configure(|pending| pending.config.connection.connection_timeout_ms = timeout_ms)
    }

    pub fn set_retry_policy(
        &self,
        policy: BackoffPolicy,
    ) -> Result<&Self> {
        self.configure(|pending| pending.config.connection.retry = policy)
    }

    /// Use `client` instead of creating one. It is connected at start and
    /// closed at stop.
    pub fn set_client(
        &self,
        client: Arc<dyn CoordinationClient>,
    ) -> Result<&Self> {
        self.configure(|pending| pending.client = Some(client))
    }

    pub fn set_client_factory(
        &self,
        factory: impl ClientFactory,
    ) -> Result<&Self> {
        let factory: Arc<dyn ClientFactory> = Arc::new(factory);
        self.configure(|pending| pending.factory = factory)
    }

    /// Source of the host override tier's name; the operating system by default.
    pub fn set_hostname_resolver(
        &self,
        resolver: impl HostnameResolver,
    ) -> Result<&Self> {
        let resolver: Arc<dyn HostnameResolver> = Arc::new(resolver);
        self.configure(|pending| pending.hostname = resolver)
    }

    /// Replace the whole configuration.
    pub fn set_config(
        &self,
        config: ServiceConfig,
    ) -> Result<&Self> {
        self.configure(|pending| pending.config = config)
    }

    fn configure<F>(
        &self,
        apply: F,
    ) -> Result<&Self>
    where
        F: FnOnce(&mut PendingState),
    {
        let mut pending = self.pending.lock();
        if pending.phase != Phase::Stopped {
            return Err(StateError::ConfigurationLocked.into());
        }
        apply(&mut pending);
        Ok(self)
    }

    //---
    // Lifecycle

    /// Connect and begin serving lookups. No-op when already running.
    ///
    /// # Errors
    /// - configuration validation failures
    /// - [`ConnectivityError`] when the client cannot be created or connected,
    ///   or the local hostname cannot be resolved
    pub async fn start(&self) -> Result<&Self> {
        let _transition = self.transition.lock().await;

        let (config, injected, factory, hostname) = {
            let mut pending = self.pending.lock();
            if pending.phase == Phase::Running {
                return Ok(self);
            }
            pending.phase = Phase::Starting;
            (
                pending.config.clone(),
                pending.client.clone(),
                pending.factory.clone(),
                pending.hostname.clone(),
            )
        };

        info!("Starting feature switch service");
        match Self::bring_up(config, injected, factory, hostname).await {
            Ok((config, running)) => {
                let mut pending = self.pending.lock();
                pending.config = config;
                pending.client = Some(running.client.clone());
                pending.phase = Phase::Running;
                self.running.store(Some(Arc::new(running)));
                info!(
                    namespace = %pending.config.namespace,
                    application = ?pending.config.application_name,
                    "Feature switch service started"
                );
                Ok(self)
            }
            Err(e) => {
                self.pending.lock().phase = Phase::Stopped;
                error!("Feature switch service failed to start: {}", e);
                Err(e)
            }
        }
    }

    async fn bring_up(
        config: ServiceConfig,
        injected: Option<Arc<dyn CoordinationClient>>,
        factory: Arc<dyn ClientFactory>,
        hostnames: Arc<dyn HostnameResolver>,
    ) -> Result<(ServiceConfig, RunningState)> {
        let config = config.validate()?;

        let client = match injected {
            Some(client) => client,
            None => factory.create(&config).map_err(|source| ConnectivityError::ClientCreation {
                connect_string: config.connection.connect_string.clone(),
                source,
            })?,
        };

        connect_with_backoff(client.as_ref(), &config.connection).await?;

        let hostname = if config.use_hostname_subkey {
            match hostnames.local_hostname() {
                Ok(hostname) => Some(hostname),
                Err(e) => {
                    if let Err(close_err) = client.close().await {
                        warn!("Failed to close client after hostname failure: {}", close_err);
                    }
                    return Err(e);
                }
            }
        } else {
            None
        };

        let paths = KeyPathBuilder::from_config(&config, hostname);
        let cache = Arc::new(WatchCache::new(client.clone()));
        let resolver = PrecedenceResolver::new(paths, cache.clone());

        Ok((
            config,
            RunningState {
                client,
                cache,
                resolver,
            },
        ))
    }

    /// Release every watch, close the client and return to stopped. No-op
    /// when already stopped.
    ///
    /// The service forgets the client either way; a later start needs a
    /// fresh one or creates it through the factory.
    pub async fn stop(&self) -> Result<()> {
        let _transition = self.transition.lock().await;

        let Some(running) = self.running.swap(None) else {
            return Ok(());
        };

        info!("Stopping feature switch service");
        running.cache.shutdown().await;
        let closed = running.client.close().await;

        {
            let mut pending = self.pending.lock();
            pending.client = None;
            pending.phase = Phase::Stopped;
        }

        match closed {
            Ok(()) => {
                info!("Feature switch service stopped");
                Ok(())
            }
            Err(e) => {
                warn!("Coordination client failed to close cleanly: {}", e);
                Err(ConnectivityError::Close(e).into())
            }
        }
    }

    //---
    // Lookups

    /// Like [`FeatureSwitch::is_enabled`], also reporting the deciding path.
    pub async fn explain(
        &self,
        key: &str,
    ) -> Result<Resolution> {
        let running = self.running.load_full().ok_or(StateError::NotRunning)?;
        running.resolver.explain(key).await
    }

    /// Candidate paths consulted for `key`, most specific first
    pub fn candidate_paths(
        &self,
        key: &str,
    ) -> Result<Vec<String>> {
        let running = self.running.load_full().ok_or(StateError::NotRunning)?;
        let key = crate::key::FeatureKey::parse(key)?;
        Ok(running.resolver.paths().candidates(&key))
    }
}

#[async_trait]
impl FeatureSwitch for FeatureSwitchService {
    async fn is_enabled(
        &self,
        key: &str,
    ) -> Result<bool> {
        Ok(self.explain(key).await?.enabled)
    }
}

impl Drop for FeatureSwitchService {
    fn drop(&mut self) {
        if self.running.load().is_some() {
            error!("FeatureSwitchService dropped without calling stop() - client left open");
        }
    }
}
