//! Lazy, push-invalidated cache of candidate path values
//!
//! # Architecture
//!
//! ```text
//! Lookup (hot path):
//!   resolve(path) -> DashMap lookup -> OnceCell initialized? -> atomic load
//!                                           │ no
//!                                           ▼
//!   First reference:
//!     insert-if-absent slot -> get_or_try_init(install)
//!       install: client.watch(path) -> prime entry -> register with updater
//!                                                        ↓
//! Cache updater task (single writer):
//!   StreamMap<path, watch events> -> entry.store(TriState)
//! ```
//!
//! Concurrent first references share one slot: one caller installs, the
//! others await its result. A failed install leaves the slot empty so the
//! next lookup retries.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::StreamMap;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;
use tracing::Instrument;

use super::AtomicTriState;
use super::TriState;
use crate::metrics::CACHE_HIT_TOTAL;
use crate::metrics::WATCHED_PATHS;
use crate::metrics::WATCH_EVENT_TOTAL;
use crate::metrics::WATCH_INSTALL_TOTAL;
use crate::utils::ScopedTimer;
use crate::ConnectivityError;
use crate::CoordinationClient;
use crate::NodeEvent;
use crate::Result;
use crate::StateError;
use crate::WatchGuard;

/// Last known value of one watched path
///
/// Holds the watch registration; dropping the last reference releases it.
#[derive(Debug)]
pub struct CacheEntry {
    path: String,
    state: AtomicTriState,
    _watch: WatchGuard,
}

impl CacheEntry {
    fn new(
        path: &str,
        state: TriState,
        watch: WatchGuard,
    ) -> Self {
        Self {
            path: path.to_string(),
            state: AtomicTriState::new(state),
            _watch: watch,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> TriState {
        self.state.load()
    }
}

type Slot = Arc<OnceCell<Arc<CacheEntry>>>;

/// `None` marks the end of a watch stream
type EventStream = Pin<Box<dyn Stream<Item = Option<NodeEvent>> + Send>>;

/// Hands a freshly installed watch to the updater task
struct WatchRegistration {
    entry: Arc<CacheEntry>,
    events: mpsc::Receiver<NodeEvent>,
}

/// Per-service map of watched paths
pub struct WatchCache {
    client: Arc<dyn CoordinationClient>,

    entries: DashMap<String, Slot>,

    registration_tx: mpsc::UnboundedSender<WatchRegistration>,

    shutdown_tx: watch::Sender<()>,

    updater: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for WatchCache {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WatchCache")
            .field("paths", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl WatchCache {
    /// Create the cache and spawn its updater task on the current runtime.
    pub fn new(client: Arc<dyn CoordinationClient>) -> Self {
        let (registration_tx, registration_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let updater = CacheUpdater {
            registration_rx,
            streams: StreamMap::new(),
            entries: HashMap::new(),
            shutdown: shutdown_rx,
        };
        let handle = tokio::spawn(updater.run().in_current_span());

        Self {
            client,
            entries: DashMap::new(),
            registration_tx,
            shutdown_tx,
            updater: Mutex::new(Some(handle)),
        }
    }

    /// Value of `path`, installing a watch on first reference.
    ///
    /// # Errors
    /// - [`ConnectivityError::WatchInstall`] when the collaborator rejects the watch
    /// - [`StateError::NotRunning`] when the cache has been shut down
    pub async fn resolve(
        &self,
        path: &str,
    ) -> Result<TriState> {
        let cached = self.entries.get(path).and_then(|slot| slot.get().map(|entry| entry.state()));
        if let Some(state) = cached {
            CACHE_HIT_TOTAL.inc();
            trace!(path, ?state, "Watch cache hit");
            return Ok(state);
        }

        let slot = self.entries.entry(path.to_string()).or_default().clone();
        let entry = slot.get_or_try_init(|| self.install(path)).await?;
        Ok(entry.state())
    }

    /// Cached value of `path` without installing anything
    pub fn peek(
        &self,
        path: &str,
    ) -> Option<TriState> {
        self.entries.get(path).and_then(|slot| slot.get().map(|entry| entry.state()))
    }

    /// Number of paths with an installed watch
    pub fn watched_path_count(&self) -> usize {
        self.entries.iter().filter(|slot| slot.value().initialized()).count()
    }

    /// Stop the updater, release every watch and clear the map.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        let handle = self.updater.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Watch cache updater ended abnormally: {:?}", e);
            }
        }

        let released = self.watched_path_count();
        self.entries.clear();
        info!(released, "Watch cache cleared");
    }

    async fn install(
        &self,
        path: &str,
    ) -> Result<Arc<CacheEntry>> {
        let _timer = ScopedTimer::new("watch_install", path);

        let watch = match self.client.watch(path).await {
            Ok(watch) => watch,
            Err(source) => {
                WATCH_INSTALL_TOTAL.with_label_values(&["failed"]).inc();
                warn!(path, error = %source, "Failed to install watch");
                return Err(ConnectivityError::WatchInstall {
                    path: path.to_string(),
                    source,
                }
                .into());
            }
        };

        let (initial, events, guard) = watch.into_parts();
        let state = TriState::from_data(initial.as_deref());
        let entry = Arc::new(CacheEntry::new(path, state, guard));

        self.registration_tx
            .send(WatchRegistration {
                entry: entry.clone(),
                events,
            })
            .map_err(|_| StateError::NotRunning)?;

        WATCH_INSTALL_TOTAL.with_label_values(&["ok"]).inc();
        debug!(path, ?state, "Watch installed");
        Ok(entry)
    }
}

/// Single writer of entry values
struct CacheUpdater {
    registration_rx: mpsc::UnboundedReceiver<WatchRegistration>,

    streams: StreamMap<String, EventStream>,

    entries: HashMap<String, Arc<CacheEntry>>,

    shutdown: watch::Receiver<()>,
}

impl CacheUpdater {
    async fn run(mut self) {
        debug!("Watch cache updater started");

        loop {
            tokio::select! {
                Some(registration) = self.registration_rx.recv() => {
                    self.handle_registration(registration);
                }

                Some((path, event)) = self.streams.next(), if !self.streams.is_empty() => {
                    self.apply(&path, event);
                }

                _ = self.shutdown.changed() => {
                    debug!("Watch cache updater received shutdown signal");
                    break;
                }
            }
        }

        WATCHED_PATHS.sub(self.entries.len() as i64);
        debug!("Watch cache updater stopped");
    }

    fn handle_registration(
        &mut self,
        registration: WatchRegistration,
    ) {
        let WatchRegistration { entry, events } = registration;
        let path = entry.path().to_string();

        let stream: EventStream = Box::pin(
            ReceiverStream::new(events)
                .map(Some)
                .chain(tokio_stream::once(None)),
        );
        self.streams.insert(path.clone(), stream);
        if self.entries.insert(path, entry).is_none() {
            WATCHED_PATHS.inc();
        }
    }

    fn apply(
        &self,
        path: &str,
        event: Option<NodeEvent>,
    ) {
        let Some(entry) = self.entries.get(path) else {
            return;
        };

        match event {
            Some(NodeEvent::Created(data)) => {
                WATCH_EVENT_TOTAL.with_label_values(&["created"]).inc();
                Self::store(entry, TriState::parse(&data));
            }
            Some(NodeEvent::Updated(data)) => {
                WATCH_EVENT_TOTAL.with_label_values(&["updated"]).inc();
                Self::store(entry, TriState::parse(&data));
            }
            Some(NodeEvent::Deleted) => {
                WATCH_EVENT_TOTAL.with_label_values(&["deleted"]).inc();
                Self::store(entry, TriState::Unset);
            }
            Some(NodeEvent::Error(reason)) => {
                WATCH_EVENT_TOTAL.with_label_values(&["error"]).inc();
                warn!(
                    path,
                    %reason,
                    last = ?entry.state(),
                    "Watch reported an error; keeping last known value"
                );
            }
            None => {
                warn!(path, last = ?entry.state(), "Watch stream ended; value frozen until stop");
            }
        }
    }

    fn store(
        entry: &CacheEntry,
        state: TriState,
    ) {
        let previous = entry.state();
        entry.state.store(state);
        debug!(path = %entry.path(), ?previous, ?state, "Watch cache entry updated");
    }
}
