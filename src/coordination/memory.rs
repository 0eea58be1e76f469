//! In-process coordination store
//!
//! A flat path-to-bytes map with per-path watches, suitable for tests, local
//! development and single-process deployments.
//!
//! # Architecture
//!
//! ```text
//! Write path:
//!   create/set_data/delete -> (under node lock) seq += 1 -> event_queue.send() [unbounded]
//!                                                               ↓
//! Background Dispatcher Thread:
//!   event_queue.recv() -> lookup in DashMap -> try_send(per-watcher channel)
//!                                                 │ full
//!                                                 ▼
//!                                   per-watcher overflow, retried until drained
//!                                                               ↓
//! Watch consumer:
//!   NodeWatch::events
//! ```
//!
//! # Delivery
//!
//! Events are never dropped and nothing on the write path waits. Writers
//! enqueue without blocking; the dispatcher parks whatever a full watcher
//! channel cannot take and hands it over, in order, as the consumer catches
//! up. A watcher that is never drained only grows its own overflow.
//!
//! Each write is stamped with a sequence number taken under the node lock, and
//! a watcher only receives events newer than the snapshot it was installed
//! with.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use crossbeam_channel::bounded;
use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::RecvError;
use crossbeam_channel::Sender;
use crossbeam_channel::TryRecvError;
use dashmap::DashMap;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::ClientError;
use super::ClientResult;
use super::CoordinationClient;
use super::NodeEvent;
use super::NodeWatch;
use super::WatchGuard;
use crate::config::WatchConfig;

/// How often the dispatcher retries handing parked events to full watchers
const OVERFLOW_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// A change queued for dispatch
#[derive(Debug, Clone)]
struct StoreEvent {
    seq: u64,
    path: String,
    event: NodeEvent,
}

#[derive(Debug)]
struct Watcher {
    id: u64,
    /// Sequence number of the snapshot the watcher was installed with
    since: u64,
    sender: mpsc::Sender<NodeEvent>,
}

/// Unregisters a watcher when the owning [`WatchGuard`] drops
struct WatcherRegistration {
    id: u64,
    path: String,
    store: Arc<StoreInner>,
}

impl Drop for WatcherRegistration {
    fn drop(&mut self) {
        self.store.watchers.remove_if_mut(&self.path, |_path, watchers| {
            watchers.retain(|w| w.id != self.id);
            watchers.is_empty()
        });
        trace!(watcher_id = self.id, path = %self.path, "Watcher unregistered");
    }
}

#[derive(Debug, Default)]
struct Nodes {
    data: HashMap<String, Bytes>,
    /// Sequence number of the last write
    seq: u64,
}

struct StoreInner {
    nodes: RwLock<Nodes>,

    /// Watchers grouped by path
    watchers: DashMap<String, Vec<Watcher>>,

    next_watcher_id: AtomicU64,

    connected: AtomicBool,

    /// Dispatcher thread handle (None when not running)
    thread_handle: Mutex<Option<JoinHandle<()>>>,

    /// Shutdown signal sender (None when not running)
    shutdown_tx: Mutex<Option<Sender<()>>>,

    config: WatchConfig,
}

impl std::fmt::Debug for StoreInner {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StoreInner")
            .field("watchers", &self.watchers)
            .field("connected", &self.connected)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// In-process [`CoordinationClient`]
///
/// # Example
///
/// ```ignore
/// use d_switch::{CoordinationClient, MemoryCoordinator, NodeEvent, WatchConfig};
/// use bytes::Bytes;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = MemoryCoordinator::new(WatchConfig::default());
/// store.connect().await?;
///
/// let mut watch = store.watch("/zkfss/blah").await?;
/// assert!(watch.initial().is_none());
///
/// store.create("/zkfss/blah", Bytes::from_static(b"true")).await?;
/// assert_eq!(
///     watch.next_event().await,
///     Some(NodeEvent::Created(Bytes::from_static(b"true")))
/// );
/// # });
/// ```
#[derive(Debug)]
pub struct MemoryCoordinator {
    inner: Arc<StoreInner>,

    event_sender: Sender<StoreEvent>,

    /// Shared with the dispatcher thread; kept here so a restart after
    /// `close()` resumes from the same queue
    event_receiver: Arc<Receiver<StoreEvent>>,
}

impl MemoryCoordinator {
    pub fn new(config: WatchConfig) -> Self {
        let (event_sender, event_receiver) = unbounded();

        let inner = Arc::new(StoreInner {
            nodes: RwLock::new(Nodes::default()),
            watchers: DashMap::new(),
            next_watcher_id: AtomicU64::new(1),
            connected: AtomicBool::new(false),
            thread_handle: Mutex::new(None),
            shutdown_tx: Mutex::new(None),
            config,
        });

        Self {
            inner,
            event_sender,
            event_receiver: Arc::new(event_receiver),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Number of live watchers on `path`
    pub fn watcher_count(
        &self,
        path: &str,
    ) -> usize {
        self.inner.watchers.get(path).map(|w| w.len()).unwrap_or(0)
    }

    /// Number of paths with at least one live watcher
    pub fn watched_path_count(&self) -> usize {
        self.inner.watchers.len()
    }

    pub fn node_count(&self) -> usize {
        self.inner.nodes.read().data.len()
    }

    /// Deliver a watch-level error to every watcher of `path`.
    ///
    /// Used to exercise consumers against a misbehaving store.
    pub fn inject_error(
        &self,
        path: &str,
        reason: impl Into<String>,
    ) -> ClientResult<()> {
        self.ensure_connected()?;
        let mut nodes = self.inner.nodes.write();
        nodes.seq += 1;
        self.publish(nodes.seq, path, NodeEvent::Error(reason.into()))
    }

    fn ensure_connected(&self) -> ClientResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    fn start_dispatcher(&self) {
        let mut handle_guard = self.inner.thread_handle.lock();

        if handle_guard.is_some() {
            return;
        }

        let (shutdown_tx, shutdown_rx) = bounded(1);
        let dispatcher = Dispatcher {
            inner: self.inner.clone(),
            receiver: Arc::clone(&self.event_receiver),
            shutdown_rx,
            overflow: HashMap::new(),
        };

        *handle_guard = Some(std::thread::spawn(move || dispatcher.run()));
        *self.inner.shutdown_tx.lock() = Some(shutdown_tx);
    }

    /// Signal the dispatcher to stop and hand back its thread for joining.
    fn signal_dispatcher_shutdown(&self) -> Option<JoinHandle<()>> {
        if let Some(tx) = self.inner.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }
        self.inner.thread_handle.lock().take()
    }

    fn stop_dispatcher(&self) {
        if let Some(handle) = self.signal_dispatcher_shutdown() {
            if handle.join().is_err() {
                warn!("Memory coordinator dispatcher panicked");
            }
        }
    }

    /// Queue an event. Called with the node lock held so queue order matches
    /// write order.
    fn publish(
        &self,
        seq: u64,
        path: &str,
        event: NodeEvent,
    ) -> ClientResult<()> {
        self.event_sender
            .send(StoreEvent {
                seq,
                path: path.to_string(),
                event,
            })
            .map_err(|_| ClientError::Backend("event queue closed".to_string()))?;

        let backlog = self.event_sender.len();
        if backlog == self.inner.config.event_queue_size + 1 {
            warn!(backlog, "Memory coordinator event backlog exceeds watch.event_queue_size");
        }
        Ok(())
    }
}

/// Events a full watcher channel could not take yet
struct Overflow {
    sender: mpsc::Sender<NodeEvent>,
    events: VecDeque<NodeEvent>,
}

enum Wake {
    Event(Result<StoreEvent, RecvError>),
    Shutdown,
    Retry,
}

/// Background delivery loop; owns the parked events
struct Dispatcher {
    inner: Arc<StoreInner>,
    receiver: Arc<Receiver<StoreEvent>>,
    shutdown_rx: Receiver<()>,
    /// Keyed by watcher id
    overflow: HashMap<u64, Overflow>,
}

impl Dispatcher {
    fn run(mut self) {
        debug!("Memory coordinator dispatcher started");

        loop {
            match self.shutdown_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    debug!("Memory coordinator dispatcher received shutdown signal");
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            self.flush_overflow();

            let wake = if self.overflow.is_empty() {
                crossbeam_channel::select! {
                    recv(self.receiver) -> result => Wake::Event(result),
                    recv(self.shutdown_rx) -> _ => Wake::Shutdown,
                }
            } else {
                crossbeam_channel::select! {
                    recv(self.receiver) -> result => Wake::Event(result),
                    recv(self.shutdown_rx) -> _ => Wake::Shutdown,
                    default(OVERFLOW_RETRY_INTERVAL) => Wake::Retry,
                }
            };

            match wake {
                Wake::Event(Ok(event)) => self.dispatch(event),
                Wake::Event(Err(_)) => {
                    warn!("Memory coordinator event queue closed unexpectedly");
                    break;
                }
                Wake::Shutdown => {
                    debug!("Memory coordinator dispatcher received shutdown signal");
                    break;
                }
                Wake::Retry => {}
            }
        }

        debug!("Memory coordinator dispatcher stopped");
    }

    fn dispatch(
        &mut self,
        event: StoreEvent,
    ) {
        // Clone senders out so the shard lock is not held while delivering.
        let targets: Vec<(u64, mpsc::Sender<NodeEvent>)> = match self.inner.watchers.get(&event.path) {
            Some(watchers) => watchers
                .iter()
                .filter(|w| w.since < event.seq)
                .map(|w| (w.id, w.sender.clone()))
                .collect(),
            None => return,
        };

        for (id, sender) in &targets {
            self.deliver(*id, sender, event.event.clone());
        }

        trace!(
            path = %event.path,
            seq = event.seq,
            event = ?event.event,
            watchers = targets.len(),
            "Event dispatched"
        );
    }

    /// Hand `event` to one watcher, parking it behind anything already parked.
    fn deliver(
        &mut self,
        id: u64,
        sender: &mpsc::Sender<NodeEvent>,
        event: NodeEvent,
    ) {
        if let Some(parked) = self.overflow.get_mut(&id) {
            parked.events.push_back(event);
            return;
        }

        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                trace!(watcher_id = id, "Watcher channel full; parking event");
                self.overflow.insert(
                    id,
                    Overflow {
                        sender: sender.clone(),
                        events: VecDeque::from([event]),
                    },
                );
            }
            // Receiver gone means the watcher is being unregistered.
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Move parked events into watcher channels as space frees up.
    fn flush_overflow(&mut self) {
        self.overflow.retain(|id, parked| {
            while let Some(event) = parked.events.pop_front() {
                match parked.sender.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Full(event)) => {
                        parked.events.push_front(event);
                        return true;
                    }
                    Err(TrySendError::Closed(_)) => {
                        trace!(watcher_id = *id, "Dropping parked events of closed watcher");
                        return false;
                    }
                }
            }
            false
        });
    }
}

fn validate_path(path: &str) -> ClientResult<()> {
    if !path.starts_with('/') || (path.len() > 1 && path.ends_with('/')) || path.contains("//") {
        return Err(ClientError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[async_trait]
impl CoordinationClient for MemoryCoordinator {
    async fn connect(&self) -> ClientResult<()> {
        self.start_dispatcher();
        self.inner.connected.store(true, Ordering::Release);
        debug!("Memory coordinator connected");
        Ok(())
    }

    async fn close(&self) -> ClientResult<()> {
        if !self.inner.connected.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(handle) = self.signal_dispatcher_shutdown() {
            // The dispatcher exits promptly once signalled; join off the runtime thread.
            match tokio::task::spawn_blocking(move || handle.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => warn!("Memory coordinator dispatcher panicked"),
                Err(e) => warn!("Failed to join memory coordinator dispatcher: {}", e),
            }
        }
        // Dropping the senders ends every outstanding watch stream.
        self.inner.watchers.clear();
        debug!("Memory coordinator closed");
        Ok(())
    }

    async fn get_data(
        &self,
        path: &str,
    ) -> ClientResult<Option<Bytes>> {
        self.ensure_connected()?;
        validate_path(path)?;
        Ok(self.inner.nodes.read().data.get(path).cloned())
    }

    async fn create(
        &self,
        path: &str,
        data: Bytes,
    ) -> ClientResult<()> {
        self.ensure_connected()?;
        validate_path(path)?;

        let mut nodes = self.inner.nodes.write();
        if nodes.data.contains_key(path) {
            return Err(ClientError::NodeExists(path.to_string()));
        }
        nodes.seq += 1;
        nodes.data.insert(path.to_string(), data.clone());
        self.publish(nodes.seq, path, NodeEvent::Created(data))
    }

    async fn set_data(
        &self,
        path: &str,
        data: Bytes,
    ) -> ClientResult<()> {
        self.ensure_connected()?;
        validate_path(path)?;

        let mut nodes = self.inner.nodes.write();
        match nodes.data.get_mut(path) {
            Some(slot) => *slot = data.clone(),
            None => return Err(ClientError::NoNode(path.to_string())),
        }
        nodes.seq += 1;
        self.publish(nodes.seq, path, NodeEvent::Updated(data))
    }

    async fn delete(
        &self,
        path: &str,
    ) -> ClientResult<()> {
        self.ensure_connected()?;
        validate_path(path)?;

        let mut nodes = self.inner.nodes.write();
        if nodes.data.remove(path).is_none() {
            return Err(ClientError::NoNode(path.to_string()));
        }
        nodes.seq += 1;
        self.publish(nodes.seq, path, NodeEvent::Deleted)
    }

    async fn watch(
        &self,
        path: &str,
    ) -> ClientResult<NodeWatch> {
        self.ensure_connected()?;
        validate_path(path)?;

        let id = self.inner.next_watcher_id.fetch_add(1, Ordering::Relaxed);
        let buffer_size = self.inner.config.watcher_buffer_size.max(1);
        let (sender, receiver) = mpsc::channel(buffer_size);

        // Snapshot and registration under the same read lock: no write can
        // land between them.
        let initial = {
            let nodes = self.inner.nodes.read();
            self.inner.watchers.entry(path.to_string()).or_default().push(Watcher {
                id,
                since: nodes.seq,
                sender,
            });
            nodes.data.get(path).cloned()
        };

        trace!(watcher_id = id, path, buffer_size, "Watcher registered");

        let guard = WatchGuard::new(WatcherRegistration {
            id,
            path: path.to_string(),
            store: self.inner.clone(),
        });
        Ok(NodeWatch::new(path, initial, receiver, guard))
    }
}

impl Drop for MemoryCoordinator {
    fn drop(&mut self) {
        self.stop_dispatcher();
    }
}
