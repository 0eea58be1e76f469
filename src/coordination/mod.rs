//! Coordination store collaborator
//!
//! The feature switch service never talks to a concrete store directly. It is
//! handed a [`CoordinationClient`], either injected by the caller or produced by
//! a [`ClientFactory`] from the connection settings at `start()`.
//!
//! The contract mirrors a hierarchical watchable KV tree:
//! - nodes are addressed by absolute `/`-separated paths
//! - node data is opaque bytes
//! - a watch on a path delivers every later create/update/delete of that path,
//!   in order, until the returned [`WatchGuard`] is dropped
//!
//! [`MemoryCoordinator`] is the bundled in-process implementation.

mod client_error;
mod connect;
mod memory;

pub use client_error::*;
pub(crate) use connect::*;
pub use memory::*;


use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;

use crate::config::ServiceConfig;

/// Change notification for a single watched path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// Node was created with the given data
    Created(Bytes),
    /// Node data was replaced
    Updated(Bytes),
    /// Node was removed
    Deleted,
    /// The store reported a problem with this watch. The last known value is
    /// still the best information available.
    Error(String),
}

/// Keeps a server-side watch registered for as long as it is alive.
///
/// Dropping the guard unregisters the watch.
pub struct WatchGuard {
    _registration: Option<Box<dyn Any + Send + Sync>>,
}

impl WatchGuard {
    /// Wrap a registration whose `Drop` unregisters the watch
    pub fn new<R>(registration: R) -> Self
    where
        R: Send + Sync + 'static,
    {
        Self {
            _registration: Some(Box::new(registration)),
        }
    }

    /// Guard with nothing to release
    pub fn detached() -> Self {
        Self {
            _registration: None,
        }
    }
}

impl fmt::Debug for WatchGuard {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("WatchGuard")
            .field("attached", &self._registration.is_some())
            .finish()
    }
}

/// An installed watch: the data at registration time plus the stream of
/// every change after it.
///
/// The snapshot and the registration are taken atomically, so no change can
/// fall between `initial` and the first item on `events`.
#[derive(Debug)]
pub struct NodeWatch {
    path: String,
    initial: Option<Bytes>,
    events: mpsc::Receiver<NodeEvent>,
    guard: WatchGuard,
}

impl NodeWatch {
    pub fn new(
        path: impl Into<String>,
        initial: Option<Bytes>,
        events: mpsc::Receiver<NodeEvent>,
        guard: WatchGuard,
    ) -> Self {
        Self {
            path: path.into(),
            initial,
            events,
            guard,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Node data when the watch was installed. `None` when the node is absent.
    pub fn initial(&self) -> Option<&Bytes> {
        self.initial.as_ref()
    }

    /// Receive the next change. `None` once the store side has gone away.
    pub async fn next_event(&mut self) -> Option<NodeEvent> {
        self.events.recv().await
    }

    pub fn into_parts(self) -> (Option<Bytes>, mpsc::Receiver<NodeEvent>, WatchGuard) {
        (self.initial, self.events, self.guard)
    }
}

/// Client for a hierarchical, watchable coordination store
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CoordinationClient: Send + Sync + 'static {
    /// Establish the session. A single attempt; retries are driven by the caller.
    async fn connect(&self) -> ClientResult<()>;

    /// Tear down the session. Watches registered through this client end.
    async fn close(&self) -> ClientResult<()>;

    /// Read node data. `Ok(None)` when the node does not exist.
    async fn get_data(
        &self,
        path: &str,
    ) -> ClientResult<Option<Bytes>>;

    /// Create a node. Fails with [`ClientError::NodeExists`] if present.
    async fn create(
        &self,
        path: &str,
        data: Bytes,
    ) -> ClientResult<()>;

    /// Replace node data. Fails with [`ClientError::NoNode`] if absent.
    async fn set_data(
        &self,
        path: &str,
        data: Bytes,
    ) -> ClientResult<()>;

    /// Remove a node. Fails with [`ClientError::NoNode`] if absent.
    async fn delete(
        &self,
        path: &str,
    ) -> ClientResult<()>;

    /// Atomically read the node and subscribe to its future changes.
    async fn watch(
        &self,
        path: &str,
    ) -> ClientResult<NodeWatch>;
}

/// Produces a client from the service settings when none was injected.
#[cfg_attr(test, automock)]
pub trait ClientFactory: Send + Sync + 'static {
    fn create(
        &self,
        config: &ServiceConfig,
    ) -> ClientResult<Arc<dyn CoordinationClient>>;
}

/// Default factory: an in-process [`MemoryCoordinator`] sized by the watch settings.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryClientFactory;

impl ClientFactory for MemoryClientFactory {
    fn create(
        &self,
        config: &ServiceConfig,
    ) -> ClientResult<Arc<dyn CoordinationClient>> {
        Ok(Arc::new(MemoryCoordinator::new(config.watch.clone())))
    }
}
