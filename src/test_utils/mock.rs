use bytes::Bytes;
use tokio::sync::mpsc;

use crate::NodeEvent;
use crate::NodeWatch;
use crate::WatchGuard;

/// A watch primed with `initial` plus the sender feeding its events
pub fn mock_watch(
    path: &str,
    initial: Option<&'static str>,
) -> (NodeWatch, mpsc::Sender<NodeEvent>) {
    let (tx, rx) = mpsc::channel(16);
    let watch = NodeWatch::new(
        path,
        initial.map(|v| Bytes::from_static(v.as_bytes())),
        rx,
        WatchGuard::detached(),
    );
    (watch, tx)
}

/// A watch whose event stream is already closed
pub fn static_watch(
    path: &str,
    initial: Option<&'static str>,
) -> NodeWatch {
    mock_watch(path, initial).0
}
