use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::sleep;
use tokio::time::Instant;

use crate::CoordinationClient;
use crate::MemoryCoordinator;
use crate::WatchConfig;

/// Upper bound for push events to reach the cache in tests
pub const PUSH_DEADLINE: Duration = Duration::from_secs(5);

pub async fn connected_store() -> Arc<MemoryCoordinator> {
    let store = Arc::new(MemoryCoordinator::new(WatchConfig::default()));
    store.connect().await.expect("memory coordinator connects");
    store
}

/// Create or overwrite `path` with `value`
pub async fn put(
    store: &MemoryCoordinator,
    path: &str,
    value: &str,
) {
    let data = Bytes::copy_from_slice(value.as_bytes());
    if store.create(path, data.clone()).await.is_err() {
        store.set_data(path, data).await.expect("set_data on existing node");
    }
}

/// Poll `sample` until it yields `expected` or the push deadline passes.
pub async fn eventually<T, F, Fut>(
    expected: T,
    mut sample: F,
) -> T
where
    T: PartialEq + std::fmt::Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
{
    let deadline = Instant::now() + PUSH_DEADLINE;
    loop {
        let value = sample().await;
        if value == expected || Instant::now() >= deadline {
            return value;
        }
        sleep(Duration::from_millis(5)).await;
    }
}
