use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use d_switch::CoordinationClient;
use d_switch::FeatureSwitch;
use d_switch::FeatureSwitchService;
use d_switch::MemoryCoordinator;
use d_switch::WatchConfig;
use tokio::time::sleep;
use tokio::time::Instant;

pub const NAMESPACE: &str = "/zkfss/";

/// Upper bound for a store write to be reflected in lookups
pub const PUSH_DEADLINE: Duration = Duration::from_secs(5);

pub fn local_hostname() -> String {
    hostname::get()
        .expect("hostname available")
        .into_string()
        .expect("hostname is valid unicode")
}

pub async fn connected_store() -> Arc<MemoryCoordinator> {
    let store = Arc::new(MemoryCoordinator::new(WatchConfig::default()));
    store.connect().await.expect("store connects");
    store
}

/// Create or overwrite `path`
pub async fn put(
    store: &MemoryCoordinator,
    path: &str,
    value: &str,
) {
    let data = Bytes::copy_from_slice(value.as_bytes());
    if store.create(path, data.clone()).await.is_err() {
        store.set_data(path, data).await.expect("overwrite existing node");
    }
}

pub async fn remove(
    store: &MemoryCoordinator,
    path: &str,
) {
    store.delete(path).await.expect("node exists");
}

/// A running service over `store`
pub async fn start_service(
    store: &Arc<MemoryCoordinator>,
    application: Option<&str>,
    use_hostname: bool,
) -> FeatureSwitchService {
    let service = FeatureSwitchService::new();
    service.set_client(store.clone()).expect("stopped service accepts client");
    if let Some(application) = application {
        service.set_application_name(application).expect("stopped service accepts name");
    }
    if !use_hostname {
        service.disable_hostname_subkey().expect("stopped service accepts flag");
    }
    service.start().await.expect("service starts");
    service
}

/// Poll `key` until it reads `expected` or the deadline passes; returns the
/// last value seen.
pub async fn wait_for_switch(
    service: &FeatureSwitchService,
    key: &str,
    expected: bool,
) -> bool {
    let deadline = Instant::now() + PUSH_DEADLINE;
    loop {
        let value = service.is_enabled(key).await.expect("lookup succeeds");
        if value == expected || Instant::now() >= deadline {
            return value;
        }
        sleep(Duration::from_millis(5)).await;
    }
}
