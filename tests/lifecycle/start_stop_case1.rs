//! Start/stop transitions and the errors they gate.

use std::time::Duration;

use d_switch::BackoffPolicy;
use d_switch::CoordinationClient;
use d_switch::Error;
use d_switch::FeatureSwitch;
use d_switch::FeatureSwitchService;
use d_switch::StateError;

use crate::common::connected_store;
use crate::common::put;
use crate::common::start_service;

#[tokio::test]
async fn test_lookup_before_start_is_state_error() {
    let service = FeatureSwitchService::new();

    let err = service.is_enabled("blah").await.unwrap_err();

    assert!(matches!(err, Error::State(StateError::NotRunning)));
    assert!(err.is_state_error());
}

#[tokio::test]
async fn test_setter_after_start_is_state_error() {
    let store = connected_store().await;
    let service = start_service(&store, None, true).await;

    let err = service.set_application_name("XYZ").unwrap_err();

    assert!(matches!(err, Error::State(StateError::ConfigurationLocked)));
    assert_eq!(service.config().application_name, None);
    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_releases_every_watch() {
    let store = connected_store().await;
    let service = start_service(&store, Some("XYZ"), true).await;
    service.is_enabled("a").await.unwrap();
    service.is_enabled("b/c").await.unwrap();
    assert!(store.watched_path_count() >= 4);

    service.stop().await.unwrap();

    assert_eq!(store.watched_path_count(), 0);
    assert!(!service.is_running());
    assert!(matches!(
        service.is_enabled("a").await,
        Err(Error::State(StateError::NotRunning))
    ));
}

#[tokio::test]
async fn test_reconfigure_and_restart() {
    let store = connected_store().await;
    put(&store, "/zkfss/blah", "true").await;
    put(&store, "/flags/blah", "false").await;
    let service = start_service(&store, None, false).await;
    assert!(service.is_enabled("blah").await.unwrap());
    service.stop().await.unwrap();

    store.connect().await.unwrap();
    service
        .set_client(store.clone())
        .unwrap()
        .set_namespace("/flags")
        .unwrap()
        .set_retry_policy(BackoffPolicy::new(1, Duration::from_millis(10), Duration::from_millis(50)))
        .unwrap();
    service.start().await.unwrap();

    let resolution = service.explain("blah").await.unwrap();
    assert!(!resolution.enabled);
    assert_eq!(resolution.matched_path.as_deref(), Some("/flags/blah"));
    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_default_client_round_trip() {
    let service = FeatureSwitchService::new();
    service.disable_hostname_subkey().unwrap();
    service.start().await.unwrap();
    let client = service.client().expect("client created at start");

    assert!(!service.is_enabled("blah").await.unwrap());
    client
        .create("/zkfss/blah", bytes::Bytes::from_static(b"true"))
        .await
        .unwrap();
    assert!(crate::common::wait_for_switch(&service, "blah", true).await);

    service.stop().await.unwrap();
    assert!(service.client().is_none());
}

#[tokio::test]
async fn test_invalid_key_is_format_error() {
    let store = connected_store().await;
    let service = start_service(&store, None, false).await;

    let err = service.is_enabled("bad//key").await.unwrap_err();

    assert!(err.is_format_error());
    assert_eq!(store.watched_path_count(), 0);
    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_lookups_are_counted() {
    let store = connected_store().await;
    let service = start_service(&store, None, false).await;
    let before = d_switch::metrics::LOOKUP_TOTAL
        .with_label_values(&["default"])
        .get();

    service.is_enabled("counted").await.unwrap();

    let after = d_switch::metrics::LOOKUP_TOTAL
        .with_label_values(&["default"])
        .get();
    assert!(after > before);
    assert!(d_switch::metrics::encode_metrics().contains("switch_lookup_total"));
    service.stop().await.unwrap();
}
