//! Store writes after the first lookup reach later lookups without restarts.

use d_switch::FeatureSwitch;

use crate::common::connected_store;
use crate::common::put;
use crate::common::remove;
use crate::common::start_service;
use crate::common::wait_for_switch;

#[tokio::test]
async fn test_created_override_is_picked_up() {
    let store = connected_store().await;
    let service = start_service(&store, Some("XYZ"), false).await;
    assert!(!service.is_enabled("blah").await.unwrap());

    put(&store, "/zkfss/blah/XYZ", "true").await;

    assert!(wait_for_switch(&service, "blah", true).await);
    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_updated_value_is_picked_up() {
    let store = connected_store().await;
    put(&store, "/zkfss/blah", "true").await;
    let service = start_service(&store, None, false).await;
    assert!(service.is_enabled("blah").await.unwrap());

    put(&store, "/zkfss/blah", "false").await;

    assert!(!wait_for_switch(&service, "blah", false).await);
    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_deleted_override_falls_back_to_base() {
    let store = connected_store().await;
    put(&store, "/zkfss/blah", "true").await;
    put(&store, "/zkfss/blah/XYZ", "false").await;
    let service = start_service(&store, Some("XYZ"), false).await;
    assert!(!service.is_enabled("blah").await.unwrap());

    remove(&store, "/zkfss/blah/XYZ").await;

    assert!(wait_for_switch(&service, "blah", true).await);
    let resolution = service.explain("blah").await.unwrap();
    assert_eq!(resolution.matched_path.as_deref(), Some("/zkfss/blah"));
    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_unrecognized_value_falls_through_until_fixed() {
    let store = connected_store().await;
    put(&store, "/zkfss/blah", "true").await;
    put(&store, "/zkfss/blah/XYZ", "false").await;
    let service = start_service(&store, Some("XYZ"), false).await;
    assert!(!service.is_enabled("blah").await.unwrap());

    put(&store, "/zkfss/blah/XYZ", "nope").await;
    assert!(wait_for_switch(&service, "blah", true).await);

    put(&store, "/zkfss/blah/XYZ", "0").await;
    assert!(!wait_for_switch(&service, "blah", false).await);

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_each_path_watched_once_across_lookups() {
    let store = connected_store().await;
    let service = start_service(&store, Some("XYZ"), false).await;

    for _ in 0..10 {
        service.is_enabled("blah").await.unwrap();
        service.is_enabled("other").await.unwrap();
    }

    assert_eq!(store.watcher_count("/zkfss/blah/XYZ"), 1);
    assert_eq!(store.watcher_count("/zkfss/blah"), 1);
    assert_eq!(store.watched_path_count(), 4);
    service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_share_one_watch() {
    let store = connected_store().await;
    put(&store, "/zkfss/blah", "true").await;
    let service = std::sync::Arc::new(start_service(&store, None, false).await);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = service.clone();
        handles.push(tokio::spawn(async move { service.is_enabled("blah").await }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }

    assert_eq!(store.watcher_count("/zkfss/blah"), 1);
    service.stop().await.unwrap();
}
