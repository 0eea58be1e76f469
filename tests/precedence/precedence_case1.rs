//! Lookups against a pre-populated store, one service per case.

use d_switch::CoordinationClient;
use d_switch::FeatureSwitch;

use crate::common::connected_store;
use crate::common::local_hostname;
use crate::common::put;
use crate::common::start_service;

#[tokio::test]
async fn test_nothing_set_is_off() {
    let store = connected_store().await;
    let service = start_service(&store, None, true).await;

    assert!(!service.is_enabled("blah").await.unwrap());

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_base_value_turns_switch_on() {
    let store = connected_store().await;
    put(&store, "/zkfss/blah", "true").await;
    let service = start_service(&store, None, true).await;

    assert!(service.is_enabled("blah").await.unwrap());

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_application_value_beats_base() {
    let store = connected_store().await;
    put(&store, "/zkfss/blah", "true").await;
    put(&store, "/zkfss/blah/XYZ", "false").await;
    let service = start_service(&store, Some("XYZ"), true).await;

    assert!(!service.is_enabled("blah").await.unwrap());

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_application_host_value_beats_application() {
    let host = local_hostname();
    let store = connected_store().await;
    put(&store, "/zkfss/blah/XYZ", "true").await;
    put(&store, &format!("/zkfss/blah/XYZ/{host}"), "false").await;
    let service = start_service(&store, Some("XYZ"), true).await;

    assert!(!service.is_enabled("blah").await.unwrap());

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_other_applications_do_not_leak() {
    let store = connected_store().await;
    put(&store, "/zkfss/blah/ABC", "true").await;
    let service = start_service(&store, Some("XYZ"), false).await;

    assert!(!service.is_enabled("blah").await.unwrap());

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_nested_keys_resolve_under_their_own_subtree() {
    let store = connected_store().await;
    put(&store, "/zkfss/checkout", "false").await;
    put(&store, "/zkfss/checkout/new-flow", "true").await;
    let service = start_service(&store, None, false).await;

    assert!(service.is_enabled("checkout/new-flow").await.unwrap());
    assert!(!service.is_enabled("checkout").await.unwrap());

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_recognized_encodings() {
    let store = connected_store().await;
    for (key, raw, expected) in [
        ("a", "true", Some(true)),
        ("b", "TRUE", Some(true)),
        ("c", "1", Some(true)),
        ("d", "false", Some(false)),
        ("e", "False", Some(false)),
        ("f", "0", Some(false)),
        ("g", "yes", None),
        ("h", " true", None),
        ("i", "", None),
    ] {
        put(&store, &format!("/zkfss/{key}"), raw).await;
        let resolution_expected = expected.unwrap_or(false);
        let service = start_service(&store, None, false).await;

        let resolution = service.explain(key).await.unwrap();

        assert_eq!(resolution.enabled, resolution_expected, "{raw:?}");
        assert_eq!(resolution.matched_path.is_some(), expected.is_some(), "{raw:?}");
        service.stop().await.unwrap();
        store.connect().await.unwrap();
    }
}
