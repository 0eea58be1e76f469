//! Host-scoped overrides and the hostname sub-key toggle.

use d_switch::FeatureSwitch;

use crate::common::connected_store;
use crate::common::local_hostname;
use crate::common::put;
use crate::common::start_service;

#[tokio::test]
async fn test_host_value_beats_base() {
    let host = local_hostname();
    let store = connected_store().await;
    put(&store, "/zkfss/blah", "false").await;
    put(&store, &format!("/zkfss/blah/{host}"), "true").await;
    let service = start_service(&store, None, true).await;

    let resolution = service.explain("blah").await.unwrap();

    assert!(resolution.enabled);
    assert_eq!(resolution.matched_path, Some(format!("/zkfss/blah/{host}")));

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_application_beats_host() {
    let host = local_hostname();
    let store = connected_store().await;
    put(&store, &format!("/zkfss/blah/{host}"), "true").await;
    put(&store, "/zkfss/blah/XYZ", "false").await;
    let service = start_service(&store, Some("XYZ"), true).await;

    assert!(!service.is_enabled("blah").await.unwrap());

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_disabled_hostname_subkey_skips_host_tiers() {
    let host = local_hostname();
    let store = connected_store().await;
    put(&store, "/zkfss/blah/XYZ", "true").await;
    put(&store, &format!("/zkfss/blah/XYZ/{host}"), "false").await;
    put(&store, &format!("/zkfss/blah/{host}"), "false").await;
    let service = start_service(&store, Some("XYZ"), false).await;

    assert!(service.is_enabled("blah").await.unwrap());
    assert_eq!(
        service.candidate_paths("blah").unwrap(),
        vec!["/zkfss/blah/XYZ".to_string(), "/zkfss/blah".to_string()]
    );

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_candidate_chain_most_specific_first() {
    let host = local_hostname();
    let store = connected_store().await;
    let service = start_service(&store, Some("XYZ"), true).await;

    let candidates = service.candidate_paths("blah").unwrap();

    assert_eq!(
        candidates,
        vec![
            format!("/zkfss/blah/XYZ/{host}"),
            "/zkfss/blah/XYZ".to_string(),
            format!("/zkfss/blah/{host}"),
            "/zkfss/blah".to_string(),
        ]
    );

    service.stop().await.unwrap();
}
