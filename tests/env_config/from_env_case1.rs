//! Services configured from `CONFIG_PATH` files and `SWITCH__*` variables.

use std::io::Write;

use d_switch::FeatureSwitch;
use d_switch::FeatureSwitchService;
use serial_test::serial;
use temp_env::with_vars;
use tempfile::NamedTempFile;

use crate::common::connected_store;
use crate::common::put;

#[tokio::test]
#[serial]
async fn test_environment_selects_application_tier() {
    let service = with_vars(
        vec![
            ("CONFIG_PATH", None),
            ("SWITCH__NAMESPACE", Some("flags")),
            ("SWITCH__APPLICATION_NAME", Some("XYZ")),
            ("SWITCH__USE_HOSTNAME_SUBKEY", Some("false")),
        ],
        || FeatureSwitchService::from_env().unwrap(),
    );
    assert_eq!(service.config().namespace, "/flags/");

    let store = connected_store().await;
    put(&store, "/flags/blah", "true").await;
    put(&store, "/flags/blah/XYZ", "false").await;
    service.set_client(store.clone()).unwrap();
    service.start().await.unwrap();

    assert!(!service.is_enabled("blah").await.unwrap());
    service.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_config_file_then_environment() {
    let mut file = NamedTempFile::with_suffix(".toml").unwrap();
    writeln!(
        file,
        r#"
namespace = "/from-file/"
application_name = "file-app"
use_hostname_subkey = false
"#
    )
    .unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let service = with_vars(
        vec![
            ("CONFIG_PATH", Some(path.as_str())),
            ("SWITCH__APPLICATION_NAME", Some("env-app")),
            ("SWITCH__NAMESPACE", None),
            ("SWITCH__USE_HOSTNAME_SUBKEY", None),
        ],
        || FeatureSwitchService::from_env().unwrap(),
    );

    let config = service.config();
    assert_eq!(config.namespace, "/from-file/");
    assert_eq!(config.application_name.as_deref(), Some("env-app"));
    assert!(!config.use_hostname_subkey);
}

#[tokio::test]
#[serial]
async fn test_invalid_environment_is_rejected() {
    let result = with_vars(
        vec![
            ("CONFIG_PATH", None),
            ("SWITCH__APPLICATION_NAME", Some("has/slash")),
        ],
        FeatureSwitchService::from_env,
    );

    assert!(matches!(result, Err(d_switch::Error::Config(_))));
}
