use serial_test::serial;
use temp_env::with_vars;

use super::*;

fn cleanup_all_patchlog_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("PATCHLOG__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = PatchlogConfig::default();

    assert_eq!(config.log.idle_timeout_in_ms, 10_000);
    assert_eq!(config.log.catchup_buffer_size, 256);
    assert_eq!(config.log.output_buffer_size, 128);
    assert_eq!(config.log.tail_idle_timeout(), None);
    assert_eq!(config.storage.log_file_suffix, ".json.log");
    assert!(!config.state.compact_on_load);
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_patchlog_env_vars();
    with_vars(
        vec![
            ("PATCHLOG__LOG__CATCHUP_BUFFER_SIZE", Some("1025")),
            ("PATCHLOG__STATE__COMPACT_ON_LOAD", Some("true")),
        ],
        || {
            let config = PatchlogConfig::new().unwrap();

            assert_eq!(config.log.catchup_buffer_size, 1025);
            assert!(config.state.compact_on_load);
        },
    );
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_patchlog_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("dynamic_config.toml");

    std::fs::write(
        &config_path,
        r#"
        [storage]
        data_dir = "/tmp/xx/logs"

        [log]
        idle_timeout_in_ms = 2000
        tail_idle_timeout_in_ms = 250
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let base_config = PatchlogConfig::new().expect("success");
        let config = base_config.with_override_config(config_path.to_str().unwrap()).unwrap();

        assert_eq!(config.storage.data_dir.as_os_str().to_str(), Some("/tmp/xx/logs"));
        assert_eq!(config.log.idle_timeout_in_ms, 2000);
        assert_eq!(
            config.log.tail_idle_timeout(),
            Some(std::time::Duration::from_millis(250))
        );
        // untouched keys keep their defaults
        assert_eq!(config.log.output_buffer_size, 128);
    });
}

#[test]
#[serial]
fn environment_variables_should_have_highest_priority() {
    cleanup_all_patchlog_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("test_config.toml");
    std::fs::write(
        &config_path,
        r#"
        [log]
        idle_timeout_in_ms = 3000
        "#,
    )
    .unwrap();

    with_vars(
        vec![
            ("CONFIG_PATH", Some(config_path.to_str().unwrap())),
            ("PATCHLOG__LOG__IDLE_TIMEOUT_IN_MS", Some("4000")),
        ],
        || {
            let config = PatchlogConfig::new().unwrap();
            assert_eq!(config.log.idle_timeout_in_ms, 4000);
        },
    );
}

#[test]
fn validation_should_reject_zero_buffers() {
    let mut config = PatchlogConfig::default();
    config.log.catchup_buffer_size = 0;
    assert!(config.validate().is_err());

    let mut config = PatchlogConfig::default();
    config.log.output_buffer_size = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_tail_timeout_longer_than_idle_timeout() {
    let mut config = PatchlogConfig::default();
    config.log.idle_timeout_in_ms = 100;
    config.log.tail_idle_timeout_in_ms = 200;

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_empty_data_dir() {
    let mut config = PatchlogConfig::default();
    config.storage.data_dir = std::path::PathBuf::new();

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_accept_defaults() {
    assert!(PatchlogConfig::default().validate().is_ok());
}
