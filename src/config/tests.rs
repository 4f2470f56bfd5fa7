use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use super::settings::Settings;
use super::{load_config, load_config_from};
use crate::broker::RoutingMode;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 4000);
    assert_eq!(settings.server.max_connections, 1000);
    assert_eq!(settings.broker.routing, RoutingMode::Shared);
    assert_eq!(settings.store.max_messages, 10_000);
    assert_eq!(settings.store.message_ttl_secs, 3600);
    assert_eq!(settings.log.level, "info");
}

#[test]
fn test_zero_disables_store_limits() {
    let mut settings = Settings::default();
    settings.store.max_messages = 0;
    settings.store.message_ttl_secs = 0;
    assert_eq!(settings.store.message_cap(), None);
    assert_eq!(settings.store.ttl_seconds(), None);
}

#[test]
#[serial]
fn load_config_without_file_uses_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let missing = tmp.path().join("nope");
    let cfg = load_config_from(missing.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg, Settings::default());
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let base = tmp.path().join("default");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [broker]
        routing = "per_channel"

        [store]
        max_messages = 10
    "#;
    fs::write(tmp.path().join("default.toml"), toml).expect("write config file");

    let cfg = load_config_from(base.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.server.max_connections, 1000);
    assert_eq!(cfg.broker.routing, RoutingMode::PerChannel);
    assert_eq!(cfg.store.max_messages, 10);
    assert_eq!(cfg.store.message_ttl_secs, 3600);
}

#[test]
#[serial]
fn load_config_reads_environment_overrides() {
    temp_env::with_vars(
        [
            ("CHATBUS_SERVER__PORT", Some("4555")),
            ("CHATBUS_LOG__LEVEL", Some("debug")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.port, 4555);
            assert_eq!(cfg.log.level, "debug");
        },
    );
}

#[test]
#[serial]
fn load_config_only_honours_prefixed_environment() {
    temp_env::with_vars(
        [
            ("SERVER_PORT", Some("4555")),
            ("CHATBUS_STORE__MESSAGE_TTL_SECS", Some("60")),
            ("CHATBUS_BROKER__ROUTING", Some("per_channel")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.port, 4000);
            assert_eq!(cfg.store.message_ttl_secs, 60);
            assert_eq!(cfg.broker.routing, RoutingMode::PerChannel);
        },
    );
}
