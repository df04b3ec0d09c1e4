//! Global logging installation
//!
//! The subscriber is process-wide, so these tests run serially.

use rvoip_bridge_core::logging::{forward_engine_log, parse_log_level};
use rvoip_bridge_core::{setup_logging, BridgeConfig, BridgeError, LoggingConfig};
use serial_test::serial;

#[test]
#[serial]
fn test_subscriber_installs_once() {
    let level = parse_log_level("debug").unwrap();
    let first = setup_logging(LoggingConfig::new(level).with_engine_level(tracing::Level::TRACE));
    assert!(first.is_ok());

    let second = setup_logging(LoggingConfig::default());
    assert!(matches!(second, Err(BridgeError::Configuration { ref field, .. }) if field == "logging"));
}

#[test]
#[serial]
fn test_config_file_round_trip() {
    let path = std::env::temp_dir().join(format!("rvoip-bridge-{}.toml", std::process::id()));
    let config = BridgeConfig::default().with_console_log_level(4);
    std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

    let loaded = BridgeConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded, config);

    forward_engine_log(loaded.console_log_level, "config loaded");
    assert!(BridgeConfig::from_file(&path).is_err());
}
