//! Integration tests for configuration loading

use restaurant_occupancy::infra::Config;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[server]
bind_address = "127.0.0.1"
port = 8088

[ledger]
path = "/var/lib/occupancy/ledger.json"

[restaurant]
name = "Warung Makan"
max_capacity = 40
alert_threshold = 75

[metrics]
interval_secs = 15
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.bind_address(), "127.0.0.1");
    assert_eq!(config.port(), 8088);
    assert_eq!(config.listen_addr(), "127.0.0.1:8088");
    assert_eq!(config.ledger_path(), "/var/lib/occupancy/ledger.json");
    assert_eq!(config.restaurant_name(), "Warung Makan");
    assert_eq!(config.max_capacity(), 40);
    assert_eq!(config.alert_threshold(), 75);
    assert_eq!(config.metrics_interval_secs(), 15);

    let seed = config.seed_restaurant();
    assert_eq!(seed.name, "Warung Makan");
    assert_eq!(seed.max_capacity, 40);
}

#[test]
fn test_invalid_threshold_is_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[restaurant]\nalert_threshold = 150\n").unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());
    // load_from_path falls back to defaults instead of failing
    assert_eq!(Config::load_from_path(temp_file.path()).alert_threshold(), 80);
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.port(), 3000);
    assert_eq!(config.max_capacity(), 50);
    assert_eq!(config.config_file(), "default");
}
