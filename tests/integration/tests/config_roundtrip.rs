//! Config save/load roundtrip integration tests.

use std::path::Path;
use tempfile::TempDir;
use voicerelay_core::config::{BindMode, Config, LogLevel};
use voicerelay_core::SecretString;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("voicerelay.json5");

    let config = Config::default();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.gateway.port, config.gateway.port);
    assert_eq!(loaded.gateway.bind, config.gateway.bind);
    assert_eq!(loaded.upstream.model, config.upstream.model);
    assert_eq!(loaded.webrtc.ice_servers, config.webrtc.ice_servers);
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("voicerelay.json5");

    let mut config = Config::default();
    config.gateway.port = 9090;
    config.gateway.bind = BindMode::Lan;
    config.logging.level = LogLevel::Debug;
    config.webhook.url = Some("https://hooks.example.com/relay".to_string());
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.gateway.port, 9090);
    assert_eq!(loaded.gateway.bind, BindMode::Lan);
    assert_eq!(loaded.logging.level, LogLevel::Debug);
    assert_eq!(
        loaded.webhook_url().as_deref(),
        Some("https://hooks.example.com/relay")
    );
}

#[test]
fn test_api_key_survives_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("voicerelay.json5");

    let mut config = Config::default();
    config.upstream.api_key = Some(SecretString::new("sk-roundtrip"));
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(
        loaded.upstream.api_key.as_ref().map(|k| k.expose_secret().to_string()),
        Some("sk-roundtrip".to_string())
    );
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json5");

    assert!(Config::load(&path).is_err());
    let config = Config::load_or_default_from(&path);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_load_nonexistent() {
    let result = Config::load(Path::new("/nonexistent/voicerelay.json5"));
    assert!(result.is_err());
}

#[test]
fn test_config_parse_invalid() {
    assert!(Config::parse("not valid json").is_err());
}

