//! Integration tests for config loading across all file formats.

use beacon::config::model::{CacheWritePolicy, Config};
use beacon::config::sources::parse_config_str;
use beacon::config::validation::validate;

fn load_example(name: &str) -> String {
    let path = format!("example/{name}");
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {path}: {e}"))
}

#[test]
fn yaml_example_loads_and_validates() {
    let content = load_example("beacon.yaml");
    let config = parse_config_str("yaml", &content, "beacon.yaml").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.bus.topic, "chat:broadcast");
    assert_eq!(config.cache.write_policy, CacheWritePolicy::Overwrite);
    // Unset sections keep their defaults.
    assert_eq!(config.websocket, Config::default().websocket);
}

#[test]
fn yaml_full_example_loads_and_validates() {
    let content = load_example("full.yaml");
    let config = parse_config_str("yaml", &content, "full.yaml").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.websocket.buffer, 256);
    assert_eq!(config.longpoll.min_timeout_ms, 5000);
    assert_eq!(config.cache.prefix, "beacon-prod");
}

#[cfg(feature = "json")]
#[test]
fn json_example_loads_and_validates() {
    let content = load_example("beacon.json");
    let config = parse_config_str("json", &content, "beacon.json").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.cache.ttl_secs, 30);
}

#[cfg(feature = "toml")]
#[test]
fn toml_example_loads_and_validates() {
    let content = load_example("beacon.toml");
    let config = parse_config_str("toml", &content, "beacon.toml").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.cache.ttl_secs, 30);
}

#[cfg(all(feature = "json", feature = "toml"))]
#[test]
fn all_formats_produce_equivalent_configs() {
    let yaml = parse_config_str("yaml", &load_example("beacon.yaml"), "yaml").unwrap();
    let json = parse_config_str("json", &load_example("beacon.json"), "json").unwrap();
    let toml = parse_config_str("toml", &load_example("beacon.toml"), "toml").unwrap();

    assert_eq!(yaml, json);
    assert_eq!(yaml, toml);
}

#[test]
fn empty_document_is_the_default_config() {
    let config = parse_config_str("yaml", "{}", "empty.yaml").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn unknown_keys_are_rejected() {
    let result = parse_config_str("yaml", "bus:\n  topik: x\n", "typo.yaml");
    assert!(result.is_err());
}

#[test]
fn unsupported_format_returns_error() {
    let result = parse_config_str("xml", "{}", "test.xml");
    assert!(result.is_err());
}

#[test]
fn invalid_config_fails_validation() {
    let bad = r#"{"longpoll": {"min_timeout_ms": 90000, "max_timeout_ms": 1000}}"#;
    let config: Config = serde_json::from_str(bad).unwrap();
    let errors = validate(&config).unwrap_err();
    assert!(errors.iter().any(|e| e.section == "longpoll"));
}
