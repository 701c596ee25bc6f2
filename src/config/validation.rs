//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for values that
//! parse fine but cannot work at runtime: empty names, zero durations,
//! inverted retry or long-poll bounds. It returns every problem found as
//! a [`ValidationError`] with a per-field suggestion where one helps.

use super::model::Config;
use crate::error::ValidationError;

fn error(section: &str, field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        section: section.into(),
        field: field.into(),
        message: message.into(),
        suggestion: None,
    }
}

/// Validate a cache key prefix. Returns `Ok(())` or a human-readable error.
pub fn validate_prefix(prefix: &str) -> Result<(), String> {
    if prefix.is_empty() {
        return Err("prefix cannot be empty".into());
    }
    if prefix.ends_with('/') {
        return Err("prefix must not end with '/', it is added when building keys".into());
    }
    Ok(())
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let bus = &config.bus;
    if bus.topic.trim().is_empty() {
        errors.push(error("bus", "topic", "topic cannot be empty"));
    }
    if bus.retry_initial_ms == 0 {
        errors.push(error("bus", "retry_initial_ms", "must be greater than 0"));
    }
    if bus.retry_initial_ms > bus.retry_max_ms {
        errors.push(ValidationError {
            suggestion: Some(format!("raise retry_max_ms to at least {}", bus.retry_initial_ms)),
            ..error(
                "bus",
                "retry_max_ms",
                format!(
                    "retry_max_ms ({}) is below retry_initial_ms ({})",
                    bus.retry_max_ms, bus.retry_initial_ms
                ),
            )
        });
    }

    let cache = &config.cache;
    if let Err(msg) = validate_prefix(&cache.prefix) {
        errors.push(ValidationError {
            suggestion: cache
                .prefix
                .strip_suffix('/')
                .filter(|p| !p.is_empty())
                .map(|p| format!("did you mean '{p}'?")),
            ..error("cache", "prefix", msg)
        });
    }
    if cache.ttl_secs == 0 {
        errors.push(error("cache", "ttl_secs", "must be greater than 0"));
    }

    let websocket = &config.websocket;
    if websocket.ping_interval_secs == 0 {
        errors.push(error("websocket", "ping_interval_secs", "must be greater than 0"));
    }
    if websocket.buffer == 0 {
        errors.push(error("websocket", "buffer", "must hold at least 1 message"));
    }

    let longpoll = &config.longpoll;
    if longpoll.min_timeout_ms == 0 {
        errors.push(error("longpoll", "min_timeout_ms", "must be greater than 0"));
    }
    if longpoll.min_timeout_ms > longpoll.max_timeout_ms {
        errors.push(error(
            "longpoll",
            "max_timeout_ms",
            format!(
                "max_timeout_ms ({}) is below min_timeout_ms ({})",
                longpoll.max_timeout_ms, longpoll.min_timeout_ms
            ),
        ));
    }
    if !(longpoll.min_timeout_ms..=longpoll.max_timeout_ms).contains(&longpoll.default_timeout_ms) {
        errors.push(ValidationError {
            suggestion: Some(format!(
                "pick a value between {} and {}",
                longpoll.min_timeout_ms, longpoll.max_timeout_ms
            )),
            ..error(
                "longpoll",
                "default_timeout_ms",
                "default timeout lies outside the allowed range",
            )
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let lines = [
        format!("  bus topic:      {}", config.bus.topic),
        format!(
            "  bus retry:      {}ms .. {}ms",
            config.bus.retry_initial_ms, config.bus.retry_max_ms
        ),
        format!(
            "  catch-up cache: {}/<channel>, ttl {}s, {:?}",
            config.cache.prefix, config.cache.ttl_secs, config.cache.write_policy
        ),
        format!(
            "  websocket:      ping every {}s, buffer {}",
            config.websocket.ping_interval_secs, config.websocket.buffer
        ),
        format!(
            "  long-poll:      {}ms default, allowed {}ms .. {}ms",
            config.longpoll.default_timeout_ms,
            config.longpoll.min_timeout_ms,
            config.longpoll.max_timeout_ms
        ),
    ];

    format!("{path} is valid\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{BusConfig, CacheConfig, LongPollConfig, WebSocketConfig};

    #[test]
    fn default_config_passes() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn empty_topic_fails() {
        let config = Config {
            bus: BusConfig {
                topic: "  ".into(),
                ..BusConfig::default()
            },
            ..Config::default()
        };
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "topic");
    }

    #[test]
    fn inverted_retry_bounds_fail() {
        let config = Config {
            bus: BusConfig {
                retry_initial_ms: 1000,
                retry_max_ms: 10,
                ..BusConfig::default()
            },
            ..Config::default()
        };
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.field == "retry_max_ms" && e.suggestion.is_some()));
    }

    #[test]
    fn trailing_slash_prefix_suggests_fix() {
        let config = Config {
            cache: CacheConfig {
                prefix: "beacon/".into(),
                ..CacheConfig::default()
            },
            ..Config::default()
        };
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.suggestion.as_deref() == Some("did you mean 'beacon'?")));
    }

    #[test]
    fn zero_durations_fail() {
        let config = Config {
            cache: CacheConfig {
                ttl_secs: 0,
                ..CacheConfig::default()
            },
            websocket: WebSocketConfig {
                ping_interval_secs: 0,
                buffer: 0,
            },
            ..Config::default()
        };
        let errors = validate(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["ttl_secs", "ping_interval_secs", "buffer"]);
    }

    #[test]
    fn default_poll_timeout_outside_range_fails() {
        let config = Config {
            longpoll: LongPollConfig {
                min_timeout_ms: 10_000,
                max_timeout_ms: 20_000,
                default_timeout_ms: 60_000,
            },
            ..Config::default()
        };
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "default_timeout_ms"));
    }

    #[test]
    fn report_mentions_topic() {
        let report = format_validation_report("beacon.yaml", &Config::default());
        assert!(report.starts_with("beacon.yaml is valid"));
        assert!(report.contains("beacon:broadcast"));
    }
}
