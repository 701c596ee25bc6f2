//! `beacon init`: generate a starter configuration file.
//!
//! Creates a YAML, JSON, or TOML config file with either minimal
//! or fully documented templates.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::error::BeaconError;

pub fn execute(args: &InitArgs) -> Result<(), BeaconError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("beacon.{}", args.format.extension())));

    if output.exists() {
        return Err(BeaconError::FileExists { path: output });
    }

    std::fs::write(&output, template(&args.format, args.full))?;
    println!("Created {}", output.display());
    Ok(())
}

#[must_use]
pub const fn template(format: &ConfigFormat, full: bool) -> &'static str {
    match (format, full) {
        (ConfigFormat::Yaml, false) => YAML_MINIMAL,
        (ConfigFormat::Yaml, true) => YAML_FULL,
        (ConfigFormat::Json, false) => JSON_MINIMAL,
        (ConfigFormat::Json, true) => JSON_FULL,
        (ConfigFormat::Toml, false) => TOML_MINIMAL,
        (ConfigFormat::Toml, true) => TOML_FULL,
    }
}

const YAML_MINIMAL: &str = r#"# Beacon config. Every key is optional; see `beacon init --full`.

cache:
  ttl_secs: 10
"#;

const YAML_FULL: &str = r#"# Beacon config
#
# All values shown are defaults. Uncomment and modify as needed.

# Shared bus every node publishes to and listens on
# bus:
#   topic: "beacon:broadcast"
#   retry_initial_ms: 250        # First resubscribe delay after a bus failure
#   retry_max_ms: 5000           # Backoff ceiling

# Catch-up cache: latest envelope per channel, read by long-poll clients
cache:
  prefix: "beacon"               # Keys are "<prefix>/<channel>"
  ttl_secs: 10
  write_policy: set_if_absent    # or "overwrite" (latest message wins)

# websocket:
#   ping_interval_secs: 30
#   buffer: 64                   # Envelopes queued per connection before drops

# longpoll:
#   min_timeout_ms: 10000        # Requested timeouts outside [min, max]
#   max_timeout_ms: 120000       # fall back to default_timeout_ms
#   default_timeout_ms: 60000
"#;

const JSON_MINIMAL: &str = r#"{
  "cache": {
    "ttl_secs": 10
  }
}
"#;

const JSON_FULL: &str = r#"{
  "bus": {
    "topic": "beacon:broadcast",
    "retry_initial_ms": 250,
    "retry_max_ms": 5000
  },
  "cache": {
    "prefix": "beacon",
    "ttl_secs": 10,
    "write_policy": "set_if_absent"
  },
  "websocket": {
    "ping_interval_secs": 30,
    "buffer": 64
  },
  "longpoll": {
    "min_timeout_ms": 10000,
    "max_timeout_ms": 120000,
    "default_timeout_ms": 60000
  }
}
"#;

const TOML_MINIMAL: &str = r#"# Beacon config. Every key is optional; see `beacon init --full`.

[cache]
ttl_secs = 10
"#;

const TOML_FULL: &str = r#"# Beacon config
#
# All values shown are defaults. Uncomment and modify as needed.

[bus]
# topic = "beacon:broadcast"
# retry_initial_ms = 250
# retry_max_ms = 5000

[cache]
# prefix = "beacon"
# ttl_secs = 10
# write_policy = "set_if_absent"

[websocket]
# ping_interval_secs = 30
# buffer = 64

[longpoll]
# min_timeout_ms = 10000
# max_timeout_ms = 120000
# default_timeout_ms = 60000
"#;
