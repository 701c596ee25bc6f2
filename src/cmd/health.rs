//! `beacon health`: check the health of a running instance.
//!
//! Sends a `GET /health` request to the specified URL and displays
//! the response as formatted text or raw JSON.

use http_body_util::BodyExt;

use super::http;
use crate::cli::HealthArgs;
use crate::error::BeaconError;
use crate::health::HealthResponse;

pub async fn execute(args: HealthArgs) -> Result<(), BeaconError> {
    let req = hyper::Request::builder()
        .uri(http::endpoint(&args.url, "/health")?)
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .map_err(|e| BeaconError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = http::send(req, "health check").await?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| BeaconError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();

    if !status.is_success() {
        return Err(BeaconError::HealthCheckFailed(status));
    }

    if args.json {
        println!("{}", String::from_utf8_lossy(&body));
        return Ok(());
    }

    match serde_json::from_slice::<HealthResponse>(&body) {
        Ok(health) => {
            let uptime = format_uptime(health.uptime_seconds);
            println!("\u{2713} beacon is healthy ({})", args.url);
            println!("  uptime:          {uptime}");
            println!("  config source:   {}", health.config.source);
            println!(
                "  config version:  {} (loaded {}s ago)",
                health.config.version, health.config.loaded_ago_seconds
            );
            println!(
                "  bus:             {} on topic {}",
                health.bus.backend, health.bus.topic
            );
            println!("  active channels: {}", health.stats.active_channels);
            println!(
                "  messages:        {} sent, {} dropped",
                health.stats.messages_sent, health.stats.messages_dropped
            );
        }
        Err(e) => {
            eprintln!("Failed to parse health response: {e}");
            println!("{}", String::from_utf8_lossy(&body));
        }
    }

    Ok(())
}

fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::format_uptime;

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(5), "5s");
        assert_eq!(format_uptime(65), "1m 5s");
        assert_eq!(format_uptime(3725), "1h 2m 5s");
    }
}
