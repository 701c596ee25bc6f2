//! `beacon publish`: publish a payload through a running instance.
//!
//! Posts the payload to `/publish/{channel}` and prints the envelope the
//! server stamped. A payload that is not valid JSON is sent as a JSON
//! string, so `beacon publish news hello` works without quoting.

use http_body_util::BodyExt;

use super::http;
use crate::cli::PublishArgs;
use crate::delivery::ApiResponse;
use crate::error::BeaconError;

/// Interpret a command-line payload as JSON, falling back to a string.
#[must_use]
pub fn parse_payload(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

pub async fn execute(args: PublishArgs) -> Result<(), BeaconError> {
    let uri = publish_uri(&args.url, &args.channel)?;
    let body = serde_json::to_vec(&parse_payload(&args.payload))?;

    let req = hyper::Request::builder()
        .method(hyper::Method::POST)
        .uri(uri)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(http_body_util::Full::new(bytes::Bytes::from(body)))
        .map_err(|e| BeaconError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = http::send(req, "publish").await?;
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| BeaconError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();

    let reply: ApiResponse = serde_json::from_slice(&body).map_err(|_| {
        BeaconError::PublishRejected {
            code: status.as_u16(),
            message: String::from_utf8_lossy(&body).into_owned(),
        }
    })?;

    if reply.code != ApiResponse::OK {
        return Err(BeaconError::PublishRejected {
            code: reply.code,
            message: reply.msg.unwrap_or_default(),
        });
    }

    match reply.into_envelope() {
        Some(envelope) => println!(
            "\u{2713} published to {} at {}",
            envelope.channel, envelope.timestamp
        ),
        None => println!("\u{2713} published to {}", args.channel),
    }
    Ok(())
}

/// `{base}/publish/{channel}`, with the channel escaped as one path segment.
fn publish_uri(base: &str, channel: &str) -> Result<hyper::Uri, BeaconError> {
    let mut url = url::Url::parse(base).map_err(|e| BeaconError::UriParse {
        source: Box::new(e),
    })?;
    url.path_segments_mut()
        .map_err(|()| BeaconError::UriParse {
            source: format!("{base} cannot carry a path").into(),
        })?
        .pop_if_empty()
        .push("publish")
        .push(channel);
    url.as_str()
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| BeaconError::UriParse {
            source: Box::new(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_payloads_are_parsed() {
        assert_eq!(parse_payload("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_payload("42"), json!(42));
    }

    #[test]
    fn bare_words_become_strings() {
        assert_eq!(parse_payload("hello"), json!("hello"));
    }

    #[test]
    fn channel_segments_are_escaped() {
        let uri = publish_uri("http://localhost:3000/", "room/1 a").unwrap();
        assert_eq!(uri.path(), "/publish/room%2F1%20a");

        let uri = publish_uri("http://localhost:3000", "news").unwrap();
        assert_eq!(uri.to_string(), "http://localhost:3000/publish/news");
    }

    #[test]
    fn base_without_a_path_is_rejected() {
        assert!(publish_uri("mailto:ops@example.com", "news").is_err());
        assert!(publish_uri("not a url", "news").is_err());
    }
}
