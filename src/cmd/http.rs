//! Minimal HTTP client plumbing shared by the client-side subcommands.

use std::time::Duration;

use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::error::BeaconError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Join `base` (e.g. `http://localhost:3000/`) and `path`.
pub(super) fn endpoint(base: &str, path: &str) -> Result<hyper::Uri, BeaconError> {
    let url = format!("{}{path}", base.trim_end_matches('/'));
    url.parse()
        .map_err(|e: hyper::http::uri::InvalidUri| BeaconError::UriParse {
            source: Box::new(e),
        })
}

pub(super) async fn send(
    req: hyper::Request<Full<bytes::Bytes>>,
    what: &str,
) -> Result<hyper::Response<Incoming>, BeaconError> {
    let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

    tokio::time::timeout(REQUEST_TIMEOUT, client.request(req))
        .await
        .map_err(|_| BeaconError::HttpRequest {
            source: format!("{what} timed out after {}s", REQUEST_TIMEOUT.as_secs()).into(),
        })?
        .map_err(|e| BeaconError::HttpRequest {
            source: Box::new(e),
        })
}
