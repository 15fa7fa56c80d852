//! Upstream delivery: builds the outbound request, performs the call, and
//! interprets what the response means for the gateway's caches.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use serde::Deserialize;
use url::Url;

use crate::error::ProxyError;

/// User agent the gateway presents to the upstream.
pub const USER_AGENT: &str = concat!("webhook-gateway/", env!("CARGO_PKG_VERSION"));

/// Hop marker added to every relayed response.
pub const VIA_HOP: &str = "1.0 webhook-gateway";

/// Hop-by-hop headers per RFC 7230 section 6.1. Never forwarded in either
/// direction.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Query parameters relayed to the upstream execute endpoint.
#[derive(Debug, Deserialize)]
pub struct ExecuteParams {
    /// Whether the upstream should wait for delivery confirmation.
    #[serde(default)]
    pub wait: bool,
    /// Optional thread to deliver into.
    pub thread_id: Option<String>,
}

/// Raw upstream response, not yet interpreted.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// What an upstream status means for the gateway's caches and trackers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Webhook does not exist: suppress the ID and answer locally.
    NotFound,
    /// Client error other than 429: relay, but count toward auto-block.
    ClientError,
    /// Everything else: relay untouched.
    Relay,
}

/// Classifies an upstream status, highest-priority match first.
pub fn classify(status: StatusCode) -> Classification {
    if status == StatusCode::NOT_FOUND {
        Classification::NotFound
    } else if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        Classification::ClientError
    } else {
        Classification::Relay
    }
}

/// Returns the advertised quota reset time when the upstream reports exactly
/// zero remaining requests, `None` otherwise.
pub fn quota_reset(headers: &HeaderMap) -> Option<u64> {
    let remaining = header_number(headers, "x-ratelimit-remaining")?;
    if remaining != 0 {
        return None;
    }
    header_number(headers, "x-ratelimit-reset")
}

/// Parses a numeric header, tolerating fractional-second reset values.
/// Negative and non-finite values are not numbers here; a cast would fold
/// them to 0 and fake an exhausted quota.
fn header_number(headers: &HeaderMap, name: &str) -> Option<u64> {
    let raw = headers.get(name)?.to_str().ok()?.trim();
    raw.parse::<u64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && *value >= 0.0)
            .map(|value| value as u64)
    })
}

/// Prepares client headers for the upstream request.
///
/// Hop-by-hop and envelope headers are dropped; the content type is left to
/// the JSON body writer; the gateway identifies itself as the user agent.
/// Everything else passes through verbatim.
pub fn request_headers(client: &HeaderMap) -> HeaderMap {
    let mut headers = client.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::CONTENT_TYPE);
    headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
    headers
}

/// Prepares upstream response headers for relay to the client.
///
/// Rate-limit headers pass through verbatim so callers can do their own
/// quota bookkeeping; the gateway stamps its own hop marker.
pub fn relay_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::CONTENT_LENGTH);
    headers.insert(header::VIA, HeaderValue::from_static(VIA_HOP));
    headers
}

/// Removes the RFC 7230 hop-by-hop set plus any header names declared in the
/// `Connection` header value.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let declared: Vec<HeaderName> = headers
        .get(header::CONNECTION)
        .and_then(|val| val.to_str().ok())
        .map(|val| {
            val.split(',')
                .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
                .collect()
        })
        .unwrap_or_default();
    for name in &declared {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// HTTP client for the upstream webhook API.
pub struct UpstreamForwarder {
    client: reqwest::Client,
    base: Url,
}

impl UpstreamForwarder {
    /// Creates a forwarder delivering to `base` with a per-request `timeout`.
    pub fn new(base: Url, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build upstream HTTP client");
        Self { client, base }
    }

    /// Delivers an admitted request to the upstream webhook.
    ///
    /// Non-2xx statuses are valid outcomes returned as `Ok`; only transport
    /// failures (connect error, timeout) become `Err`.
    pub async fn forward(
        &self,
        id: &str,
        token: &str,
        params: &ExecuteParams,
        client_headers: &HeaderMap,
        body: &serde_json::Value,
    ) -> Result<UpstreamResponse, ProxyError> {
        let url = self.execute_url(id, token, params);
        let headers = request_headers(client_headers);

        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|err| ProxyError::Upstream(err.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| ProxyError::Upstream(err.to_string()))?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }

    /// Builds the upstream execute URL for one webhook.
    fn execute_url(&self, id: &str, token: &str, params: &ExecuteParams) -> Url {
        let mut url = self.base.clone();
        url.set_path(&format!("/api/webhooks/{id}/{token}"));
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("wait", if params.wait { "true" } else { "false" });
            if let Some(thread_id) = &params.thread_id {
                query.append_pair("thread_id", thread_id);
            }
        }
        url
    }
}
