//! Error responses for requests the gateway answers itself.
//!
//! Every locally-decided outcome carries `"proxy": true` in its JSON body so
//! callers can tell a gateway decision apart from a relayed upstream response,
//! which never gets that marker.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Advertised per-webhook request limit, reported on 429 responses. Matches
/// the upstream's documented per-webhook burst quota.
const ADVERTISED_LIMIT: &str = "5";

/// A request the gateway refused or failed to relay.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Webhook is on the blocklist.
    #[error("webhook is blocked: {reason}")]
    Blocked { reason: String },

    /// Webhook is cached as nonexistent.
    #[error("webhook is cached as nonexistent")]
    Nonexistent,

    /// Upstream quota for this webhook is exhausted until `reset`.
    #[error("upstream rate limit active until {reset}")]
    RateLimited { reset: u64 },

    /// Malformed request body or query string.
    #[error("{0}")]
    InvalidRequest(String),

    /// Could not reach the upstream (connect failure or timeout).
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match &self {
            ProxyError::Blocked { reason } => (
                StatusCode::FORBIDDEN,
                axum::Json(json!({
                    "proxy": true,
                    "message": "This webhook has been blocked.",
                    "reason": reason,
                })),
            )
                .into_response(),

            ProxyError::Nonexistent => (
                StatusCode::NOT_FOUND,
                axum::Json(json!({
                    "proxy": true,
                    "error": "This webhook does not exist. Requests to this ID have been blocked temporarily.",
                })),
            )
                .into_response(),

            ProxyError::RateLimited { reset } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    axum::Json(json!({
                        "proxy": true,
                        "message": "You have been ratelimited. Please respect the standard rate limits.",
                    })),
                )
                    .into_response();
                let headers = response.headers_mut();
                headers.insert("x-ratelimit-limit", HeaderValue::from_static(ADVERTISED_LIMIT));
                headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
                headers.insert("x-ratelimit-reset", HeaderValue::from(*reset));
                response
            }

            ProxyError::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                axum::Json(json!({ "proxy": true, "message": msg })),
            )
                .into_response(),

            ProxyError::Upstream(msg) => {
                tracing::warn!(%msg, "upstream request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    axum::Json(json!({
                        "proxy": true,
                        "message": "Failed to reach the upstream service.",
                    })),
                )
                    .into_response()
            }

            ProxyError::Internal(msg) => {
                tracing::error!(%msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(json!({
                        "proxy": true,
                        "message": "An error occurred while processing your request.",
                    })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn blocked_is_403_with_reason() {
        let response = ProxyError::Blocked {
            reason: "spam".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_json(response).await;
        assert_eq!(body["proxy"], true);
        assert_eq!(body["reason"], "spam");
    }

    #[tokio::test]
    async fn rate_limited_sets_quota_headers() {
        let response = ProxyError::RateLimited { reset: 1_700_000_000 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert_eq!(response.headers()["x-ratelimit-reset"], "1700000000");

        let body = body_json(response).await;
        assert_eq!(body["proxy"], true);
    }

    #[tokio::test]
    async fn every_variant_carries_the_proxy_marker() {
        let errors = [
            ProxyError::Nonexistent,
            ProxyError::InvalidRequest("bad body".to_string()),
            ProxyError::Upstream("connect refused".to_string()),
            ProxyError::Internal("oops".to_string()),
        ];
        for err in errors {
            let body = body_json(err.into_response()).await;
            assert_eq!(body["proxy"], true);
        }
    }
}
