//! HTTP routes for the webhook gateway.

use std::net::{IpAddr, SocketAddr};

use axum::Router;
use axum::body::Body;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{ConnectInfo, Json, Path, Query, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;
use serde_json::json;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::error::ProxyError;
use crate::forwarder::{self, Classification, ExecuteParams, UpstreamResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    /// Server status ("ok").
    status: String,
    /// Server version.
    version: String,
    /// Server uptime in seconds.
    uptime_seconds: u64,
    /// Whether the auto-block sweeper is enabled.
    auto_block: bool,
    /// Number of blocklisted webhook IDs.
    blocked: usize,
    /// Webhook IDs with a live upstream rate-limit record.
    rate_limited: usize,
    /// Webhook IDs currently suppressed as nonexistent.
    suppressed: usize,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Builds the main application router.
pub fn router(state: AppState) -> Router {
    // Throttles apply only to the webhook route; layered so the primary
    // throttle runs first and the invalid throttle sees the final status.
    let webhook = Router::new()
        .route("/api/webhooks/{id}/{token}", post(execute_webhook))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            invalid_throttle_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            primary_throttle_middleware,
        ));

    Router::new()
        .route("/", get(landing))
        .route("/health", get(health))
        .merge(webhook)
        .fallback(unknown_endpoint)
        // A mismatched method on a known path is an unknown endpoint too,
        // not a bare 405
        .method_not_allowed_fallback(unknown_endpoint)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolves the client address, honoring `X-Forwarded-For` only when the
/// gateway is configured to trust it.
fn client_ip(headers: &HeaderMap, addr: SocketAddr, trust_proxy: bool) -> IpAddr {
    if trust_proxy
        && let Some(xff) = headers.get("x-forwarded-for")
        && let Ok(value) = xff.to_str()
        && let Some(first) = value.split(',').next()
        && let Ok(ip) = first.trim().parse::<IpAddr>()
    {
        return ip;
    }
    addr.ip()
}

/// Throttle key for a request: the webhook ID when the route carries one,
/// otherwise the client address.
fn throttle_key(
    id: Option<&str>,
    headers: &HeaderMap,
    addr: SocketAddr,
    trust_proxy: bool,
) -> String {
    match id {
        Some(id) => id.to_string(),
        None => client_ip(headers, addr, trust_proxy).to_string(),
    }
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Slows down keys sending faster than the soft burst limit.
async fn primary_throttle_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    path: Option<Path<(String, String)>>,
    req: Request,
    next: Next,
) -> Response {
    let id = path.as_ref().map(|Path((id, _))| id.as_str());
    let key = throttle_key(id, req.headers(), addr, state.trust_proxy());
    state.primary_throttle().acquire(&key).await;
    next.run(req).await
}

/// Slows down keys that keep producing client-error outcomes.
///
/// The delay owed from past outcomes is served before the handler runs; the
/// final response status decides whether this request charges the next one.
/// 429s are quota exhaustion, not malformed traffic, and are not charged.
async fn invalid_throttle_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    path: Option<Path<(String, String)>>,
    req: Request,
    next: Next,
) -> Response {
    let id = path.as_ref().map(|Path((id, _))| id.as_str());
    let key = throttle_key(id, req.headers(), addr, state.trust_proxy());
    state.invalid_throttle().hold(&key).await;

    let response = next.run(req).await;

    let status = response.status();
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        state.invalid_throttle().charge(&key);
    }
    response
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Serves the landing page.
async fn landing() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

/// Reports gateway health and abuse-control state.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_secs(),
        auto_block: state.auto_block(),
        blocked: state.blocklist().len(),
        rate_limited: state.rate_limits().len(),
        suppressed: state.nonexistent().len(),
    })
}

/// Relays one webhook execution to the upstream.
async fn execute_webhook(
    State(state): State<AppState>,
    Path((id, token)): Path<(String, String)>,
    query: Result<Query<ExecuteParams>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Response, ProxyError> {
    let Query(params) =
        query.map_err(|_| ProxyError::InvalidRequest("Invalid query parameters.".to_string()))?;
    let Json(body) =
        body.map_err(|_| ProxyError::InvalidRequest("Request body must be valid JSON.".to_string()))?;

    state.gate().decide(&id)?;

    let upstream = state
        .forwarder()
        .forward(&id, &token, &params, &headers, &body)
        .await?;

    // Quota bookkeeping happens whatever the status was
    if let Some(reset) = forwarder::quota_reset(&upstream.headers) {
        tracing::debug!(id = %id, reset, "upstream quota exhausted");
        state.rate_limits().set(&id, reset);
    }

    match forwarder::classify(upstream.status) {
        Classification::NotFound => {
            tracing::info!(id = %id, "upstream reported missing webhook, suppressing");
            state.nonexistent().insert(&id);
            Err(ProxyError::Nonexistent)
        }
        Classification::ClientError => {
            let count = state.bad_requests().record(&id);
            tracing::debug!(id = %id, count, status = %upstream.status, "upstream rejected request");
            Ok(relay(upstream))
        }
        Classification::Relay => Ok(relay(upstream)),
    }
}

/// Builds the client response for a relayed upstream response.
fn relay(upstream: UpstreamResponse) -> Response {
    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = forwarder::relay_headers(&upstream.headers);
    response
}

/// Fallback for paths the gateway does not serve, throttled per address.
async fn unknown_endpoint(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let ip = client_ip(&headers, addr, state.trust_proxy()).to_string();
    state.unknown_throttle().acquire(&ip).await;
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "proxy": true, "message": "Unknown endpoint." })),
    )
}
