//! Request pipeline and router
//!
//! The `/api/claude` handler runs a strictly linear pipeline with early exit
//! at each stage:
//!
//! CORS/method gate -> rate limit -> signature check -> body validation ->
//! credential resolution -> upstream forward -> respond
//!
//! Preflight requests are answered before the pipeline runs, so they never
//! consume rate-limit budget. The body is taken as raw bytes so the
//! signature covers exactly what arrived on the wire, and only parsed as
//! JSON after the signature checks out.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::SignatureVerifier;
use crate::config::{GatewayConfig, Secrets};
use crate::error::GatewayError;
use crate::health::HealthChecker;
use crate::metrics::GatewayMetrics;
use crate::now_millis;
use crate::proxy::UpstreamClient;
use crate::rate_limit::SlidingWindow;

/// Client identifier used when no forwarding header names the caller.
/// All directly-unidentifiable clients share this bucket.
const UNKNOWN_CLIENT: &str = "unknown";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    verifier: SignatureVerifier,
    limiter: Arc<SlidingWindow>,
    upstream: UpstreamClient,
    default_api_key: Option<String>,
    metrics: Arc<GatewayMetrics>,
    health: Arc<HealthChecker>,
}

impl AppState {
    /// Wire up the pipeline from configuration and resolved secrets.
    pub fn new(config: &GatewayConfig, secrets: &Secrets) -> anyhow::Result<Self> {
        Ok(Self {
            verifier: SignatureVerifier::new(
                secrets.signing_secret.as_bytes(),
                (config.auth.replay_window_secs * 1000) as i64,
            ),
            limiter: Arc::new(SlidingWindow::new(
                config.rate_limit.max_requests,
                config.rate_limit.window_secs * 1000,
                config.rate_limit.max_clients,
            )),
            upstream: UpstreamClient::new(&config.upstream)?,
            default_api_key: secrets.default_api_key.clone(),
            metrics: Arc::new(GatewayMetrics::new()),
            health: Arc::new(HealthChecker::new()),
        })
    }
}

/// Request body schema. Unknown fields are rejected so malformed client
/// payloads fail loudly instead of being silently ignored.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompletionRequest {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default, rename = "apiKey")]
    api_key: Option<String>,
}

/// Build the gateway router.
pub fn router(config: &GatewayConfig, state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("timestamp"),
            header::HeaderName::from_static("signature"),
        ]);

    let mut router = Router::new().route(
        "/api/claude",
        post(completion_handler)
            .options(preflight_handler)
            .fallback(method_not_allowed),
    );

    if config.health.enabled {
        router = router.route(&config.health.path, get(health_handler));
    }
    if config.metrics.enabled {
        router = router.route(&config.metrics.path, get(metrics_handler));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Derive the rate-limit partition key for a request.
///
/// Prefers `x-forwarded-for` (first hop), then `x-real-ip`, then a shared
/// fallback bucket.
fn client_id(headers: &HeaderMap) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = header_str(headers, "x-real-ip") {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    UNKNOWN_CLIENT.to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Non-preflight OPTIONS requests (preflights are answered by the CORS
/// layer before reaching this handler).
async fn preflight_handler() -> StatusCode {
    StatusCode::OK
}

/// Any method other than POST or OPTIONS on the gateway endpoint.
async fn method_not_allowed(State(state): State<AppState>) -> Response {
    state.metrics.record_rejection("method_not_allowed");
    GatewayError::MethodNotAllowed.into_response()
}

/// The signed completion endpoint.
async fn completion_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();

    match handle_completion(&state, &headers, &body).await {
        Ok(upstream_body) => {
            state
                .metrics
                .record_request("success", 200, start.elapsed());
            (
                StatusCode::OK,
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                )],
                upstream_body,
            )
                .into_response()
        }
        Err(err) => {
            let outcome = err.outcome();
            let status = err.status();
            warn!(outcome, status = status.as_u16(), "request rejected: {}", err);
            state
                .metrics
                .record_request(outcome, status.as_u16(), start.elapsed());
            if matches!(
                err,
                GatewayError::RateLimited { .. } | GatewayError::Auth(_)
            ) {
                state.metrics.record_rejection(outcome);
            }
            err.into_response()
        }
    }
}

async fn handle_completion(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Bytes, GatewayError> {
    let now = now_millis();

    let client = client_id(headers);
    state
        .limiter
        .check(&client, now)
        .map_err(|retry_after| GatewayError::RateLimited { retry_after })?;

    state.verifier.verify(
        header_str(headers, "timestamp"),
        header_str(headers, "signature"),
        body,
        now,
    )?;

    let request: CompletionRequest =
        serde_json::from_slice(body).map_err(|_| GatewayError::InvalidBody)?;

    let prompt = request
        .prompt
        .filter(|p| !p.is_empty())
        .ok_or(GatewayError::MissingPrompt)?;

    let api_key = request
        .api_key
        .filter(|k| !k.is_empty())
        .or_else(|| state.default_api_key.clone())
        .ok_or(GatewayError::MissingCredential)?;

    state.upstream.forward(&prompt, &api_key).await
}

/// Health check handler
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.health.liveness()))
}

/// Metrics handler
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, state.metrics.prometheus_output())
}
