//! Gateway error taxonomy
//!
//! Every failure in the request pipeline is converted into a terminal HTTP
//! response at the point of detection. All error bodies are single-field
//! JSON objects (`{"error": "..."}`), so any client language can parse them
//! the same way. Nothing here is retried internally.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::time::Duration;

use crate::auth::AuthError;

/// Errors produced by the request pipeline, in pipeline order.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request used a method other than POST (OPTIONS is answered earlier).
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The client exceeded its rate-limit window.
    #[error("Too many requests, please try again later.")]
    RateLimited {
        /// How long until the oldest in-window request expires.
        retry_after: Duration,
    },

    /// Signature verification failed. The specific reason is part of the
    /// wire contract so the signing client can diagnose mismatches.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The body was not the expected JSON shape.
    #[error("Invalid request body")]
    InvalidBody,

    /// The prompt field was absent or empty.
    #[error("Prompt is required")]
    MissingPrompt,

    /// Neither the request nor the environment supplied an API key.
    #[error("API key not provided")]
    MissingCredential,

    /// The upstream returned a non-success status. Status and message are
    /// passed through so the caller can apply the upstream's own retry
    /// semantics.
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    /// The upstream did not answer within the configured timeout.
    #[error("Upstream request timed out")]
    UpstreamTimeout,

    /// Transport-level or otherwise unexpected failure.
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Auth(_) | Self::MissingCredential => StatusCode::UNAUTHORIZED,
            Self::InvalidBody | Self::MissingPrompt => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => *status,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable label used for metrics, not part of the wire contract.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "method_not_allowed",
            Self::RateLimited { .. } => "rate_limited",
            Self::Auth(_) => "auth_failed",
            Self::InvalidBody | Self::MissingPrompt => "invalid_request",
            Self::MissingCredential => "missing_credential",
            Self::Upstream { .. } => "upstream_error",
            Self::UpstreamTimeout => "upstream_timeout",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));

        match self {
            Self::RateLimited { retry_after } => {
                let secs = retry_after.as_secs().max(1);
                (status, [(header::RETRY_AFTER, secs.to_string())], body).into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}
