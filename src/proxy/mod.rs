//! Upstream forwarder
//!
//! Builds the fixed-shape Messages API request (one user message, configured
//! model, fixed output-token budget) and translates the upstream's answer
//! back to the caller:
//! - success bodies pass through unmodified, byte for byte
//! - non-success statuses are surfaced transparently, with the upstream's
//!   own error message extracted from its JSON body
//! - timeouts become a distinct 504 condition
//!
//! The forwarder never retries; retry policy belongs to the caller.

use axum::http::StatusCode;
use bytes::Bytes;
use serde::Serialize;
use std::time::Duration;
use tracing::error;

use crate::config::UpstreamConfig;
use crate::error::GatewayError;

/// Message sent to the upstream completion API.
#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Fixed-shape request body for the Messages API.
#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

/// Client for the upstream completion API.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    url: String,
    model: String,
    max_tokens: u32,
}

impl UpstreamClient {
    /// Build a client from configuration. The timeout bounds the whole
    /// upstream exchange, connect included.
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    /// Forward a single prompt upstream and return the raw response body.
    pub async fn forward(&self, prompt: &str, api_key: &str) -> Result<Bytes, GatewayError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!("upstream request timed out");
                    GatewayError::UpstreamTimeout
                } else {
                    error!("upstream request failed: {}", e);
                    GatewayError::Internal(e.to_string())
                }
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                error!("upstream response timed out");
                GatewayError::UpstreamTimeout
            } else {
                error!("failed to read upstream response: {}", e);
                GatewayError::Internal(e.to_string())
            }
        })?;

        if !status.is_success() {
            let message = extract_error_message(&bytes);
            error!(status = status.as_u16(), "upstream returned error: {}", message);
            return Err(GatewayError::Upstream {
                status: StatusCode::from_u16(status.as_u16())
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                message,
            });
        }

        Ok(bytes)
    }
}

/// Pull the human-readable message out of an upstream error body.
///
/// The Messages API nests it as `{"error": {"message": "..."}}`; anything
/// else falls back to a generic string.
fn extract_error_message(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "API request failed".to_string())
}
