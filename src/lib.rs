//! Claude Gateway - an authenticated proxy for the Anthropic Messages API
//!
//! This is a single-endpoint gateway service that provides:
//! - HMAC-SHA256 request signing with a replay window
//! - Per-client sliding-window rate limiting
//! - Transparent upstream error translation
//! - Prometheus metrics
//! - Health checks

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod proxy;
pub mod rate_limit;

pub use config::GatewayConfig;
pub use error::GatewayError;

/// Application result type
pub type Result<T> = anyhow::Result<T>;

/// Current wall-clock time as epoch milliseconds.
///
/// Signed requests carry their timestamp in this form, so everything that
/// compares against the replay window or the rate-limit window uses it too.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
