//! Configuration module for the gateway service
//!
//! Tunables are loaded from a TOML file; secrets (the request-signing secret
//! and the default upstream API key) are read from the process environment at
//! startup and never appear in the config file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable holding the shared request-signing secret.
pub const SIGNING_SECRET_ENV: &str = "APP_SECRET";

/// Environment variable holding the default upstream API key.
pub const DEFAULT_API_KEY_ENV: &str = "CLAUDE_API_KEY";

/// Placeholder secret used when `APP_SECRET` is unset. Only acceptable for
/// non-production runs; startup logs a warning when it is active.
pub const DEV_SIGNING_SECRET: &str = "dev-secret-change-in-production";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum admitted requests per client per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Maximum number of distinct client identifiers tracked (LRU bound)
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
}

fn default_max_requests() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_clients() -> usize {
    10_000
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            max_clients: default_max_clients(),
        }
    }
}

/// Request authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Replay window in seconds: how far a signed request's timestamp may
    /// deviate from server time in either direction
    #[serde(default = "default_replay_window_secs")]
    pub replay_window_secs: u64,
}

fn default_replay_window_secs() -> u64 {
    300
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            replay_window_secs: default_replay_window_secs(),
        }
    }
}

/// Upstream completion API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Messages endpoint URL
    #[serde(default = "default_upstream_url")]
    pub url: String,
    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,
    /// Output token budget sent with every request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_upstream_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_model() -> String {
    "claude-opus-4-5-20251101".to_string()
}

fn default_max_tokens() -> u32 {
    200
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics are enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Path to expose metrics
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_enabled() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}

/// Health check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Whether health check is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Path for health check endpoint
    #[serde(default = "default_health_path")]
    pub path: String,
}

fn default_health_path() -> String {
    "/health".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_health_path(),
        }
    }
}

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Rate limiter configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Request authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Upstream API configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Health check configuration
    #[serde(default)]
    pub health: HealthConfig,
}

impl GatewayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load configuration from a TOML string
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let config: GatewayConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rate_limit.max_requests == 0 {
            anyhow::bail!("rate_limit.max_requests must be greater than zero");
        }
        if self.rate_limit.window_secs == 0 {
            anyhow::bail!("rate_limit.window_secs must be greater than zero");
        }
        if self.rate_limit.max_clients == 0 {
            anyhow::bail!("rate_limit.max_clients must be greater than zero");
        }
        if self.auth.replay_window_secs == 0 {
            anyhow::bail!("auth.replay_window_secs must be greater than zero");
        }
        if self.upstream.timeout_secs == 0 {
            anyhow::bail!("upstream.timeout_secs must be greater than zero");
        }
        if !self.upstream.url.starts_with("http://") && !self.upstream.url.starts_with("https://")
        {
            anyhow::bail!("upstream.url must be an http(s) URL: {}", self.upstream.url);
        }
        Ok(())
    }

    /// Get server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Secrets resolved from the process environment at startup.
#[derive(Clone)]
pub struct Secrets {
    /// Shared secret for HMAC request signing
    pub signing_secret: String,
    /// Default upstream API key, used when the request does not carry one
    pub default_api_key: Option<String>,
}

impl Secrets {
    /// Read secrets from the process environment.
    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var(SIGNING_SECRET_ENV).ok(),
            std::env::var(DEFAULT_API_KEY_ENV).ok(),
        )
    }

    /// Resolve secrets from explicit values (environment reads go through
    /// here so the fallback logic is testable).
    pub fn resolve(signing_secret: Option<String>, default_api_key: Option<String>) -> Self {
        Self {
            signing_secret: signing_secret
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEV_SIGNING_SECRET.to_string()),
            default_api_key: default_api_key.filter(|k| !k.is_empty()),
        }
    }

    /// True when the placeholder development secret is in use.
    pub fn using_dev_secret(&self) -> bool {
        self.signing_secret == DEV_SIGNING_SECRET
    }
}
