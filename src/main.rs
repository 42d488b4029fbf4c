//! Claude Gateway - CLI Application
//!
//! An authenticated proxy for the Anthropic Messages API:
//! - HMAC-SHA256 request signing with a replay window
//! - Per-client sliding-window rate limiting
//! - Transparent upstream error translation
//! - Prometheus metrics and health checks

use clap::{Parser, Subcommand};
use claude_gateway::auth::SignatureVerifier;
use claude_gateway::config::{GatewayConfig, Secrets, SIGNING_SECRET_ENV};
use claude_gateway::gateway::{router, AppState};
use claude_gateway::now_millis;
use std::net::SocketAddr;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Claude Gateway - a signed proxy for the Anthropic Messages API
#[derive(Parser)]
#[command(name = "claude-gateway")]
#[command(version, about = "Authenticated proxy gateway for the Anthropic Messages API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Start {
        /// Configuration file path
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Validate the configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Generate a sample configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "config.toml")]
        output: String,
    },
    /// Sign a request body with the configured secret (for debugging clients)
    Sign {
        /// Request body to sign, exactly as it will be sent on the wire
        body: String,
        /// Timestamp in epoch milliseconds (defaults to now)
        #[arg(short, long)]
        timestamp: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config } => start_server(&config).await?,
        Commands::Validate { config } => validate_config(&config)?,
        Commands::Init { output } => generate_sample_config(&output)?,
        Commands::Sign { body, timestamp } => sign_body(&body, timestamp),
    }

    Ok(())
}

/// Start the gateway server
async fn start_server(config_path: &str) -> anyhow::Result<()> {
    // Setup logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration and secrets
    let config = GatewayConfig::from_file(config_path)?;
    info!("Loaded configuration from {}", config_path);

    let secrets = Secrets::from_env();
    if secrets.using_dev_secret() {
        warn!(
            "{} is not set; using the development signing secret. \
             Do not run this in production.",
            SIGNING_SECRET_ENV
        );
    }
    if secrets.default_api_key.is_none() {
        warn!("No default upstream API key configured; requests must supply their own");
    }

    let state = AppState::new(&config, &secrets)?;
    let app = router(&config, state);

    if config.health.enabled {
        info!("Health endpoint enabled at {}", config.health.path);
    }
    if config.metrics.enabled {
        info!("Metrics endpoint enabled at {}", config.metrics.path);
    }

    // Start server
    let addr: SocketAddr = config.server_addr().parse()?;
    info!("Starting gateway server on {}", addr);
    info!(
        "Rate limit: {} requests per {}s per client",
        config.rate_limit.max_requests, config.rate_limit.window_secs
    );
    info!("Forwarding to {}", config.upstream.url);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Validate configuration file
fn validate_config(config_path: &str) -> anyhow::Result<()> {
    match GatewayConfig::from_file(config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid!");
            println!();
            println!("Server: {}:{}", config.server.host, config.server.port);
            println!(
                "Rate limit: {} requests / {}s (max {} tracked clients)",
                config.rate_limit.max_requests,
                config.rate_limit.window_secs,
                config.rate_limit.max_clients
            );
            println!("Replay window: ±{}s", config.auth.replay_window_secs);
            println!(
                "Upstream: {} (model {}, {} max tokens, {}s timeout)",
                config.upstream.url,
                config.upstream.model,
                config.upstream.max_tokens,
                config.upstream.timeout_secs
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration is invalid:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}

/// Generate sample configuration file
fn generate_sample_config(output_path: &str) -> anyhow::Result<()> {
    let sample_config = r#"# Claude Gateway Configuration
#
# Secrets are read from the environment, not from this file:
#   APP_SECRET      - shared secret for HMAC request signing
#   CLAUDE_API_KEY  - default upstream API key (optional)

[server]
host = "0.0.0.0"
port = 3001

[rate_limit]
max_requests = 10
window_secs = 60
max_clients = 10000

[auth]
replay_window_secs = 300

[upstream]
url = "https://api.anthropic.com/v1/messages"
model = "claude-opus-4-5-20251101"
max_tokens = 200
timeout_secs = 30

[metrics]
enabled = true
path = "/metrics"

[health]
enabled = true
path = "/health"
"#;

    std::fs::write(output_path, sample_config)?;
    println!("Sample configuration written to {}", output_path);
    Ok(())
}

/// Sign a body with the environment secret and print the headers to send.
fn sign_body(body: &str, timestamp: Option<i64>) {
    let secrets = Secrets::from_env();
    if secrets.using_dev_secret() {
        eprintln!("warning: {} is not set; signing with the development secret", SIGNING_SECRET_ENV);
    }

    let timestamp = timestamp.unwrap_or_else(now_millis).to_string();
    let verifier = SignatureVerifier::new(secrets.signing_secret.as_bytes(), 0);
    let signature = verifier.sign(&timestamp, body.as_bytes());

    println!("timestamp: {}", timestamp);
    println!("signature: {}", signature);
}
