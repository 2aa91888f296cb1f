//! # faucetd - Faucet Web Service
//!
//! Hands out small periodic rewards (every 5 minutes and daily) to logged-in
//! users and pays accumulated balances out through a payout provider.
//!
//! ## Architecture
//! ```text
//! Browser → faucetd → CAPTCHA provider (optional)
//!              ↓    → Payout provider
//!         data.json (snapshot)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod captcha;
mod config;
mod engine;
mod payout;
mod routes;
mod session;
mod state;
mod store;

#[cfg(test)]
mod test_utils;

use config::AppConfig;
use state::AppState;

/// Faucet web service
#[derive(Parser, Debug)]
#[command(name = "faucetd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/faucetd.toml")]
    config: String,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Store snapshot path (overrides config)
    #[arg(long, env = "FAUCET_STORE_PATH")]
    store: Option<String>,

    /// CAPTCHA provider secret (overrides config)
    #[arg(long, env = "FAUCET_CAPTCHA_SECRET", hide_env_values = true)]
    captcha_secret: Option<String>,

    /// Payout provider API key (overrides config)
    #[arg(long, env = "FAUCET_PAYOUT_API_KEY", hide_env_values = true)]
    payout_api_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets may live in a local .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting faucetd v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!(
        config = %args.config,
        store = %config.store_path,
        captcha = config.captcha.enabled,
        currency = %config.payout.currency,
        "Configuration loaded"
    );

    // Initialize application state; a corrupt snapshot stops startup here
    let state = AppState::new(&config)
        .await
        .context("Failed to initialize application state")?;
    info!(users = state.store.len().await, "User store opened");

    // Build router
    let app = routes::create_router(state, config.cors_enabled);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("faucetd listening on {}", config.listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("faucetd shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()?;
    }

    Ok(())
}
