//! # Tandem Server
//!
//! Real-time chat hub over WebSocket.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings (or ./tandem.toml if present)
//! tandem
//!
//! # Run with custom config
//! TANDEM_CONFIG=/path/to/tandem.toml tandem
//!
//! # Run with environment variables
//! TANDEM_PORT=8080 TANDEM_HOST=0.0.0.0 TANDEM_HEARTBEAT__INTERVAL_MS=20000 tandem
//! ```

mod auth;
mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tandem=debug,tandem_core=debug,tandem_transport=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::load()?;

    tracing::info!("Starting Tandem server on {}:{}", config.host, config.port);
    if config.auth.users.is_empty() {
        tracing::warn!("No users configured; every connection will be rejected");
    }

    metrics::init_metrics();

    handlers::run_server(config).await?;

    Ok(())
}
