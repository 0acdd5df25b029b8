//! Counciltrade server - headless trading orchestrator.
//!
//! Runs the council orchestrator and the monitoring scheduler without any
//! UI; state is observable through structured logs and the signal store.
//!
//! # Usage
//! ```sh
//! MODE=kis AUTO_EXECUTE=true cargo run --bin server
//! ```
//!
//! # Environment Variables
//! - `MODE` - 'mock' or 'kis' (default: mock)
//! - `AUTO_EXECUTE` - submit high-confidence signals without approval
//! - `DATABASE_URL` - sqlite url for the signal store
//! - see `Config::from_env` for the full list

use anyhow::Result;
use counciltrade::application::system::Application;
use counciltrade::config::Config;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("Counciltrade Server {} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: Mode={:?}, trading_enabled={}, auto_execute={}",
        config.mode, config.trading_enabled, config.auto_execute
    );

    let app = Application::build(config).await?;
    let scheduler_handle = app.start();
    info!("Monitoring scheduler running. Press Ctrl+C to shutdown.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping jobs...");
    app.shutdown();
    let _ = scheduler_handle.await;
    info!("Shutdown complete.");

    Ok(())
}
