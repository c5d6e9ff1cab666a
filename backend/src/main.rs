// =============================================================================
// Portfolio Desk — Main Entry Point
// =============================================================================
//
// Starts the REST/WebSocket surface immediately and fetches the three
// datasets in the background. Until a dataset lands, operations that need it
// answer 503.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod backend;
mod error;
mod market_data;
mod portfolio;
mod runtime_config;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::backend::PortfolioApiClient;
use crate::runtime_config::RuntimeConfig;

const CONFIG_PATH: &str = "runtime_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Portfolio Desk starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env(|key| std::env::var(key).ok());

    info!(
        backend = %config.api_base_url,
        currency = %config.default_currency,
        seeded = config.series_seed.is_some(),
        "Configuration resolved"
    );

    // ── 2. Shared state & backend client ─────────────────────────────────
    let client = Arc::new(PortfolioApiClient::from_config(&config)?);
    let retry_every = Duration::from_secs(config.fetch_retry_secs.max(1));
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config).with_config_path(CONFIG_PATH));

    // ── 3. Background dataset fetches (independent, no barrier) ─────────
    let loaders = backend::loader::spawn_all(&state, &client, retry_every);
    info!(count = loaders.len(), "Dataset loaders launched");

    // ── 4. API server ────────────────────────────────────────────────────
    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for shutdown signal")?;
            warn!("Shutdown signal received — stopping");
        }
        _ = server => {
            warn!("API server exited");
        }
    }

    for handle in loaders {
        handle.abort();
    }

    if let Err(e) = state.persist_config() {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!(
        portfolio_version = state.store.version(),
        "Portfolio Desk shut down complete"
    );
    Ok(())
}
