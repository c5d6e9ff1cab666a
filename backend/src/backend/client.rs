// =============================================================================
// Portfolio API Client — read-only access to the finance backend
// =============================================================================
//
// The backend exposes three unauthenticated GET endpoints, each returning a
// JSON array. Paths are relative to `api_base_url` from the runtime config.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::runtime_config::RuntimeConfig;
use crate::types::{HeatmapStock, Stock};

/// HTTP client for the portfolio backend.
#[derive(Clone)]
pub struct PortfolioApiClient {
    base_url: String,
    portfolio_path: String,
    uncategorized_path: String,
    heatmap_path: String,
    client: reqwest::Client,
}

impl PortfolioApiClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Build a client from the runtime config.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        let base_url = config.api_base_url.trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "PortfolioApiClient initialised");

        Ok(Self {
            base_url,
            portfolio_path: config.portfolio_path.clone(),
            uncategorized_path: config.uncategorized_path.clone(),
            heatmap_path: config.heatmap_path.clone(),
            client,
        })
    }

    // -------------------------------------------------------------------------
    // Endpoints
    // -------------------------------------------------------------------------

    /// GET `{base}/stocksinportfolio`.
    #[instrument(skip(self), name = "backend::get_portfolio_stocks")]
    pub async fn get_portfolio_stocks(&self) -> Result<Vec<Stock>> {
        self.get_array(&self.portfolio_path).await
    }

    /// GET `{base}/stocksnotinportfolio`.
    #[instrument(skip(self), name = "backend::get_uncategorized_stocks")]
    pub async fn get_uncategorized_stocks(&self) -> Result<Vec<Stock>> {
        self.get_array(&self.uncategorized_path).await
    }

    /// GET `{base}/heatmapstocks`.
    #[instrument(skip(self), name = "backend::get_heatmap_stocks")]
    pub async fn get_heatmap_stocks(&self) -> Result<Vec<HeatmapStock>> {
        self.get_array(&self.heatmap_path).await
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_array<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let url = self.url_for(path);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("backend GET {} returned {}: {}", path, status, body);
        }

        let items: Vec<T> = resp
            .json()
            .await
            .with_context(|| format!("failed to parse {path} response"))?;

        debug!(path, count = items.len(), "records fetched");
        Ok(items)
    }
}

impl std::fmt::Debug for PortfolioApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}
