// =============================================================================
// Startup Loader — fetch the three datasets independently
// =============================================================================
//
// Each dataset gets its own task. There is no ordering between them and no
// barrier: the store reports a dataset as Loading/Failed until its fetch
// lands, and operations on it fail with `Uninitialized` meanwhile. A failed
// fetch is logged, recorded on the dashboard error log, and retried.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app_state::AppState;
use crate::backend::client::PortfolioApiClient;
use crate::types::Dataset;

/// Fetch `dataset` once and install it in the store. Returns the record count.
pub async fn load_once(
    state: &AppState,
    client: &PortfolioApiClient,
    dataset: Dataset,
) -> Result<usize> {
    state.store.begin_loading(dataset);

    let fetched = match dataset {
        Dataset::Portfolio => client.get_portfolio_stocks().await.map(|stocks| {
            let count = stocks.len();
            state.store.load_portfolio(stocks);
            count
        }),
        Dataset::Uncategorized => client.get_uncategorized_stocks().await.map(|stocks| {
            let count = stocks.len();
            state.store.load_uncategorized(stocks);
            count
        }),
        Dataset::Heatmap => client.get_heatmap_stocks().await.map(|stocks| {
            let count = stocks.len();
            state.store.load_heatmap(stocks);
            count
        }),
    };

    if let Err(e) = &fetched {
        state.store.fail_loading(dataset, format!("{e:#}"));
    }
    fetched
}

/// Retry `load_once` until it succeeds.
pub async fn load_until_ready(
    state: Arc<AppState>,
    client: Arc<PortfolioApiClient>,
    dataset: Dataset,
    retry_every: Duration,
) {
    loop {
        match load_once(&state, &client, dataset).await {
            Ok(count) => {
                info!(%dataset, count, "dataset ready");
                state.increment_version();
                return;
            }
            Err(e) => {
                error!(%dataset, error = %e, "dataset fetch failed, retrying in {:?}", retry_every);
                state.push_error(format!("{dataset} fetch failed: {e:#}"));
                tokio::time::sleep(retry_every).await;
            }
        }
    }
}

/// Spawn one loader task per dataset.
pub fn spawn_all(
    state: &Arc<AppState>,
    client: &Arc<PortfolioApiClient>,
    retry_every: Duration,
) -> Vec<JoinHandle<()>> {
    Dataset::ALL
        .iter()
        .map(|dataset| {
            tokio::spawn(load_until_ready(
                state.clone(),
                client.clone(),
                *dataset,
                retry_every,
            ))
        })
        .collect()
}
