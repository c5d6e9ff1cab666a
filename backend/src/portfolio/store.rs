// =============================================================================
// Portfolio Store — buckets, heatmap, display currency and the update stream
// =============================================================================
//
// Life-cycle of each dataset:
//   Uninitialized  ->  Loading  ->  Ready
//                         |  ^
//                         v  |
//                       Failed   (loader retries)
//
// Every operation checks the datasets it reads or writes and fails with
// `DeskError::Uninitialized` until they are Ready.
//
// Every mutation bumps the version and broadcasts an immutable snapshot of
// the portfolio in USD. Currency conversion happens on the receiving side.
//
// Thread-safety: all bucket state is behind one `parking_lot::RwLock`, so a
// move between buckets is never observed half-done.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{DeskError, DeskResult};
use crate::market_data::series::{IntervalBar, SeriesSynthesizer, StockSnapshot};
use crate::portfolio::currency::Currency;
use crate::portfolio::sort::{order_by, SortDescriptor};
use crate::types::{Dataset, HeatmapStock, Readiness, Stock, TimeRange};

// ---------------------------------------------------------------------------
// Published values
// ---------------------------------------------------------------------------

/// One notification on the update stream.
#[derive(Debug, Clone)]
pub struct PortfolioUpdate {
    pub version: u64,
    pub currency: Currency,
    /// Portfolio rows with prices in USD.
    pub stocks: Arc<Vec<Stock>>,
}

impl PortfolioUpdate {
    /// Rows with `price` converted to the currency active at publish time.
    pub fn converted(&self) -> Vec<Stock> {
        self.currency.convert_stocks(&self.stocks)
    }
}

/// Outcome of a bucket move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Transfer {
    Moved {
        symbol: String,
        from: Dataset,
        to: Dataset,
    },
    NotFound {
        symbol: String,
    },
}

/// Per-dataset load status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    pub portfolio: Readiness,
    pub uncategorized: Readiness,
    pub heatmap: Readiness,
}

impl ReadinessReport {
    pub fn get(&self, dataset: Dataset) -> &Readiness {
        match dataset {
            Dataset::Portfolio => &self.portfolio,
            Dataset::Uncategorized => &self.uncategorized,
            Dataset::Heatmap => &self.heatmap,
        }
    }

    fn get_mut(&mut self, dataset: Dataset) -> &mut Readiness {
        match dataset {
            Dataset::Portfolio => &mut self.portfolio,
            Dataset::Uncategorized => &mut self.uncategorized,
            Dataset::Heatmap => &mut self.heatmap,
        }
    }

    pub fn all_ready(&self) -> bool {
        Dataset::ALL.iter().all(|d| self.get(*d).is_ready())
    }
}

// ---------------------------------------------------------------------------
// Subscriber side
// ---------------------------------------------------------------------------

/// Receiver for portfolio updates.
pub struct DataStream {
    rx: broadcast::Receiver<PortfolioUpdate>,
}

impl DataStream {
    /// Next raw update. Skips ahead when this subscriber fell behind; `None`
    /// once the store is gone.
    pub async fn next_update(&mut self) -> Option<PortfolioUpdate> {
        loop {
            match self.rx.recv().await {
                Ok(update) => return Some(update),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "data stream lagged, skipping to newer updates");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next portfolio view in the active display currency.
    pub async fn next(&mut self) -> Option<Vec<Stock>> {
        self.next_update().await.map(|u| u.converted())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Datasets {
    portfolio: Vec<Stock>,
    uncategorized: Vec<Stock>,
    heatmap: Vec<HeatmapStock>,
    currency: Currency,
    readiness: ReadinessReport,
}

impl Datasets {
    fn require(&self, needed: &[Dataset]) -> DeskResult<()> {
        for dataset in needed {
            if !self.readiness.get(*dataset).is_ready() {
                return Err(DeskError::Uninitialized { dataset: *dataset });
            }
        }
        Ok(())
    }
}

/// Minimum broadcast capacity; `tokio::sync::broadcast` rejects zero.
const MIN_CHANNEL_CAPACITY: usize = 1;

/// Owns the portfolio state and publishes every change.
pub struct PortfolioStore {
    inner: RwLock<Datasets>,
    version: AtomicU64,
    latest: RwLock<Option<PortfolioUpdate>>,
    updates: broadcast::Sender<PortfolioUpdate>,
    synthesizer: Mutex<SeriesSynthesizer>,
}

impl PortfolioStore {
    pub fn new(
        channel_capacity: usize,
        currency: Currency,
        series_seed: Option<u64>,
        max_series_bars: usize,
    ) -> Self {
        let (updates, _) = broadcast::channel(channel_capacity.max(MIN_CHANNEL_CAPACITY));
        Self {
            inner: RwLock::new(Datasets {
                currency,
                ..Datasets::default()
            }),
            version: AtomicU64::new(0),
            latest: RwLock::new(None),
            updates,
            synthesizer: Mutex::new(
                SeriesSynthesizer::with_seed(series_seed).with_max_bars(max_series_bars),
            ),
        }
    }

    // -------------------------------------------------------------------------
    // Publishing
    // -------------------------------------------------------------------------

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Broadcast `stocks`. Called with the write lock held so versions reach
    /// subscribers in order.
    fn publish(&self, stocks: Vec<Stock>, currency: Currency) -> u64 {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let update = PortfolioUpdate {
            version,
            currency,
            stocks: Arc::new(stocks),
        };
        *self.latest.write() = Some(update.clone());
        // No subscribers is fine; `latest` still serves late joiners.
        let receivers = self.updates.send(update).unwrap_or(0);
        debug!(version, receivers, "portfolio update published");
        version
    }

    pub fn subscribe(&self) -> DataStream {
        DataStream {
            rx: self.updates.subscribe(),
        }
    }

    /// Most recent update, if the portfolio has been published at least once.
    pub fn latest(&self) -> Option<PortfolioUpdate> {
        self.latest.read().clone()
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    pub fn readiness(&self) -> ReadinessReport {
        self.inner.read().readiness.clone()
    }

    pub fn begin_loading(&self, dataset: Dataset) {
        *self.inner.write().readiness.get_mut(dataset) = Readiness::Loading;
        debug!(%dataset, "dataset loading");
    }

    pub fn fail_loading(&self, dataset: Dataset, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(%dataset, reason = %reason, "dataset load failed");
        *self.inner.write().readiness.get_mut(dataset) = Readiness::Failed(reason);
    }

    /// Install the portfolio bucket and publish it.
    pub fn load_portfolio(&self, stocks: Vec<Stock>) {
        let mut inner = self.inner.write();
        info!(count = stocks.len(), "portfolio loaded");
        inner.portfolio = stocks;
        inner.readiness.portfolio = Readiness::Ready;
        self.publish(inner.portfolio.clone(), inner.currency);
    }

    pub fn load_uncategorized(&self, stocks: Vec<Stock>) {
        let mut inner = self.inner.write();
        info!(count = stocks.len(), "uncategorized stocks loaded");
        inner.uncategorized = stocks;
        inner.readiness.uncategorized = Readiness::Ready;
    }

    pub fn load_heatmap(&self, stocks: Vec<HeatmapStock>) {
        let mut inner = self.inner.write();
        info!(count = stocks.len(), "heatmap stocks loaded");
        inner.heatmap = stocks;
        inner.readiness.heatmap = Readiness::Ready;
    }

    // -------------------------------------------------------------------------
    // Bucket moves
    // -------------------------------------------------------------------------

    /// Move `symbol` from uncategorized to the front of the portfolio.
    pub fn add_to_portfolio(&self, symbol: &str) -> DeskResult<Transfer> {
        self.transfer(symbol, Dataset::Uncategorized, Dataset::Portfolio)
    }

    /// Move `symbol` from the portfolio to the front of uncategorized.
    pub fn remove_from_portfolio(&self, symbol: &str) -> DeskResult<Transfer> {
        self.transfer(symbol, Dataset::Portfolio, Dataset::Uncategorized)
    }

    fn transfer(&self, symbol: &str, from: Dataset, to: Dataset) -> DeskResult<Transfer> {
        let mut inner = self.inner.write();
        inner.require(&[Dataset::Portfolio, Dataset::Uncategorized])?;

        let Datasets {
            portfolio,
            uncategorized,
            ..
        } = &mut *inner;
        let (source, target) = match from {
            Dataset::Portfolio => (portfolio, uncategorized),
            _ => (uncategorized, portfolio),
        };

        let Some(idx) = source.iter().position(|s| s.symbol == symbol) else {
            warn!(symbol, %from, "move requested for symbol not in bucket");
            return Ok(Transfer::NotFound {
                symbol: symbol.to_string(),
            });
        };
        let stock = source.remove(idx);
        target.insert(0, stock);

        let version = self.publish(inner.portfolio.clone(), inner.currency);
        info!(symbol, %from, %to, version, "stock moved");

        Ok(Transfer::Moved {
            symbol: symbol.to_string(),
            from,
            to,
        })
    }

    // -------------------------------------------------------------------------
    // Table view
    // -------------------------------------------------------------------------

    /// Publish the portfolio ordered by `sort`. The bucket keeps its own order.
    pub fn query(&self, sort: &[SortDescriptor]) -> DeskResult<Vec<Stock>> {
        let inner = self.inner.write();
        inner.require(&[Dataset::Portfolio])?;
        let ordered = order_by(&inner.portfolio, sort);
        self.publish(ordered.clone(), inner.currency);
        Ok(inner.currency.convert_stocks(&ordered))
    }

    /// Switch the display currency and re-publish the portfolio.
    pub fn change_currency(&self, code: &str) -> DeskResult<Currency> {
        let currency: Currency = code.parse()?;
        let mut inner = self.inner.write();
        inner.require(&[Dataset::Portfolio])?;
        inner.currency = currency;
        self.publish(inner.portfolio.clone(), currency);
        info!(%currency, "display currency changed");
        Ok(currency)
    }

    pub fn currency(&self) -> Currency {
        self.inner.read().currency
    }

    /// Portfolio rows in the active currency.
    pub fn portfolio(&self) -> DeskResult<Vec<Stock>> {
        let inner = self.inner.read();
        inner.require(&[Dataset::Portfolio])?;
        Ok(inner.currency.convert_stocks(&inner.portfolio))
    }

    pub fn uncategorized_symbols(&self) -> DeskResult<Vec<String>> {
        let inner = self.inner.read();
        inner.require(&[Dataset::Uncategorized])?;
        Ok(inner.uncategorized.iter().map(|s| s.symbol.clone()).collect())
    }

    pub fn heatmap_stocks(&self) -> DeskResult<Vec<HeatmapStock>> {
        let inner = self.inner.read();
        inner.require(&[Dataset::Heatmap])?;
        Ok(inner.heatmap.clone())
    }

    // -------------------------------------------------------------------------
    // Charting
    // -------------------------------------------------------------------------

    /// Synthesized bars for `symbol`, searching the portfolio first and then
    /// the uncategorized bucket.
    pub fn stock_interval_details(
        &self,
        symbol: &str,
        range: TimeRange,
        interval_minutes: u32,
    ) -> DeskResult<Vec<IntervalBar>> {
        let snapshot = {
            let inner = self.inner.read();
            inner.require(&[Dataset::Portfolio, Dataset::Uncategorized])?;
            let stock = inner
                .portfolio
                .iter()
                .chain(inner.uncategorized.iter())
                .find(|s| s.symbol == symbol)
                .ok_or_else(|| DeskError::not_found(symbol))?;
            StockSnapshot::from_stock(stock)?
        };

        let bars = self
            .synthesizer
            .lock()
            .synthesize(&snapshot, interval_minutes, range)?;
        debug!(symbol, interval_minutes, bars = bars.len(), "interval series synthesized");
        Ok(bars)
    }
}

impl std::fmt::Debug for PortfolioStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("PortfolioStore")
            .field("portfolio", &inner.portfolio.len())
            .field("uncategorized", &inner.uncategorized.len())
            .field("heatmap", &inner.heatmap.len())
            .field("currency", &inner.currency)
            .field("version", &self.version())
            .finish()
    }
}
