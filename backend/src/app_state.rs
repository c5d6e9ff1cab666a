// =============================================================================
// Central Application State — Portfolio Desk
// =============================================================================
//
// Ties the portfolio store to the runtime config and the operational data the
// dashboard shows next to the table (load status, recent fetch errors,
// connected clients). Shared across tasks as `Arc<AppState>`.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for the config and the error log.
//   - The store manages its own interior mutability.
// =============================================================================

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::portfolio::currency::Currency;
use crate::portfolio::store::{PortfolioStore, ReadinessReport};
use crate::runtime_config::RuntimeConfig;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// AppState
// =============================================================================

pub struct AppState {
    /// Incremented on operational changes (dataset ready, errors, client
    /// connect/disconnect). Portfolio data changes carry their own version
    /// on the store.
    pub state_version: AtomicU64,

    /// WebSocket message sequence number (incremented per message sent).
    pub ws_sequence_number: AtomicU64,
    pub ws_clients: AtomicUsize,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,
    /// Where `persist_config` writes. Unset keeps the config in memory only.
    pub config_path: Option<PathBuf>,
    pub store: Arc<PortfolioStore>,

    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: RuntimeConfig) -> Self {
        let store = PortfolioStore::new(
            config.update_channel_capacity,
            config.default_currency,
            config.series_seed,
            config.max_series_bars,
        );

        Self {
            state_version: AtomicU64::new(1),
            ws_sequence_number: AtomicU64::new(0),
            ws_clients: AtomicUsize::new(0),
            runtime_config: Arc::new(RwLock::new(config)),
            config_path: None,
            store: Arc::new(store),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    // ── Config Persistence ──────────────────────────────────────────────

    /// Copy the store's display currency into the runtime config and save
    /// it to `config_path`. Returns `false` when no path is configured.
    pub fn persist_config(&self) -> anyhow::Result<bool> {
        let Some(path) = &self.config_path else {
            return Ok(false);
        };

        let mut config = self.runtime_config.write();
        config.default_currency = self.store.currency();
        // Clone and drop the write lock before touching the disk.
        let config_clone = config.clone();
        drop(config);

        config_clone.save(path)?;
        Ok(true)
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message. Oldest entries are evicted past
    /// [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, msg: String) {
        let record = ErrorRecord {
            message: msg,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Operational snapshot served by `GET /api/v1/state`.
    pub fn build_snapshot(&self) -> StateSnapshot {
        let config = self.runtime_config.read();

        StateSnapshot {
            state_version: self.current_state_version(),
            portfolio_version: self.store.version(),
            server_time: Utc::now().timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            currency: self.store.currency(),
            readiness: self.store.readiness(),
            backend_url: config.api_base_url.clone(),
            ws_clients: self.ws_clients.load(Ordering::Relaxed),
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}

// =============================================================================
// Serialisable snapshot types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub portfolio_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub currency: Currency,
    pub readiness: ReadinessReport,
    pub backend_url: String,
    pub ws_clients: usize,
    pub recent_errors: Vec<ErrorRecord>,
}
