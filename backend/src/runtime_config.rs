// =============================================================================
// Runtime Configuration — backend endpoints, service surface, series seed
// =============================================================================
//
// Persisted as JSON with an atomic tmp + rename save. All fields carry
// `#[serde(default)]` so that adding new fields never breaks loading an older
// config file. Environment variables override the file after loading.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::market_data::series::DEFAULT_MAX_BARS;
use crate::portfolio::currency::Currency;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_api_base_url() -> String {
    "http://localhost:8000/api/finance_portfolio".to_string()
}

fn default_portfolio_path() -> String {
    "stocksinportfolio".to_string()
}

fn default_uncategorized_path() -> String {
    "stocksnotinportfolio".to_string()
}

fn default_heatmap_path() -> String {
    "heatmapstocks".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_fetch_retry_secs() -> u64 {
    5
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_update_channel_capacity() -> usize {
    64
}

fn default_max_series_bars() -> usize {
    DEFAULT_MAX_BARS
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the portfolio desk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Backend collaborator -----------------------------------------------

    /// Base URL the three dataset paths are appended to.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_portfolio_path")]
    pub portfolio_path: String,

    #[serde(default = "default_uncategorized_path")]
    pub uncategorized_path: String,

    #[serde(default = "default_heatmap_path")]
    pub heatmap_path: String,

    /// Per-request timeout for backend calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Delay between attempts when a dataset fetch fails.
    #[serde(default = "default_fetch_retry_secs")]
    pub fetch_retry_secs: u64,

    // --- Service surface ----------------------------------------------------

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Buffered updates per subscriber before it starts skipping.
    #[serde(default = "default_update_channel_capacity")]
    pub update_channel_capacity: usize,

    // --- Display / charting -------------------------------------------------

    #[serde(default)]
    pub default_currency: Currency,

    /// Fixed RNG seed for synthesized series. Unset means a fresh seed per run.
    #[serde(default)]
    pub series_seed: Option<u64>,

    /// Most bars one interval request may return; larger ranges get a 400.
    #[serde(default = "default_max_series_bars")]
    pub max_series_bars: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            portfolio_path: default_portfolio_path(),
            uncategorized_path: default_uncategorized_path(),
            heatmap_path: default_heatmap_path(),
            request_timeout_secs: default_request_timeout_secs(),
            fetch_retry_secs: default_fetch_retry_secs(),
            bind_addr: default_bind_addr(),
            update_channel_capacity: default_update_channel_capacity(),
            default_currency: Currency::Usd,
            series_seed: None,
            max_series_bars: default_max_series_bars(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            api_base_url = %config.api_base_url,
            bind_addr = %config.bind_addr,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply `DESK_*` overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DESK_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(addr) = lookup("DESK_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(raw) = lookup("DESK_SERIES_SEED") {
            match raw.trim().parse::<u64>() {
                Ok(seed) => self.series_seed = Some(seed),
                Err(e) => warn!(value = %raw, error = %e, "ignoring invalid DESK_SERIES_SEED"),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.api_base_url, "http://localhost:8000/api/finance_portfolio");
        assert_eq!(cfg.portfolio_path, "stocksinportfolio");
        assert_eq!(cfg.uncategorized_path, "stocksnotinportfolio");
        assert_eq!(cfg.heatmap_path, "heatmapstocks");
        assert_eq!(cfg.request_timeout_secs, 10);
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
        assert_eq!(cfg.default_currency, Currency::Usd);
        assert!(cfg.series_seed.is_none());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.fetch_retry_secs, 5);
        assert_eq!(cfg.update_channel_capacity, 64);
        assert_eq!(cfg.max_series_bars, DEFAULT_MAX_BARS);
        assert_eq!(cfg.default_currency, Currency::Usd);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "default_currency": "GBP", "series_seed": 42 }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.default_currency, Currency::Gbp);
        assert_eq!(cfg.series_seed, Some(42));
        assert_eq!(cfg.heatmap_path, "heatmapstocks");
    }

    #[test]
    fn env_overrides_file_values() {
        let vars: HashMap<&str, &str> = [
            ("DESK_API_BASE_URL", "http://backend:9000/api"),
            ("DESK_SERIES_SEED", "7"),
        ]
        .into_iter()
        .collect();

        let mut cfg = RuntimeConfig::default();
        cfg.apply_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.api_base_url, "http://backend:9000/api");
        assert_eq!(cfg.series_seed, Some(7));
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");

        cfg.apply_env(|k| (k == "DESK_SERIES_SEED").then(|| "not-a-number".to_string()));
        assert_eq!(cfg.series_seed, Some(7));
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = std::env::temp_dir().join(format!("desk-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("runtime_config.json");

        let cfg = RuntimeConfig {
            series_seed: Some(9),
            ..RuntimeConfig::default()
        };
        cfg.save(&path).unwrap();
        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded.series_seed, Some(9));
        assert!(!path.with_extension("json.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
