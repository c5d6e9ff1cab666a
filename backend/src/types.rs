// =============================================================================
// Shared types used across the portfolio desk
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stock record as served by the backend for both buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub day_change: f64,
    #[serde(default)]
    pub change_pct: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default, alias = "volume_avg")]
    pub volume_avg: f64,
    #[serde(default)]
    pub market_cap: f64,
    #[serde(default)]
    pub pe: Option<f64>,
    /// Recent intraday closes, most recent first.
    #[serde(default)]
    pub intraday: Vec<f64>,
}

/// Heatmap record. Read-only; the desk never mutates these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapStock {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub price_open: f64,
    #[serde(default)]
    pub day_high: f64,
    #[serde(default)]
    pub day_low: f64,
    #[serde(default, rename = "weekHigh52")]
    pub week_high_52: f64,
    #[serde(default, rename = "weekLow52")]
    pub week_low_52: f64,
    #[serde(default)]
    pub day_change: f64,
    #[serde(default)]
    pub change_pct: f64,
    #[serde(default)]
    pub close_yesterday: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub volume_avg: f64,
    #[serde(default)]
    pub market_cap: f64,
    #[serde(default)]
    pub shares: f64,
    #[serde(default)]
    pub stock_exchange_long: String,
    #[serde(default)]
    pub stock_exchange_short: String,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub timezone_name: String,
    #[serde(default)]
    pub gmt_offset: i64,
    #[serde(default)]
    pub last_trade_time: Option<String>,
    #[serde(default)]
    pub pe: Option<f64>,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(default)]
    pub year_low: f64,
    #[serde(default)]
    pub year_high: f64,
}

/// The three datasets fetched from the backend at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    Portfolio,
    Uncategorized,
    Heatmap,
}

impl Dataset {
    pub const ALL: [Dataset; 3] = [Self::Portfolio, Self::Uncategorized, Self::Heatmap];
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Portfolio => write!(f, "portfolio"),
            Self::Uncategorized => write!(f, "uncategorized"),
            Self::Heatmap => write!(f, "heatmap"),
        }
    }
}

/// Load status of one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum Readiness {
    Uninitialized,
    Loading,
    Ready,
    Failed(String),
}

impl Default for Readiness {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Inclusive time window for series synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}
