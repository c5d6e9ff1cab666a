// =============================================================================
// Synthetic Interval Series — random-walk OHLCV backfill for charting
// =============================================================================
//
// The backend only knows a stock's latest intraday close and its trade
// volume. Charts need bars, so the desk walks forward from that close in
// fixed steps:
//
//   r        ~ U[0.01, 1.01)
//   chg      = 2 * VOL * r, folded to chg - 2 * VOL when chg > VOL
//   close'   = close * (1 + chg)
//   high     = max(close, close') * 1.015
//   low      = min(close, close') * 0.985
//
// Volume is the daily figure scaled to the interval and jittered per bar.
// The first emitted bar sits one interval after `range.start`. Stepping stops
// at `range.end` or at the last representable timestamp, whichever is first.
// A request for more than `max_bars` bars is rejected up front.
// =============================================================================

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{DeskError, DeskResult};
use crate::types::{Stock, TimeRange};

/// Minutes in a trading day used for volume scaling.
const MINUTES_PER_DAY: f64 = 1440.0;
/// Maximum per-step move as a fraction of the previous close.
const VOLATILITY: f64 = 0.03;
/// Outward padding applied to the high and low of each bar.
const WICK_PAD: f64 = 0.015;
/// Divisor applied to the volume jitter coefficient.
const VOLUME_JITTER_DIVISOR: f64 = 1.5;
/// Bars one request may produce unless configured otherwise.
pub const DEFAULT_MAX_BARS: usize = 100_000;
/// Cap on the up-front allocation for a series.
const MAX_PREALLOCATED_BARS: usize = 4_096;

/// Reference data a series is seeded from.
#[derive(Debug, Clone, PartialEq)]
pub struct StockSnapshot {
    pub symbol: String,
    pub reference_price: f64,
    pub avg_volume: f64,
}

impl StockSnapshot {
    pub fn new(symbol: impl Into<String>, reference_price: f64, avg_volume: f64) -> Self {
        Self {
            symbol: symbol.into(),
            reference_price,
            avg_volume,
        }
    }

    /// Build a snapshot from a bucket record: the latest intraday close and
    /// the record's trade volume.
    pub fn from_stock(stock: &Stock) -> DeskResult<Self> {
        let reference_price = stock.intraday.first().copied().ok_or_else(|| {
            DeskError::invalid(format!("{} has no intraday prices", stock.symbol))
        })?;
        Ok(Self::new(stock.symbol.clone(), reference_price, stock.volume))
    }

    fn validate(&self) -> DeskResult<()> {
        if !self.reference_price.is_finite() {
            return Err(DeskError::invalid(format!(
                "{} reference price is not a finite number",
                self.symbol
            )));
        }
        if !self.avg_volume.is_finite() || self.avg_volume < 0.0 {
            return Err(DeskError::invalid(format!(
                "{} volume must be a finite, non-negative number",
                self.symbol
            )));
        }
        Ok(())
    }
}

/// One synthesized OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalBar {
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Generates random-walk interval bars from a [`StockSnapshot`].
#[derive(Debug)]
pub struct SeriesSynthesizer<R: Rng = StdRng> {
    rng: R,
    max_bars: usize,
}

impl SeriesSynthesizer<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Seeded when `seed` is set, entropy otherwise.
    pub fn with_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => Self::seeded(s),
            None => Self::from_entropy(),
        }
    }
}

impl<R: Rng> SeriesSynthesizer<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            max_bars: DEFAULT_MAX_BARS,
        }
    }

    /// Limit the number of bars a single call may produce.
    pub fn with_max_bars(mut self, max_bars: usize) -> Self {
        self.max_bars = max_bars;
        self
    }

    pub fn max_bars(&self) -> usize {
        self.max_bars
    }

    /// Synthesize bars for every step in `(range.start, range.end]`.
    ///
    /// Returns an empty series when the range is shorter than one interval,
    /// and `InvalidArgument` when it would hold more than `max_bars` bars.
    pub fn synthesize(
        &mut self,
        snapshot: &StockSnapshot,
        interval_minutes: u32,
        range: TimeRange,
    ) -> DeskResult<Vec<IntervalBar>> {
        if interval_minutes == 0 {
            return Err(DeskError::invalid("interval must be at least one minute"));
        }
        if range.start > range.end {
            return Err(DeskError::invalid(format!(
                "range start {} is after end {}",
                range.start, range.end
            )));
        }
        snapshot.validate()?;

        let baseline_volume = interval_volume(snapshot.avg_volume, interval_minutes);
        let step = Duration::minutes(i64::from(interval_minutes));

        let span_ms = range.end.signed_duration_since(range.start).num_milliseconds();
        let expected = u64::try_from(span_ms / step.num_milliseconds()).unwrap_or(0);
        if expected > self.max_bars as u64 {
            return Err(DeskError::invalid(format!(
                "range holds {expected} bars of {interval_minutes}m, limit is {}",
                self.max_bars
            )));
        }
        let mut bars = Vec::with_capacity((expected as usize).min(MAX_PREALLOCATED_BARS));

        let mut previous_close = snapshot.reference_price;
        let mut next_at = range.start.checked_add_signed(step);
        while let Some(at) = next_at.filter(|at| *at <= range.end) {
            let bar = self.next_bar(previous_close, baseline_volume, at);
            previous_close = bar.close;
            bars.push(bar);
            next_at = at.checked_add_signed(step);
        }

        Ok(bars)
    }

    fn next_bar(
        &mut self,
        previous_close: f64,
        baseline_volume: f64,
        timestamp: DateTime<Utc>,
    ) -> IntervalBar {
        let r = self.rng.gen::<f64>() + 0.01;
        let mut change_pct = 2.0 * VOLATILITY * r;
        if change_pct > VOLATILITY {
            change_pct -= 2.0 * VOLATILITY;
        }

        let new_close = previous_close + previous_close * change_pct;

        let high = new_close.max(previous_close);
        let high = high + WICK_PAD * high;
        let low = new_close.min(previous_close);
        let low = low - WICK_PAD * low;

        IntervalBar {
            open: round2(previous_close),
            close: round2(new_close),
            high: round2(high),
            low: round2(low),
            volume: self.jitter_volume(baseline_volume),
            timestamp,
        }
    }

    /// Perturb `baseline` up or down by up to two thirds of itself.
    fn jitter_volume(&mut self, baseline: f64) -> f64 {
        let coef = round2(self.rng.gen::<f64>());
        let jittered = (baseline + baseline * coef / VOLUME_JITTER_DIVISOR).round();
        let delta = jittered - baseline;
        let sign = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        (baseline + delta * sign).round()
    }
}

/// Scale a daily volume to one interval.
fn interval_volume(daily_volume: f64, interval_minutes: u32) -> f64 {
    let minutes = f64::from(interval_minutes);
    if minutes < MINUTES_PER_DAY {
        daily_volume / (MINUTES_PER_DAY / minutes)
    } else {
        daily_volume * (minutes / MINUTES_PER_DAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 28, 9, 30, 0).unwrap()
    }

    fn snapshot() -> StockSnapshot {
        StockSnapshot::new("NVDA", 100.0, 14_400.0)
    }

    fn has_two_decimals(v: f64) -> bool {
        ((v * 100.0).round() - v * 100.0).abs() < 1e-6
    }

    #[test]
    fn three_hourly_bars_over_three_hours() {
        let mut synth = SeriesSynthesizer::seeded(7);
        let range = TimeRange::new(t0(), t0() + Duration::minutes(180));
        let bars = synth.synthesize(&snapshot(), 60, range).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].timestamp, t0() + Duration::minutes(60));
        assert_eq!(bars[2].timestamp, range.end);
        for bar in &bars {
            // Baseline is 14 400 / 24 = 600; jitter moves it by at most 400.
            assert!(bar.volume >= 200.0 && bar.volume <= 1000.0, "{}", bar.volume);
        }
    }

    #[test]
    fn bar_count_floors_partial_intervals() {
        let mut synth = SeriesSynthesizer::seeded(1);
        let range = TimeRange::new(t0(), t0() + Duration::minutes(47));
        let bars = synth.synthesize(&snapshot(), 15, range).unwrap();
        assert_eq!(bars.len(), 3);

        let range = TimeRange::new(t0(), t0() + Duration::days(3));
        let bars = synth.synthesize(&snapshot(), 5, range).unwrap();
        assert_eq!(bars.len(), 3 * 24 * 12);
    }

    #[test]
    fn timestamps_step_by_interval() {
        let mut synth = SeriesSynthesizer::seeded(3);
        let range = TimeRange::new(t0(), t0() + Duration::hours(6));
        let bars = synth.synthesize(&snapshot(), 30, range).unwrap();
        for pair in bars.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::minutes(30));
        }
    }

    #[test]
    fn bars_chain_and_round() {
        let mut synth = SeriesSynthesizer::seeded(42);
        let snap = StockSnapshot::new("AAPL", 187.456, 50_000_000.0);
        let range = TimeRange::new(t0(), t0() + Duration::days(1));
        let bars = synth.synthesize(&snap, 10, range).unwrap();

        assert_eq!(bars[0].open, 187.46);
        for pair in bars.windows(2) {
            assert_eq!(pair[1].open, pair[0].close);
        }
        for bar in &bars {
            assert!(has_two_decimals(bar.open));
            assert!(has_two_decimals(bar.close));
            assert!(has_two_decimals(bar.high));
            assert!(has_two_decimals(bar.low));
            assert_eq!(bar.volume, bar.volume.round());
            assert!(bar.high >= bar.open.max(bar.close));
            assert!(bar.low <= bar.open.min(bar.close));
        }
    }

    #[test]
    fn closes_move_at_most_volatility() {
        let mut synth = SeriesSynthesizer::seeded(99);
        let range = TimeRange::new(t0(), t0() + Duration::days(2));
        let bars = synth.synthesize(&snapshot(), 15, range).unwrap();
        for bar in &bars {
            let move_pct = (bar.close - bar.open) / bar.open;
            // Rounding to cents can push the ratio marginally past the bound.
            assert!(move_pct.abs() <= VOLATILITY + 0.001, "{move_pct}");
        }
    }

    #[test]
    fn short_range_is_empty_not_error() {
        let mut synth = SeriesSynthesizer::seeded(0);
        let range = TimeRange::new(t0(), t0() + Duration::minutes(59));
        assert!(synth.synthesize(&snapshot(), 60, range).unwrap().is_empty());

        let range = TimeRange::new(t0(), t0());
        assert!(synth.synthesize(&snapshot(), 1, range).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_arguments() {
        let mut synth = SeriesSynthesizer::seeded(0);
        let range = TimeRange::new(t0(), t0() + Duration::hours(1));
        assert!(matches!(
            synth.synthesize(&snapshot(), 0, range),
            Err(DeskError::InvalidArgument(_))
        ));

        let reversed = TimeRange::new(range.end, range.start);
        assert!(matches!(
            synth.synthesize(&snapshot(), 5, reversed),
            Err(DeskError::InvalidArgument(_))
        ));

        let bad = StockSnapshot::new("X", f64::NAN, 10.0);
        assert!(synth.synthesize(&bad, 5, range).is_err());
        let bad = StockSnapshot::new("X", 10.0, -1.0);
        assert!(synth.synthesize(&bad, 5, range).is_err());
    }

    #[test]
    fn range_ending_at_max_timestamp_does_not_overflow() {
        let mut synth = SeriesSynthesizer::seeded(2);
        let end = DateTime::<Utc>::MAX_UTC;

        let range = TimeRange::new(end - Duration::minutes(30), end);
        assert!(synth.synthesize(&snapshot(), 60, range).unwrap().is_empty());

        let range = TimeRange::new(end - Duration::minutes(120), end);
        let bars = synth.synthesize(&snapshot(), 60, range).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].timestamp, end);
    }

    #[test]
    fn huge_interval_past_max_timestamp_is_empty() {
        let mut synth = SeriesSynthesizer::seeded(2);
        let range = TimeRange::new(t0(), DateTime::<Utc>::MAX_UTC);
        let bars = synth.synthesize(&snapshot(), u32::MAX, range).unwrap();
        // u32::MAX minutes is roughly 8 000 years, so a few steps still fit.
        assert!(!bars.is_empty());
        for pair in bars.windows(2) {
            assert_eq!(
                pair[1].timestamp - pair[0].timestamp,
                Duration::minutes(i64::from(u32::MAX))
            );
        }
    }

    #[test]
    fn oversized_range_is_rejected_before_allocating() {
        let mut synth = SeriesSynthesizer::seeded(4);
        let start = Utc.with_ymd_and_hms(1900, 1, 1, 0, 0, 0).unwrap();
        let end = DateTime::<Utc>::MAX_UTC;
        assert!(matches!(
            synth.synthesize(&snapshot(), 1, TimeRange::new(start, end)),
            Err(DeskError::InvalidArgument(_))
        ));
    }

    #[test]
    fn bar_limit_is_inclusive() {
        let mut synth = SeriesSynthesizer::seeded(4).with_max_bars(10);
        assert_eq!(synth.max_bars(), 10);

        let range = TimeRange::new(t0(), t0() + Duration::minutes(10));
        assert_eq!(synth.synthesize(&snapshot(), 1, range).unwrap().len(), 10);

        let range = TimeRange::new(t0(), t0() + Duration::minutes(11));
        let err = synth.synthesize(&snapshot(), 1, range).unwrap_err();
        assert!(err.to_string().contains("limit is 10"), "{err}");
    }

    #[test]
    fn same_seed_same_series() {
        let range = TimeRange::new(t0(), t0() + Duration::hours(8));
        let a = SeriesSynthesizer::seeded(5)
            .synthesize(&snapshot(), 30, range)
            .unwrap();
        let b = SeriesSynthesizer::seeded(5)
            .synthesize(&snapshot(), 30, range)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn volume_scales_with_interval() {
        assert_eq!(interval_volume(14_400.0, 60), 600.0);
        assert_eq!(interval_volume(14_400.0, 1440), 14_400.0);
        assert_eq!(interval_volume(14_400.0, 2880), 28_800.0);
    }

    #[test]
    fn zero_volume_stays_zero() {
        let mut synth = SeriesSynthesizer::seeded(11);
        for _ in 0..50 {
            assert_eq!(synth.jitter_volume(0.0), 0.0);
        }
    }

    #[test]
    fn snapshot_from_stock_uses_latest_intraday() {
        let stock = Stock {
            symbol: "MSFT".into(),
            name: "Microsoft".into(),
            price: 410.0,
            day_change: 0.0,
            change_pct: 0.0,
            volume: 20_000_000.0,
            volume_avg: 22_000_000.0,
            market_cap: 0.0,
            pe: Some(35.0),
            intraday: vec![409.5, 408.0],
        };
        let snap = StockSnapshot::from_stock(&stock).unwrap();
        assert_eq!(snap.reference_price, 409.5);
        assert_eq!(snap.avg_volume, 20_000_000.0);

        let empty = Stock {
            intraday: vec![],
            ..stock
        };
        assert!(StockSnapshot::from_stock(&empty).is_err());
    }
}
