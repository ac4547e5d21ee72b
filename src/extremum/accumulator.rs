//! ATH / drawdown accumulation over a candle series
//!
//! Pure: the same input always yields the same output. Used identically by
//! the backfill (candles, no current price) and the live refresh (current
//! price, no candles).

use super::types::{AccumulatorInput, Extremum, InsufficientData, Milestones, PricePoint};
use crate::logger::{self, LogTag};

struct Observation {
    /// Candle time clamped to the entry time
    at: i64,
    /// Original candle time
    source_ts: i64,
    high: f64,
    low: f64,
    close: f64,
}

pub fn accumulate(input: &AccumulatorInput<'_>) -> Result<Extremum, InsufficientData> {
    let entry_price = input.entry_price;
    let entry_time = input.entry_time;
    if !entry_price.is_finite() || entry_price <= 0.0 {
        return Err(InsufficientData);
    }

    let earliest = entry_time - input.tolerance_secs.max(0);
    let mut observations: Vec<Observation> = input
        .candles
        .iter()
        .filter(|c| c.is_valid() && c.timestamp >= earliest)
        .map(|c| Observation {
            at: c.timestamp.max(entry_time),
            source_ts: c.timestamp,
            high: c.high,
            low: c.low,
            close: c.close,
        })
        .collect();
    observations.sort_by_key(|o| o.source_ts);

    let current = input
        .current
        .filter(|p| p.price.is_finite() && p.price > 0.0)
        .map(|p| PricePoint::new(p.price, p.at.max(entry_time)));

    if observations.is_empty() && current.is_none() {
        return Err(InsufficientData);
    }

    // Peaks in chronological order: candle highs and the current point, with
    // candles first on equal timestamps. Strict '>' keeps the earliest
    // occurrence on ties, and the entry price itself seeds the peak.
    let mut peaks: Vec<(i64, f64)> = observations.iter().map(|o| (o.at, o.high)).collect();
    if let Some(point) = current {
        peaks.push((point.at, point.price));
    }
    peaks.sort_by_key(|(at, _)| *at);

    let mut ath_price = entry_price;
    let mut ath_at = entry_time;
    let mut milestones = Milestones::default();
    for (at, price) in &peaks {
        if *price > ath_price {
            ath_price = *price;
            ath_at = *at;
        }
        milestones.observe(entry_price, *price, at - entry_time);
    }

    // Worst dip on the way to the peak, inclusive of the peak candle
    let mut min_low_price = entry_price;
    let mut min_low_at = entry_time;
    for obs in observations.iter().filter(|o| o.at <= ath_at) {
        if obs.low < min_low_price {
            min_low_price = obs.low;
            min_low_at = obs.at;
        }
    }

    let current = current.or_else(|| {
        observations
            .last()
            .map(|o| PricePoint::new(o.close, o.at))
    });

    let extremum = Extremum {
        ath_price,
        ath_at,
        min_low_price,
        min_low_at,
        current,
        milestones,
        coverage_start: observations.first().map(|o| o.source_ts),
        watermark: observations.last().map(|o| o.source_ts),
        insufficient_data: false,
    };

    logger::verbose(
        LogTag::Accumulator,
        &format!(
            "{} candles: ath={} at {}, min_low={} at {}",
            observations.len(),
            extremum.ath_price,
            extremum.ath_at,
            extremum.min_low_price,
            extremum.min_low_at
        ),
    );

    Ok(extremum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extremum::types::DEFAULT_TOLERANCE_SECS;
    use crate::ohlcvs::Candle;

    const T0: i64 = 1_700_000_000;

    fn candle(ts: i64, high: f64, low: f64) -> Candle {
        Candle::new(ts, low, high, low, low, 0.0)
    }

    fn input(candles: &[Candle], current: Option<PricePoint>) -> AccumulatorInput<'_> {
        AccumulatorInput {
            entry_price: 1.0,
            entry_time: T0,
            current,
            supply: None,
            candles,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    #[test]
    fn test_peak_and_dip_example() {
        let candles = [candle(T0 + 60, 2.0, 0.9), candle(T0 + 120, 1.5, 1.2)];
        let ext = accumulate(&input(&candles, None)).unwrap();

        assert_eq!(ext.ath_price, 2.0);
        assert_eq!(ext.ath_at, T0 + 60);
        assert_eq!(ext.min_low_price, 0.9);
        assert_eq!(ext.min_low_at, T0 + 60);
        assert_eq!(ext.milestones.time_to_2x, Some(60));
        assert_eq!(ext.milestones.time_to_3x, None);
        assert_eq!(ext.coverage_start, Some(T0 + 60));
        assert_eq!(ext.watermark, Some(T0 + 120));
        assert_eq!(ext.current.map(|c| c.price), Some(1.2));
        assert!(!ext.insufficient_data);
    }

    #[test]
    fn test_no_data_is_insufficient() {
        assert_eq!(accumulate(&input(&[], None)), Err(InsufficientData));
    }

    #[test]
    fn test_candles_before_skew_window_ignored() {
        let candles = [
            candle(T0 - 3600, 50.0, 0.1),
            candle(T0 - 120, 1.4, 0.8),
            candle(T0 + 60, 1.1, 0.95),
        ];
        let ext = accumulate(&input(&candles, None)).unwrap();

        assert_eq!(ext.ath_price, 1.4);
        // skew-window candle is treated as happening at entry time
        assert_eq!(ext.ath_at, T0);
        assert_eq!(ext.min_low_price, 0.8);
        assert_eq!(ext.min_low_at, T0);
        assert_eq!(ext.coverage_start, Some(T0 - 120));
    }

    #[test]
    fn test_dip_after_peak_not_counted() {
        let candles = [
            candle(T0 + 60, 1.05, 0.95),
            candle(T0 + 120, 3.0, 1.0),
            candle(T0 + 180, 1.0, 0.2),
        ];
        let ext = accumulate(&input(&candles, None)).unwrap();
        assert_eq!(ext.ath_at, T0 + 120);
        assert_eq!(ext.min_low_price, 0.95);
    }

    #[test]
    fn test_ties_keep_first_occurrence() {
        let candles = [candle(T0 + 60, 2.0, 1.0), candle(T0 + 600, 2.0, 1.0)];
        let ext = accumulate(&input(&candles, None)).unwrap();
        assert_eq!(ext.ath_at, T0 + 60);
    }

    #[test]
    fn test_current_price_only() {
        let ext = accumulate(&input(&[], Some(PricePoint::new(4.0, T0 + 900)))).unwrap();
        assert_eq!(ext.ath_price, 4.0);
        assert_eq!(ext.ath_at, T0 + 900);
        assert_eq!(ext.milestones.time_to_3x, Some(900));
        assert_eq!(ext.watermark, None);
        assert_eq!(ext.min_low_price, 1.0);
    }

    #[test]
    fn test_current_below_entry_keeps_entry_as_peak() {
        let ext = accumulate(&input(&[], Some(PricePoint::new(0.5, T0 + 900)))).unwrap();
        assert_eq!(ext.ath_price, 1.0);
        assert_eq!(ext.ath_at, T0);
        assert!(ext.ath_price >= ext.current.map(|c| c.price).unwrap_or(0.0));
    }

    #[test]
    fn test_pure_and_idempotent() {
        let candles = [candle(T0 + 60, 2.0, 0.9), candle(T0 + 3600, 6.0, 1.5)];
        let first = accumulate(&input(&candles, Some(PricePoint::new(5.0, T0 + 7200))));
        let second = accumulate(&input(&candles, Some(PricePoint::new(5.0, T0 + 7200))));
        assert_eq!(first, second);
    }

    #[test]
    fn test_superset_never_lowers_peak() {
        let base = [candle(T0 + 60, 2.0, 0.9), candle(T0 + 120, 1.5, 1.2)];
        let superset = [
            candle(T0 + 60, 2.0, 0.9),
            candle(T0 + 120, 1.5, 1.2),
            candle(T0 + 180, 2.5, 0.7),
        ];
        let a = accumulate(&input(&base, None)).unwrap();
        let b = accumulate(&input(&superset, None)).unwrap();
        assert!(b.ath_price >= a.ath_price);
        assert!(b.min_low_price <= a.min_low_price);
    }
}
