//! Extremum types: the pure accumulator result and the persisted record

use crate::entries::TrackedEntry;
use crate::ohlcvs::Candle;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Clock skew allowed between the entry time and candle timestamps
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Multiples whose first crossing time is recorded
pub const MILESTONE_MULTIPLES: [f64; 4] = [2.0, 3.0, 5.0, 10.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub at: i64,
}

impl PricePoint {
    pub fn new(price: f64, at: i64) -> Self {
        Self { price, at }
    }
}

/// Seconds from entry until price first reached each multiple
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Milestones {
    pub time_to_2x: Option<i64>,
    pub time_to_3x: Option<i64>,
    pub time_to_5x: Option<i64>,
    pub time_to_10x: Option<i64>,
}

impl Milestones {
    fn slot_mut(&mut self, index: usize) -> Option<&mut Option<i64>> {
        match index {
            0 => Some(&mut self.time_to_2x),
            1 => Some(&mut self.time_to_3x),
            2 => Some(&mut self.time_to_5x),
            3 => Some(&mut self.time_to_10x),
            _ => None,
        }
    }

    pub fn as_array(&self) -> [Option<i64>; 4] {
        [self.time_to_2x, self.time_to_3x, self.time_to_5x, self.time_to_10x]
    }

    /// Record crossings for `price` observed `elapsed` seconds after entry;
    /// already-recorded milestones are left alone
    pub fn observe(&mut self, entry_price: f64, price: f64, elapsed: i64) {
        for (index, multiple) in MILESTONE_MULTIPLES.iter().enumerate() {
            if price >= entry_price * multiple {
                if let Some(slot) = self.slot_mut(index) {
                    slot.get_or_insert(elapsed.max(0));
                }
            }
        }
    }

    /// Keep every milestone already set, fill the rest from `other`
    pub fn merged_with(&self, other: &Milestones) -> Milestones {
        Milestones {
            time_to_2x: self.time_to_2x.or(other.time_to_2x),
            time_to_3x: self.time_to_3x.or(other.time_to_3x),
            time_to_5x: self.time_to_5x.or(other.time_to_5x),
            time_to_10x: self.time_to_10x.or(other.time_to_10x),
        }
    }
}

/// Everything the accumulator needs for one entry
#[derive(Debug, Clone)]
pub struct AccumulatorInput<'a> {
    pub entry_price: f64,
    pub entry_time: i64,
    pub current: Option<PricePoint>,
    pub supply: Option<f64>,
    /// Chronologically merged candles
    pub candles: &'a [Candle],
    pub tolerance_secs: i64,
}

/// Result of one accumulation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extremum {
    pub ath_price: f64,
    pub ath_at: i64,
    pub min_low_price: f64,
    pub min_low_at: i64,
    pub current: Option<PricePoint>,
    pub milestones: Milestones,
    pub coverage_start: Option<i64>,
    pub watermark: Option<i64>,
    pub insufficient_data: bool,
}

impl Extremum {
    /// Entry price as the peak, no dip, no coverage
    pub fn trivial(entry_price: f64, entry_time: i64) -> Self {
        Self {
            ath_price: entry_price,
            ath_at: entry_time,
            min_low_price: entry_price,
            min_low_at: entry_time,
            current: None,
            milestones: Milestones::default(),
            coverage_start: None,
            watermark: None,
            insufficient_data: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no usable candles and no current price")]
pub struct InsufficientData;

/// Persisted extremum statistics for one tracked entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtremumRecord {
    pub entry_id: i64,

    pub current_price: Option<f64>,
    pub current_multiple: Option<f64>,
    pub current_market_cap: Option<f64>,
    pub current_at: Option<i64>,

    pub ath_price: f64,
    pub ath_multiple: f64,
    pub ath_market_cap: Option<f64>,
    pub ath_at: i64,

    pub min_low_price: f64,
    pub min_low_at: i64,
    /// Percent, always <= 0
    pub max_drawdown: f64,

    pub time_to_ath: i64,
    pub time_to_drawdown: i64,
    pub milestones: Milestones,

    pub coverage_start: Option<i64>,
    pub watermark: Option<i64>,
    pub insufficient_data: bool,
    pub updated_at: i64,
}

impl ExtremumRecord {
    /// Fresh record from a single accumulation
    pub fn from_extremum(entry: &TrackedEntry, entry_price: f64, ext: &Extremum, now: i64) -> Self {
        let mut record = Self {
            entry_id: entry.id,
            current_price: ext.current.map(|c| c.price),
            current_multiple: None,
            current_market_cap: None,
            current_at: ext.current.map(|c| c.at),
            ath_price: ext.ath_price,
            ath_multiple: 1.0,
            ath_market_cap: None,
            ath_at: ext.ath_at,
            min_low_price: ext.min_low_price,
            min_low_at: ext.min_low_at,
            max_drawdown: 0.0,
            time_to_ath: 0,
            time_to_drawdown: 0,
            milestones: ext.milestones,
            coverage_start: ext.coverage_start,
            watermark: ext.watermark,
            insufficient_data: ext.insufficient_data,
            updated_at: now,
        };
        record.recompute_derived(entry, entry_price);
        record
    }

    /// Re-derive multiples, market caps, times and drawdown from the raw fields
    pub fn recompute_derived(&mut self, entry: &TrackedEntry, entry_price: f64) {
        self.ath_multiple = self.ath_price / entry_price;
        self.ath_market_cap = entry.market_cap_at(self.ath_price);
        self.current_multiple = self.current_price.map(|p| p / entry_price);
        self.current_market_cap = self.current_price.and_then(|p| entry.market_cap_at(p));
        self.time_to_ath = (self.ath_at - entry.entry_time).max(0);
        self.time_to_drawdown = (self.min_low_at - entry.entry_time).max(0);
        self.max_drawdown = drawdown_pct(entry_price, self.min_low_price);
    }

    /// Reset to the entry price as the peak with no dip
    pub fn reset_to_trivial_peak(&mut self, entry: &TrackedEntry, entry_price: f64) {
        self.ath_price = entry_price;
        self.ath_at = entry.entry_time;
        self.min_low_price = entry_price;
        self.min_low_at = entry.entry_time;
        self.recompute_derived(entry, entry_price);
    }
}

/// `(low - entry) / entry * 100`, clamped to <= 0
pub fn drawdown_pct(entry_price: f64, low: f64) -> f64 {
    if entry_price <= 0.0 || !low.is_finite() {
        return 0.0;
    }
    ((low - entry_price) / entry_price * 100.0).min(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_milestones_recorded_once() {
        let mut m = Milestones::default();
        m.observe(1.0, 3.5, 120);
        m.observe(1.0, 12.0, 600);
        m.observe(1.0, 2.5, 30);
        assert_eq!(m.as_array(), [Some(120), Some(120), Some(600), Some(600)]);
    }

    #[test]
    fn test_drawdown_clamped() {
        assert!((drawdown_pct(1.0, 0.9) + 10.0).abs() < 1e-9);
        assert_eq!(drawdown_pct(1.0, 1.2), 0.0);
        assert_eq!(drawdown_pct(0.0, 0.5), 0.0);
    }
}
