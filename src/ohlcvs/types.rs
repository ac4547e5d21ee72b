//! Core types for candle data

use serde::{Deserialize, Serialize};
use std::fmt;

/// Candle resolutions used by the planner, finest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "1d")]
    Day1,
}

impl Timeframe {
    /// Returns the duration in seconds for this timeframe
    pub fn to_seconds(&self) -> i64 {
        match self {
            Timeframe::Minute1 => 60,
            Timeframe::Hour1 => 3600,
            Timeframe::Day1 => 86400,
        }
    }

    /// Path segment used by the GeckoTerminal OHLCV endpoint
    pub fn to_api_param(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "minute",
            Timeframe::Hour1 => "hour",
            Timeframe::Day1 => "day",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Hour1 => "1h",
            Timeframe::Day1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single OHLCV candle; `timestamp` is the candle open time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Finite prices, positive low, and `high >= low`
    pub fn is_valid(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_finite())
            && self.low > 0.0
            && self.high >= self.low
            && self.timestamp > 0
    }

    /// Build from a provider row `[ts, o, h, l, c, v]`; malformed rows yield None
    pub fn from_row(row: &[serde_json::Value]) -> Option<Candle> {
        if row.len() < 6 {
            return None;
        }
        let num = |v: &serde_json::Value| -> Option<f64> {
            match v {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            }
        };

        let timestamp = num(&row[0])?;
        if !timestamp.is_finite() {
            return None;
        }
        let candle = Candle::new(
            timestamp as i64,
            num(&row[1])?,
            num(&row[2])?,
            num(&row[3])?,
            num(&row[4])?,
            num(&row[5]).filter(|v| v.is_finite()).unwrap_or(0.0),
        );
        candle.is_valid().then_some(candle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolSource {
    GeckoTerminal,
    DexScreener,
}

impl fmt::Display for PoolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolSource::GeckoTerminal => write!(f, "geckoterminal"),
            PoolSource::DexScreener => write!(f, "dexscreener"),
        }
    }
}

/// The pool whose candles stand in for a token's price history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolRef {
    pub address: String,
    pub dex: String,
    pub liquidity_usd: f64,
    pub source: PoolSource,
}

/// One planned provider call: candles of `timeframe` covering `[range_start, range_end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSegment {
    pub timeframe: Timeframe,
    pub range_start: i64,
    pub range_end: i64,
    pub limit: u32,
}

impl FetchSegment {
    pub fn span(&self) -> i64 {
        self.range_end - self.range_start
    }
}
