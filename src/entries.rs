//! Tracked entries ("calls"): the token, the price it was called at, and
//! where it sits in its lifecycle.

use crate::errors::EntryError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingStatus {
    /// Entry price not fixed yet; never computed
    Pending,
    /// Computed by the backfill and raised by the live refresh
    Active,
    /// Frozen; only a missing record is ever created
    Inactive,
}

impl TrackingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingStatus::Pending => "pending",
            TrackingStatus::Active => "active",
            TrackingStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(TrackingStatus::Pending),
            "active" => Some(TrackingStatus::Active),
            "inactive" => Some(TrackingStatus::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEntry {
    pub id: i64,
    pub token_id: String,
    pub entry_price: Option<f64>,
    pub entry_supply: Option<f64>,
    pub entry_market_cap: Option<f64>,
    pub entry_time: i64,
    pub status: TrackingStatus,
}

impl TrackedEntry {
    /// Circulating supply, given directly or implied by market cap / price
    pub fn supply(&self) -> Option<f64> {
        if let Some(supply) = self.entry_supply.filter(|s| s.is_finite() && *s > 0.0) {
            return Some(supply);
        }
        match (self.entry_market_cap, self.valid_entry_price()) {
            (Some(mc), Some(price)) if mc.is_finite() && mc > 0.0 => Some(mc / price),
            _ => None,
        }
    }

    pub fn market_cap_at(&self, price: f64) -> Option<f64> {
        self.supply().map(|s| s * price)
    }

    pub fn valid_entry_price(&self) -> Option<f64> {
        self.entry_price.filter(|p| p.is_finite() && *p > 0.0)
    }

    /// Entry price, or the reason this entry cannot be computed
    pub fn require_entry_price(&self) -> Result<f64, EntryError> {
        if self.entry_time <= 0 {
            return Err(EntryError::InvalidEntryTime {
                entry_id: self.id,
                entry_time: self.entry_time,
            });
        }
        self.valid_entry_price()
            .ok_or(EntryError::MissingEntryPrice { entry_id: self.id })
    }
}

/// A call to register
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub token_id: String,
    pub entry_price: Option<f64>,
    pub entry_supply: Option<f64>,
    pub entry_market_cap: Option<f64>,
    pub entry_time: i64,
    pub status: TrackingStatus,
}

/// Which entries a backfill run should consider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryFilter {
    /// Also re-select records stored as trivial (no candle data)
    pub include_insufficient: bool,
    /// Select every matching Active entry regardless of freshness
    pub force: bool,
    /// Restrict to a single token
    pub token: Option<String>,
    /// Cap on the number of entries selected
    pub limit: Option<usize>,
    /// Active records last updated before `now - stale_after_secs` are stale
    pub stale_after_secs: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(price: Option<f64>, supply: Option<f64>, mc: Option<f64>) -> TrackedEntry {
        TrackedEntry {
            id: 1,
            token_id: "mint".to_string(),
            entry_price: price,
            entry_supply: supply,
            entry_market_cap: mc,
            entry_time: 1_700_000_000,
            status: TrackingStatus::Active,
        }
    }

    #[test]
    fn test_supply_prefers_explicit() {
        let e = entry(Some(0.5), Some(1_000.0), Some(9_999.0));
        assert_eq!(e.supply(), Some(1_000.0));
        assert_eq!(e.market_cap_at(2.0), Some(2_000.0));
    }

    #[test]
    fn test_supply_from_market_cap() {
        let e = entry(Some(0.5), None, Some(500.0));
        assert_eq!(e.supply(), Some(1_000.0));
        assert_eq!(entry(None, None, Some(500.0)).supply(), None);
    }

    #[test]
    fn test_require_entry_price() {
        assert_eq!(entry(Some(1.0), None, None).require_entry_price(), Ok(1.0));
        assert_eq!(
            entry(Some(0.0), None, None).require_entry_price(),
            Err(EntryError::MissingEntryPrice { entry_id: 1 })
        );
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(TrackingStatus::parse("Active"), Some(TrackingStatus::Active));
        assert_eq!(TrackingStatus::parse("closed"), None);
    }
}
