//! Folding a fresh accumulation into the stored record

use super::types::{Extremum, ExtremumRecord};
use crate::entries::TrackedEntry;

fn min_opt(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    }
}

fn extends_coverage(old: &ExtremumRecord, fresh: &Extremum) -> bool {
    let earlier_start = match (fresh.coverage_start, old.coverage_start) {
        (Some(new), Some(prev)) => new < prev,
        (Some(_), None) => true,
        _ => false,
    };
    let later_end = match (fresh.watermark, old.watermark) {
        (Some(new), Some(prev)) => new > prev,
        (Some(_), None) => true,
        _ => false,
    };
    earlier_start || later_end
}

/// Merge `fresh` into `existing`, producing the record to persist
///
/// Peak only ever rises (ties keep the older time), the dip is only replaced
/// by a run that saw candles the old one did not, milestones are write-once,
/// coverage widens, and every derived field is recomputed.
pub fn merge_into_record(
    entry: &TrackedEntry,
    entry_price: f64,
    existing: Option<&ExtremumRecord>,
    fresh: &Extremum,
    now: i64,
) -> ExtremumRecord {
    let Some(old) = existing else {
        return ExtremumRecord::from_extremum(entry, entry_price, fresh, now);
    };

    let mut merged = old.clone();

    if fresh.ath_price > old.ath_price {
        merged.ath_price = fresh.ath_price;
        merged.ath_at = fresh.ath_at;
    }

    // Dip candidates must lie on the way to the merged peak
    let old_low_valid = old.min_low_at <= merged.ath_at;
    let fresh_low_allowed = (extends_coverage(old, fresh) || !old_low_valid)
        && fresh.min_low_at <= merged.ath_at;

    let mut low: Option<(f64, i64)> = old_low_valid.then_some((old.min_low_price, old.min_low_at));
    if fresh_low_allowed {
        low = match low {
            Some((price, _)) if fresh.min_low_price < price => {
                Some((fresh.min_low_price, fresh.min_low_at))
            }
            None => Some((fresh.min_low_price, fresh.min_low_at)),
            keep => keep,
        };
    }
    let (low_price, low_at) = low.unwrap_or((entry_price, entry.entry_time));
    merged.min_low_price = low_price.min(entry_price);
    merged.min_low_at = if low_price <= entry_price {
        low_at
    } else {
        entry.entry_time
    };

    merged.milestones = old.milestones.merged_with(&fresh.milestones);
    merged.watermark = old.watermark.max(fresh.watermark);
    merged.coverage_start = min_opt(old.coverage_start, fresh.coverage_start);
    merged.insufficient_data = old.insufficient_data && fresh.insufficient_data;

    if let Some(point) = fresh.current {
        let newer = old.current_at.map_or(true, |at| point.at >= at);
        if newer {
            merged.current_price = Some(point.price);
            merged.current_at = Some(point.at);
        }
    }

    // The peak can never sit below the latest known price
    if let (Some(price), Some(at)) = (merged.current_price, merged.current_at) {
        if price > merged.ath_price {
            merged.ath_price = price;
            merged.ath_at = at;
        }
    }

    merged.updated_at = now;
    merged.recompute_derived(entry, entry_price);
    merged
}
