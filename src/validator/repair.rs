// Deterministic repairs for the auto-fixable violation kinds

use super::types::ViolationKind;
use crate::entries::TrackedEntry;
use crate::extremum::ExtremumRecord;

/// Repaired copy of `record`, or None when nothing applicable was found
///
/// A peak below entry or before the entry window falls back to the entry
/// itself as the peak; a negative time-to-ATH is clamped from the stored
/// timestamps.
pub fn repair_record(
    entry: &TrackedEntry,
    record: &ExtremumRecord,
    kinds: &[ViolationKind],
) -> Option<ExtremumRecord> {
    let entry_price = entry.valid_entry_price()?;
    let mut fixed = record.clone();
    let mut changed = false;

    if kinds
        .iter()
        .any(|k| matches!(k, ViolationKind::AthBelowEntry | ViolationKind::InvalidTime))
    {
        fixed.reset_to_trivial_peak(entry, entry_price);
        changed = true;
    }

    if kinds.contains(&ViolationKind::NegativeTime) {
        fixed.time_to_ath = (fixed.ath_at - entry.entry_time).max(0);
        changed = true;
    }

    changed.then_some(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::TrackingStatus;
    use crate::extremum::Extremum;

    const T0: i64 = 1_700_000_000;

    fn entry() -> TrackedEntry {
        TrackedEntry {
            id: 9,
            token_id: "mint".to_string(),
            entry_price: Some(1.0),
            entry_supply: Some(1_000.0),
            entry_market_cap: None,
            entry_time: T0,
            status: TrackingStatus::Active,
        }
    }

    #[test]
    fn test_ath_below_entry_resets_to_trivial_peak() {
        let e = entry();
        let mut ext = Extremum::trivial(1.0, T0);
        ext.ath_price = 0.8;
        ext.ath_at = T0 + 300;
        ext.min_low_price = 0.5;
        ext.min_low_at = T0 + 120;
        let record = ExtremumRecord::from_extremum(&e, 1.0, &ext, T0 + 600);

        let fixed = repair_record(&e, &record, &[ViolationKind::AthBelowEntry]).unwrap();
        assert_eq!(fixed.ath_price, 1.0);
        assert_eq!(fixed.ath_multiple, 1.0);
        assert_eq!(fixed.ath_at, T0);
        assert_eq!(fixed.time_to_ath, 0);
        assert_eq!(fixed.ath_market_cap, Some(1_000.0));
        assert_eq!(fixed.min_low_price, 1.0);
        assert_eq!(fixed.max_drawdown, 0.0);
        assert_eq!(fixed.time_to_drawdown, 0);
    }

    #[test]
    fn test_negative_time_clamped() {
        let e = entry();
        let mut record =
            ExtremumRecord::from_extremum(&e, 1.0, &Extremum::trivial(1.0, T0), T0);
        record.ath_price = 3.0;
        record.ath_at = T0 + 90;
        record.time_to_ath = -5;

        let fixed = repair_record(&e, &record, &[ViolationKind::NegativeTime]).unwrap();
        assert_eq!(fixed.time_to_ath, 90);
        assert_eq!(fixed.ath_price, 3.0);
    }

    #[test]
    fn test_nothing_to_fix() {
        let e = entry();
        let record = ExtremumRecord::from_extremum(&e, 1.0, &Extremum::trivial(1.0, T0), T0);
        assert!(repair_record(&e, &record, &[ViolationKind::StaleMetrics]).is_none());
    }
}
