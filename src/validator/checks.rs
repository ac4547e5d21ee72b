// Per-row invariant checks

use super::types::{Thresholds, Violation, ViolationKind};
use crate::database::AuditRow;
use crate::entries::{TrackedEntry, TrackingStatus};
use crate::extremum::ExtremumRecord;

/// Every violation found on one (entry, record) pair; pending entries are
/// not audited
pub fn check_row(row: &AuditRow, thresholds: &Thresholds, now: i64) -> Vec<Violation> {
    match (&row.entry, &row.record) {
        (None, Some(record)) => vec![Violation::new(
            ViolationKind::MissingEntry,
            record.entry_id,
            None,
            format!("record for entry {} has no tracked entry", record.entry_id),
        )],
        (None, None) => Vec::new(),
        (Some(entry), _) if entry.status == TrackingStatus::Pending => Vec::new(),
        (Some(entry), record) => check_entry(entry, record.as_ref(), thresholds, now),
    }
}

fn check_entry(
    entry: &TrackedEntry,
    record: Option<&ExtremumRecord>,
    thresholds: &Thresholds,
    now: i64,
) -> Vec<Violation> {
    let token = Some(entry.token_id.as_str());
    let mut found = Vec::new();

    let Some(entry_price) = entry.valid_entry_price() else {
        found.push(Violation::new(
            ViolationKind::MissingEntry,
            entry.id,
            token,
            format!("{} entry has no positive entry price", entry.status),
        ));
        return found;
    };

    let Some(record) = record else {
        found.push(Violation::new(
            ViolationKind::MissingAth,
            entry.id,
            token,
            "no extremum record".to_string(),
        ));
        return found;
    };

    if !(record.ath_price > 0.0) {
        found.push(Violation::new(
            ViolationKind::MissingAth,
            entry.id,
            token,
            format!("ath_price {} is not positive", record.ath_price),
        ));
    }

    let floor = entry_price * (1.0 - thresholds.ath_tolerance_pct / 100.0);
    if record.ath_price < floor {
        found.push(Violation::new(
            ViolationKind::AthBelowEntry,
            entry.id,
            token,
            format!("ath {} below entry {}", record.ath_price, entry_price),
        ));
    }

    if !(record.ath_multiple > 0.0) || record.ath_multiple > thresholds.max_multiple {
        found.push(Violation::new(
            ViolationKind::ImpossibleMultiple,
            entry.id,
            token,
            format!("ath multiple {}", record.ath_multiple),
        ));
    }

    if record.time_to_ath < 0 {
        found.push(Violation::new(
            ViolationKind::NegativeTime,
            entry.id,
            token,
            format!("time to ath {}s", record.time_to_ath),
        ));
    }

    if record.ath_at < entry.entry_time - thresholds.time_tolerance_secs {
        found.push(Violation::new(
            ViolationKind::InvalidTime,
            entry.id,
            token,
            format!(
                "ath at {} is {}s before entry",
                record.ath_at,
                entry.entry_time - record.ath_at
            ),
        ));
    }

    if entry.status == TrackingStatus::Active
        && now - record.updated_at > thresholds.stale_threshold_secs
    {
        found.push(Violation::new(
            ViolationKind::StaleMetrics,
            entry.id,
            token,
            format!("last updated {}s ago", now - record.updated_at),
        ));
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extremum::Extremum;

    const T0: i64 = 1_700_000_000;

    fn entry(status: TrackingStatus) -> TrackedEntry {
        TrackedEntry {
            id: 3,
            token_id: "mint".to_string(),
            entry_price: Some(1.0),
            entry_supply: None,
            entry_market_cap: None,
            entry_time: T0,
            status,
        }
    }

    fn record(ath: f64, ath_at: i64) -> ExtremumRecord {
        let e = entry(TrackingStatus::Active);
        let mut ext = Extremum::trivial(1.0, T0);
        ext.ath_price = ath;
        ext.ath_at = ath_at;
        ExtremumRecord::from_extremum(&e, 1.0, &ext, T0 + 1_000)
    }

    fn kinds(row: AuditRow, now: i64) -> Vec<ViolationKind> {
        check_row(&row, &Thresholds::default(), now)
            .into_iter()
            .map(|v| v.kind)
            .collect()
    }

    #[test]
    fn test_healthy_row() {
        let row = AuditRow {
            entry: Some(entry(TrackingStatus::Active)),
            record: Some(record(2.0, T0 + 60)),
        };
        assert!(kinds(row, T0 + 2_000).is_empty());
    }

    #[test]
    fn test_ath_below_entry() {
        let row = AuditRow {
            entry: Some(entry(TrackingStatus::Active)),
            record: Some(record(0.8, T0)),
        };
        assert_eq!(kinds(row, T0 + 2_000), vec![ViolationKind::AthBelowEntry]);

        // Within the 5% tolerance
        let row = AuditRow {
            entry: Some(entry(TrackingStatus::Active)),
            record: Some(record(0.96, T0)),
        };
        assert!(kinds(row, T0 + 2_000).is_empty());
    }

    #[test]
    fn test_time_violations() {
        let mut r = record(2.0, T0 - 1_000);
        r.time_to_ath = -1_000;
        let row = AuditRow {
            entry: Some(entry(TrackingStatus::Inactive)),
            record: Some(r),
        };
        assert_eq!(
            kinds(row, T0 + 2_000),
            vec![ViolationKind::NegativeTime, ViolationKind::InvalidTime]
        );
    }

    #[test]
    fn test_missing_and_orphans() {
        let orphan = AuditRow {
            entry: None,
            record: Some(record(2.0, T0)),
        };
        assert_eq!(kinds(orphan, T0), vec![ViolationKind::MissingEntry]);

        let no_record = AuditRow {
            entry: Some(entry(TrackingStatus::Inactive)),
            record: None,
        };
        assert_eq!(kinds(no_record, T0), vec![ViolationKind::MissingAth]);

        let mut priceless = entry(TrackingStatus::Active);
        priceless.entry_price = None;
        let row = AuditRow {
            entry: Some(priceless),
            record: None,
        };
        assert_eq!(kinds(row, T0), vec![ViolationKind::MissingEntry]);

        let mut pending = entry(TrackingStatus::Pending);
        pending.entry_price = None;
        let row = AuditRow {
            entry: Some(pending),
            record: None,
        };
        assert!(kinds(row, T0).is_empty());
    }

    #[test]
    fn test_impossible_multiple_and_stale() {
        let mut r = record(2.0, T0 + 60);
        r.ath_multiple = 20_000.0;
        let row = AuditRow {
            entry: Some(entry(TrackingStatus::Active)),
            record: Some(r),
        };
        assert_eq!(
            kinds(row, T0 + 1_000 + 86_401),
            vec![ViolationKind::ImpossibleMultiple, ViolationKind::StaleMetrics]
        );
    }
}
