//! Offline consistency audit of tracked entries and their records
//!
//! Every (entry, record) pair is checked against the stored invariants.
//! Violations are reported with a severity and a database health score;
//! the deterministic kinds can be repaired in place.

pub mod checks;
pub mod repair;
pub mod types;

pub use checks::check_row;
pub use repair::repair_record;
pub use types::{health_score, Severity, Thresholds, ValidationReport, Violation, ViolationKind};

use crate::database::ExtremumStore;
use crate::entries::TrackingStatus;
use crate::errors::StoreError;
use crate::logger::{self, LogTag};
use chrono::Utc;
use std::sync::Arc;

pub struct Validator {
    store: Arc<dyn ExtremumStore>,
    thresholds: Thresholds,
}

impl Validator {
    pub fn new(store: Arc<dyn ExtremumStore>, thresholds: Thresholds) -> Self {
        Self { store, thresholds }
    }

    pub fn validate(&self, fix: bool) -> Result<ValidationReport, StoreError> {
        self.validate_at(Utc::now().timestamp(), fix)
    }

    /// Audit every row as of `now`, repairing fixable rows when `fix` is set
    pub fn validate_at(&self, now: i64, fix: bool) -> Result<ValidationReport, StoreError> {
        let rows = self.store.get_audit_rows()?;
        let mut report = ValidationReport {
            entries_checked: rows.len(),
            checked_at: now,
            ..ValidationReport::default()
        };

        for row in &rows {
            let auditable = match &row.entry {
                Some(entry) => entry.status != TrackingStatus::Pending,
                None => row.record.is_some(),
            };
            if !auditable {
                continue;
            }
            report.auditable_entries += 1;
            if row.entry.is_some() && row.record.is_some() {
                report.entries_with_record += 1;
            }

            let violations = check_row(row, &self.thresholds, now);

            if fix {
                if let (Some(entry), Some(record)) = (&row.entry, &row.record) {
                    let kinds: Vec<ViolationKind> = violations
                        .iter()
                        .map(|v| v.kind)
                        .filter(ViolationKind::auto_fixable)
                        .collect();
                    if let Some(fixed) = repair_record(entry, record, &kinds) {
                        match self.store.upsert_extremum_record(&fixed) {
                            Ok(()) => {
                                report.records_fixed += 1;
                                logger::debug(
                                    LogTag::Validator,
                                    &format!("Repaired entry {} ({:?})", entry.id, kinds),
                                );
                            }
                            Err(e) => {
                                report.fix_failures += 1;
                                logger::error(
                                    LogTag::Validator,
                                    &format!("Repair of entry {} failed: {}", entry.id, e),
                                );
                            }
                        }
                    }
                }
            }

            report.violations.extend(violations);
        }

        report.finalize();
        log_report(&report);
        Ok(report)
    }
}

fn log_report(report: &ValidationReport) {
    let summary = format!(
        "Audit: {} auditable entries, {} violations ({} critical, {} high, {} medium, {} low), {} fixed, health {:.1}",
        report.auditable_entries,
        report.violations.len(),
        report.count(Severity::Critical),
        report.count(Severity::High),
        report.count(Severity::Medium),
        report.count(Severity::Low),
        report.records_fixed,
        report.health_score
    );
    if report.count(Severity::Critical) > 0 {
        logger::warning(LogTag::Validator, &summary);
    } else {
        logger::info(LogTag::Validator, &summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteStore;
    use crate::extremum::{Extremum, ExtremumRecord};
    use crate::testing::{active_entry, memory_store, T0};

    fn store_record(store: &SqliteStore, entry_id: i64, ath: f64, ath_at: i64) {
        let entry = store.get_entry(entry_id).unwrap().unwrap();
        let mut ext = Extremum::trivial(1.0, T0);
        ext.ath_price = ath;
        ext.ath_at = ath_at;
        ext.insufficient_data = false;
        ext.watermark = Some(T0 + 600);
        let record = ExtremumRecord::from_extremum(&entry, 1.0, &ext, T0 + 1_000);
        store.upsert_extremum_record(&record).unwrap();
    }

    #[test]
    fn test_report_and_fix() {
        let store = memory_store();
        let bad = store.insert_entry(&active_entry("Bad", 1.0, T0)).unwrap();
        let good = store.insert_entry(&active_entry("Good", 1.0, T0)).unwrap();
        store.insert_entry(&active_entry("Missing", 1.0, T0)).unwrap();
        let mut pending = active_entry("Pending", 1.0, T0);
        pending.status = TrackingStatus::Pending;
        store.insert_entry(&pending).unwrap();
        store_record(&store, bad, 0.8, T0);
        store_record(&store, good, 3.0, T0 + 60);

        let validator = Validator::new(store.clone(), Thresholds::default());
        let report = validator.validate_at(T0 + 2_000, false).unwrap();
        assert_eq!(report.entries_checked, 4);
        assert_eq!(report.auditable_entries, 3);
        assert_eq!(report.entries_with_record, 2);
        assert_eq!(report.count_kind(ViolationKind::AthBelowEntry), 1);
        assert_eq!(report.count_kind(ViolationKind::MissingAth), 1);
        assert_eq!(report.records_fixed, 0);
        // completeness 2/3, penalty 100 * (5 + 2) / 30
        let expected = 100.0 * 2.0 / 3.0 - 700.0 / 30.0;
        assert!((report.health_score - expected).abs() < 1e-9);

        let fixed = validator.validate_at(T0 + 2_000, true).unwrap();
        assert_eq!(fixed.records_fixed, 1);
        let record = store.get_extremum_record(bad).unwrap().unwrap();
        assert_eq!(record.ath_price, 1.0);
        assert_eq!(record.ath_multiple, 1.0);
        assert_eq!(record.time_to_ath, 0);

        let after = validator.validate_at(T0 + 2_000, false).unwrap();
        assert_eq!(after.count_kind(ViolationKind::AthBelowEntry), 0);
        assert_eq!(after.count_kind(ViolationKind::MissingAth), 1);
    }

    #[test]
    fn test_empty_store_is_fully_healthy() {
        let validator = Validator::new(memory_store(), Thresholds::default());
        let report = validator.validate_at(T0, false).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.health_score, 100.0);
    }
}
