// Violation taxonomy and the audit report

use crate::config::ValidatorConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Weight in the health penalty
    pub fn weight(&self) -> usize {
        match self {
            Severity::Critical => 10,
            Severity::High => 5,
            Severity::Medium => 2,
            Severity::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    /// Record without entry, or a non-pending entry without a usable price
    MissingEntry,
    MissingAth,
    AthBelowEntry,
    ImpossibleMultiple,
    NegativeTime,
    InvalidTime,
    StaleMetrics,
}

impl ViolationKind {
    pub fn severity(&self) -> Severity {
        match self {
            ViolationKind::MissingEntry | ViolationKind::ImpossibleMultiple => Severity::Critical,
            ViolationKind::AthBelowEntry | ViolationKind::NegativeTime | ViolationKind::InvalidTime => {
                Severity::High
            }
            ViolationKind::MissingAth => Severity::Medium,
            ViolationKind::StaleMetrics => Severity::Low,
        }
    }

    pub fn auto_fixable(&self) -> bool {
        matches!(
            self,
            ViolationKind::AthBelowEntry | ViolationKind::NegativeTime | ViolationKind::InvalidTime
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::MissingEntry => "MISSING_ENTRY",
            ViolationKind::MissingAth => "MISSING_ATH",
            ViolationKind::AthBelowEntry => "ATH_BELOW_ENTRY",
            ViolationKind::ImpossibleMultiple => "IMPOSSIBLE_MULTIPLE",
            ViolationKind::NegativeTime => "NEGATIVE_TIME",
            ViolationKind::InvalidTime => "INVALID_TIME",
            ViolationKind::StaleMetrics => "STALE_METRICS",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub entry_id: i64,
    pub token_id: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, entry_id: i64, token_id: Option<&str>, message: String) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            entry_id,
            token_id: token_id.map(str::to_string),
            message,
        }
    }
}

/// Limits the checks compare against
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub ath_tolerance_pct: f64,
    pub time_tolerance_secs: i64,
    pub stale_threshold_secs: i64,
    pub max_multiple: f64,
}

impl From<&ValidatorConfig> for Thresholds {
    fn from(config: &ValidatorConfig) -> Self {
        Self {
            ath_tolerance_pct: config.ath_tolerance_pct,
            time_tolerance_secs: config.time_tolerance_secs,
            stale_threshold_secs: config.stale_threshold_secs,
            max_multiple: config.max_multiple,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::from(&ValidatorConfig::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_kind: BTreeMap<ViolationKind, usize>,
    /// Every row looked at, pending entries included
    pub entries_checked: usize,
    /// Non-pending entries plus orphan records
    pub auditable_entries: usize,
    pub entries_with_record: usize,
    pub records_fixed: usize,
    pub fix_failures: usize,
    pub health_score: f64,
    pub checked_at: i64,
}

impl ValidationReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    pub fn count_kind(&self, kind: ViolationKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Fill the per-severity and per-kind tallies and the health score
    pub fn finalize(&mut self) {
        self.by_severity.clear();
        self.by_kind.clear();
        for v in &self.violations {
            *self.by_severity.entry(v.severity).or_insert(0) += 1;
            *self.by_kind.entry(v.kind).or_insert(0) += 1;
        }
        self.health_score =
            health_score(self.entries_with_record, self.auditable_entries, &self.violations);
    }
}

/// Completeness minus a severity-weighted penalty, clamped to [0, 100]
pub fn health_score(entries_with_record: usize, auditable: usize, violations: &[Violation]) -> f64 {
    let completeness = if auditable == 0 {
        1.0
    } else {
        entries_with_record as f64 / auditable as f64
    };
    let weighted: usize = violations.iter().map(|v| v.severity.weight()).sum();
    let penalty = 100.0 * weighted as f64 / (10.0 * auditable.max(1) as f64);
    (100.0 * completeness - penalty).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(kind: ViolationKind) -> Violation {
        Violation::new(kind, 1, None, String::new())
    }

    #[test]
    fn test_empty_database_is_healthy() {
        assert_eq!(health_score(0, 0, &[]), 100.0);
    }

    #[test]
    fn test_health_penalty() {
        // 10 entries, 9 with records: 90 - 100 * (5 + 1) / 100 = 84
        let violations = [violation(ViolationKind::AthBelowEntry), violation(ViolationKind::StaleMetrics)];
        assert!((health_score(9, 10, &violations) - 84.0).abs() < 1e-9);
    }

    #[test]
    fn test_health_clamped_at_zero() {
        let violations: Vec<_> = (0..5).map(|_| violation(ViolationKind::MissingEntry)).collect();
        assert_eq!(health_score(1, 1, &violations), 0.0);
    }

    #[test]
    fn test_finalize_counts() {
        let mut report = ValidationReport {
            violations: vec![
                violation(ViolationKind::NegativeTime),
                violation(ViolationKind::InvalidTime),
                violation(ViolationKind::MissingAth),
            ],
            auditable_entries: 4,
            entries_with_record: 4,
            ..ValidationReport::default()
        };
        report.finalize();
        assert_eq!(report.count(Severity::High), 2);
        assert_eq!(report.count(Severity::Medium), 1);
        assert_eq!(report.count_kind(ViolationKind::InvalidTime), 1);
        assert!((report.health_score - 70.0).abs() < 1e-9);
    }
}
