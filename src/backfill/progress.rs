//! Backfill progress: the status object and the mutex-guarded tracker that
//! owns it while a run is in flight.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackfillStatus {
    Idle,
    Running,
    Paused,
    Complete,
    Error,
}

impl fmt::Display for BackfillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackfillStatus::Idle => "idle",
            BackfillStatus::Running => "running",
            BackfillStatus::Paused => "paused",
            BackfillStatus::Complete => "complete",
            BackfillStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackfillPhase {
    Idle,
    Selecting,
    Processing,
    Finalizing,
}

impl fmt::Display for BackfillPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackfillPhase::Idle => "idle",
            BackfillPhase::Selecting => "selecting",
            BackfillPhase::Processing => "processing",
            BackfillPhase::Finalizing => "finalizing",
        };
        f.write_str(s)
    }
}

/// Per-entry result inside a token-group unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Record computed from candles and stored
    Succeeded,
    /// No data; trivial record stored
    Insufficient,
    /// Persistence failure
    Failed,
    /// Malformed entry, not computable
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillProgress {
    pub status: BackfillStatus,
    pub phase: BackfillPhase,
    pub total_entries: usize,
    pub total_groups: usize,
    pub processed_groups: usize,
    pub processed_entries: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub insufficient: usize,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub elapsed_secs: f64,
    pub avg_unit_secs: Option<f64>,
    pub eta_secs: Option<f64>,
    pub last_error: Option<String>,
    /// Tokens whose units are in flight in the current wave
    #[serde(default)]
    pub active_tokens: Vec<String>,
}

impl Default for BackfillProgress {
    fn default() -> Self {
        Self {
            status: BackfillStatus::Idle,
            phase: BackfillPhase::Idle,
            total_entries: 0,
            total_groups: 0,
            processed_groups: 0,
            processed_entries: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            insufficient: 0,
            started_at: None,
            finished_at: None,
            elapsed_secs: 0.0,
            avg_unit_secs: None,
            eta_secs: None,
            last_error: None,
            active_tokens: Vec::new(),
        }
    }
}

impl BackfillProgress {
    pub fn is_running(&self) -> bool {
        self.status == BackfillStatus::Running
    }

    pub fn is_complete(&self) -> bool {
        self.status == BackfillStatus::Complete
    }

    pub fn percent_complete(&self) -> f64 {
        if self.total_groups == 0 {
            return if self.is_complete() { 100.0 } else { 0.0 };
        }
        self.processed_groups as f64 / self.total_groups as f64 * 100.0
    }

    /// A snapshot persisted mid-run means the process died; treat as paused
    pub fn recovered(mut self) -> Self {
        if self.status == BackfillStatus::Running {
            self.status = BackfillStatus::Paused;
            self.phase = BackfillPhase::Idle;
            self.active_tokens.clear();
        }
        self
    }
}

struct TrackerState {
    progress: BackfillProgress,
    unit_durations: VecDeque<f64>,
}

/// Owner of the progress object; every mutation goes through here
pub struct ProgressTracker {
    state: Mutex<TrackerState>,
    eta_window: usize,
}

impl ProgressTracker {
    pub fn new(initial: BackfillProgress, eta_window: usize) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                progress: initial,
                unit_durations: VecDeque::new(),
            }),
            eta_window: eta_window.max(1),
        }
    }

    pub fn snapshot(&self) -> BackfillProgress {
        self.state.lock().progress.clone()
    }

    /// Atomically move to Running; false when a run is already active
    pub fn try_begin(&self, now: i64) -> bool {
        let mut state = self.state.lock();
        if state.progress.is_running() {
            return false;
        }
        state.progress = BackfillProgress {
            status: BackfillStatus::Running,
            phase: BackfillPhase::Selecting,
            started_at: Some(now),
            ..BackfillProgress::default()
        };
        state.unit_durations.clear();
        true
    }

    pub fn set_phase(&self, phase: BackfillPhase) {
        self.state.lock().progress.phase = phase;
    }

    pub fn set_totals(&self, total_entries: usize, total_groups: usize) {
        let mut state = self.state.lock();
        state.progress.total_entries = total_entries;
        state.progress.total_groups = total_groups;
    }

    pub fn begin_unit(&self, token_id: &str) {
        let mut state = self.state.lock();
        if !state.progress.active_tokens.iter().any(|t| t == token_id) {
            state.progress.active_tokens.push(token_id.to_string());
        }
    }

    /// Count one finished token-group unit and refresh the ETA
    pub fn record_unit(
        &self,
        token_id: &str,
        outcomes: &[EntryOutcome],
        duration_secs: f64,
        concurrency: usize,
    ) {
        let mut state = self.state.lock();
        state.progress.active_tokens.retain(|t| t != token_id);

        state.unit_durations.push_back(duration_secs.max(0.0));
        while state.unit_durations.len() > self.eta_window {
            state.unit_durations.pop_front();
        }
        let avg = state.unit_durations.iter().sum::<f64>() / state.unit_durations.len() as f64;

        let progress = &mut state.progress;
        progress.processed_groups += 1;
        for outcome in outcomes {
            progress.processed_entries += 1;
            match outcome {
                EntryOutcome::Succeeded => progress.succeeded += 1,
                EntryOutcome::Insufficient => progress.insufficient += 1,
                EntryOutcome::Failed => progress.failed += 1,
                EntryOutcome::Skipped => progress.skipped += 1,
            }
        }

        let remaining = progress.total_groups.saturating_sub(progress.processed_groups);
        progress.avg_unit_secs = Some(avg);
        progress.eta_secs = Some(avg * remaining as f64 / concurrency.max(1) as f64);
    }

    pub fn set_elapsed(&self, now: i64) {
        let mut state = self.state.lock();
        if let Some(started) = state.progress.started_at {
            state.progress.elapsed_secs = (now - started).max(0) as f64;
        }
    }

    pub fn record_error(&self, message: String) {
        self.state.lock().progress.last_error = Some(message);
    }

    pub fn finish(&self, status: BackfillStatus, now: i64) -> BackfillProgress {
        let mut state = self.state.lock();
        let progress = &mut state.progress;
        progress.status = status;
        progress.phase = BackfillPhase::Idle;
        progress.finished_at = Some(now);
        progress.active_tokens.clear();
        if let Some(started) = progress.started_at {
            progress.elapsed_secs = (now - started).max(0) as f64;
        }
        if status == BackfillStatus::Complete {
            progress.eta_secs = Some(0.0);
        }
        progress.clone()
    }

    /// Back to idle; refused while running
    pub fn reset(&self) -> bool {
        let mut state = self.state.lock();
        if state.progress.is_running() {
            return false;
        }
        state.progress = BackfillProgress::default();
        state.unit_durations.clear();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_rejected_while_running() {
        let tracker = ProgressTracker::new(BackfillProgress::default(), 20);
        assert!(tracker.try_begin(100));
        assert!(!tracker.try_begin(101));
        assert!(!tracker.reset());

        tracker.finish(BackfillStatus::Paused, 150);
        assert!(tracker.try_begin(200));
    }

    #[test]
    fn test_eta_uses_moving_window() {
        let tracker = ProgressTracker::new(BackfillProgress::default(), 2);
        tracker.try_begin(0);
        tracker.set_totals(10, 5);

        tracker.record_unit("A", &[EntryOutcome::Succeeded], 10.0, 1);
        tracker.record_unit("B", &[EntryOutcome::Insufficient, EntryOutcome::Failed], 2.0, 1);
        tracker.record_unit("C", &[EntryOutcome::Skipped], 4.0, 2);

        let progress = tracker.snapshot();
        assert_eq!(progress.processed_groups, 3);
        assert_eq!(progress.processed_entries, 4);
        assert_eq!((progress.succeeded, progress.insufficient, progress.failed, progress.skipped), (1, 1, 1, 1));
        // window keeps [2.0, 4.0]; 2 groups left across concurrency 2
        assert_eq!(progress.avg_unit_secs, Some(3.0));
        assert_eq!(progress.eta_secs, Some(3.0));
    }

    #[test]
    fn test_active_tokens_follow_concurrent_units() {
        let tracker = ProgressTracker::new(BackfillProgress::default(), 20);
        tracker.try_begin(0);
        tracker.set_totals(3, 3);

        tracker.begin_unit("A");
        tracker.begin_unit("B");
        tracker.begin_unit("A");
        assert_eq!(tracker.snapshot().active_tokens, vec!["A".to_string(), "B".to_string()]);

        tracker.record_unit("A", &[EntryOutcome::Succeeded], 1.0, 2);
        assert_eq!(tracker.snapshot().active_tokens, vec!["B".to_string()]);

        tracker.begin_unit("C");
        let done = tracker.finish(BackfillStatus::Paused, 10);
        assert!(done.active_tokens.is_empty());
    }

    #[test]
    fn test_recovered_running_becomes_paused() {
        let progress = BackfillProgress {
            status: BackfillStatus::Running,
            phase: BackfillPhase::Processing,
            ..BackfillProgress::default()
        };
        let recovered = progress.recovered();
        assert_eq!(recovered.status, BackfillStatus::Paused);
        assert_eq!(recovered.phase, BackfillPhase::Idle);
    }
}
