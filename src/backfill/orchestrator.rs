// Resumable ATH backfill over every entry that still needs computing

use super::progress::{BackfillPhase, BackfillProgress, BackfillStatus, EntryOutcome, ProgressTracker};
use super::selection::{group_by_token, TokenGroup};
use crate::config::{BackfillConfig, Config};
use crate::database::ExtremumStore;
use crate::entries::{EntryFilter, TrackedEntry, TrackingStatus};
use crate::errors::BackfillError;
use crate::extremum::{
    accumulate, merge_into_record, AccumulatorInput, Extremum, ExtremumRecord,
};
use crate::logger::{self, LogTag};
use crate::ohlcvs::{merge_candle_series, plan_fetches, Candle, CandleSource};
use chrono::Utc;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Operator-chosen selection for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackfillOptions {
    pub include_insufficient: bool,
    pub force: bool,
    pub token: Option<String>,
    pub limit: Option<usize>,
}

/// Knobs the orchestrator reads once at construction
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillSettings {
    pub concurrency: usize,
    pub wave_delay: Duration,
    pub stale_after_secs: i64,
    pub eta_window: usize,
    pub max_candles_per_call: u32,
    pub tolerance_secs: i64,
}

impl BackfillSettings {
    pub fn from_config(config: &Config) -> Self {
        let backfill: &BackfillConfig = &config.backfill;
        Self {
            concurrency: backfill.concurrency.max(1),
            wave_delay: Duration::from_millis(backfill.wave_delay_ms),
            stale_after_secs: backfill.stale_after_secs,
            eta_window: backfill.eta_window,
            max_candles_per_call: config.ohlcv.max_candles_per_call,
            tolerance_secs: config.validator.time_tolerance_secs,
        }
    }
}

/// Cloneable handle that requests a cooperative stop
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct BackfillOrchestrator {
    store: Arc<dyn ExtremumStore>,
    source: Arc<dyn CandleSource>,
    settings: BackfillSettings,
    tracker: ProgressTracker,
    stop_flag: Arc<AtomicBool>,
}

impl BackfillOrchestrator {
    /// Build an orchestrator, picking up the last persisted progress
    pub fn new(
        store: Arc<dyn ExtremumStore>,
        source: Arc<dyn CandleSource>,
        settings: BackfillSettings,
    ) -> Self {
        let initial = match store.load_backfill_progress() {
            Ok(Some(progress)) => progress,
            Ok(None) => BackfillProgress::default(),
            Err(e) => {
                logger::warning(
                    LogTag::Backfill,
                    &format!("Could not load saved progress, starting idle: {}", e),
                );
                BackfillProgress::default()
            }
        };
        let tracker = ProgressTracker::new(initial, settings.eta_window);

        Self {
            store,
            source,
            settings,
            tracker,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn get_progress(&self) -> BackfillProgress {
        self.tracker.snapshot()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop_flag.clone())
    }

    /// Request a stop; the current unit finishes, the run becomes paused
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        logger::info(LogTag::Backfill, "Stop requested");
    }

    /// Clear progress back to idle; refused while a run is active
    pub fn reset(&self) -> Result<(), BackfillError> {
        if !self.tracker.reset() {
            return Err(BackfillError::AlreadyRunning);
        }
        self.store.save_backfill_progress(&self.tracker.snapshot())?;
        logger::info(LogTag::Backfill, "Progress reset to idle");
        Ok(())
    }

    /// Spawn a run in the background
    pub fn start(
        self: &Arc<Self>,
        options: BackfillOptions,
    ) -> Result<JoinHandle<BackfillProgress>, BackfillError> {
        self.begin()?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.execute(options).await }))
    }

    /// Run to completion (or until stopped) and return the final progress
    pub async fn run(&self, options: BackfillOptions) -> Result<BackfillProgress, BackfillError> {
        self.begin()?;
        Ok(self.execute(options).await)
    }

    fn begin(&self) -> Result<(), BackfillError> {
        if !self.tracker.try_begin(Utc::now().timestamp()) {
            return Err(BackfillError::AlreadyRunning);
        }
        self.stop_flag.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn filter_for(&self, options: &BackfillOptions) -> EntryFilter {
        EntryFilter {
            include_insufficient: options.include_insufficient,
            force: options.force,
            token: options.token.clone(),
            limit: options.limit,
            stale_after_secs: self.settings.stale_after_secs,
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save_backfill_progress(&self.tracker.snapshot()) {
            logger::warning(LogTag::Backfill, &format!("Failed to save progress: {}", e));
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    async fn execute(&self, options: BackfillOptions) -> BackfillProgress {
        let started = Utc::now().timestamp();
        self.persist();

        let filter = self.filter_for(&options);
        let selected = match self.store.get_entries_needing_computation(&filter, started) {
            Ok(selected) => selected,
            Err(e) => {
                logger::error(LogTag::Backfill, &format!("Entry selection failed: {}", e));
                self.tracker.record_error(e.to_string());
                let progress = self.tracker.finish(BackfillStatus::Error, Utc::now().timestamp());
                self.persist();
                return progress;
            }
        };

        let total_entries = selected.len();
        let force = options.force;
        let groups = group_by_token(selected, self.settings.tolerance_secs, force);
        self.tracker.set_totals(total_entries, groups.len());
        self.tracker.set_phase(BackfillPhase::Processing);
        self.persist();

        logger::info(
            LogTag::Backfill,
            &format!(
                "Backfill started: {} entries across {} tokens (concurrency {})",
                total_entries,
                groups.len(),
                self.settings.concurrency
            ),
        );

        let waves: Vec<&[TokenGroup]> = groups.chunks(self.settings.concurrency).collect();
        let wave_count = waves.len();
        let mut stopped = false;

        for (index, wave) in waves.into_iter().enumerate() {
            if self.stop_requested() {
                stopped = true;
                break;
            }

            let now = Utc::now().timestamp();
            join_all(wave.iter().map(|group| self.process_group(group, now))).await;
            self.tracker.set_elapsed(Utc::now().timestamp());
            self.persist();

            if index + 1 < wave_count && !self.settings.wave_delay.is_zero() {
                sleep(self.settings.wave_delay).await;
            }
        }

        // A stop that landed during the last wave still skipped units
        if !stopped && self.stop_requested() {
            let snapshot = self.tracker.snapshot();
            stopped = snapshot.processed_groups < snapshot.total_groups;
        }

        let status = if stopped {
            BackfillStatus::Paused
        } else {
            self.tracker.set_phase(BackfillPhase::Finalizing);
            BackfillStatus::Complete
        };
        let progress = self.tracker.finish(status, Utc::now().timestamp());
        self.persist();

        logger::info(
            LogTag::Backfill,
            &format!(
                "Backfill {}: {}/{} tokens, {} ok, {} insufficient, {} failed, {} skipped in {:.0}s",
                progress.status,
                progress.processed_groups,
                progress.total_groups,
                progress.succeeded,
                progress.insufficient,
                progress.failed,
                progress.skipped,
                progress.elapsed_secs
            ),
        );

        progress
    }

    /// One token-group unit; not counted when a stop was already requested
    async fn process_group(&self, group: &TokenGroup, now: i64) {
        if self.stop_requested() {
            return;
        }

        let unit_start = Instant::now();
        self.tracker.begin_unit(&group.token_id);

        let mut fetch_from = group.fetch_from;
        let mut incremental = group.incremental;
        let mut series = self.fetch_series(&group.token_id, fetch_from, now).await;
        if incremental && group.raises_any_peak(&series) {
            fetch_from = group.full_from;
            incremental = false;
            series = self.fetch_series(&group.token_id, fetch_from, now).await;
        }

        logger::debug(
            LogTag::Backfill,
            &format!(
                "{}: {} candles from {} ({}) for {} entries",
                group.token_id,
                series.len(),
                fetch_from,
                if incremental { "incremental" } else { "full" },
                group.entries.len()
            ),
        );

        let outcomes: Vec<EntryOutcome> = group
            .entries
            .iter()
            .map(|(entry, record)| self.process_entry(entry, record.as_ref(), &series, now))
            .collect();

        self.tracker.record_unit(
            &group.token_id,
            &outcomes,
            unit_start.elapsed().as_secs_f64(),
            self.settings.concurrency,
        );
    }

    async fn fetch_series(&self, token_id: &str, from: i64, now: i64) -> Vec<Candle> {
        let plan = plan_fetches(from, now, self.settings.max_candles_per_call);
        let mut batches: Vec<Vec<Candle>> = Vec::with_capacity(plan.len());
        for segment in &plan {
            batches.push(self.source.fetch_segment(token_id, segment).await);
        }
        merge_candle_series(batches)
    }

    fn process_entry(
        &self,
        entry: &TrackedEntry,
        existing: Option<&ExtremumRecord>,
        series: &[Candle],
        now: i64,
    ) -> EntryOutcome {
        let entry_price = match entry.require_entry_price() {
            Ok(price) => price,
            Err(e) => {
                logger::warning(LogTag::Backfill, &format!("Skipping entry: {}", e));
                return EntryOutcome::Skipped;
            }
        };

        if entry.status == TrackingStatus::Inactive && existing.is_some() {
            return EntryOutcome::Skipped;
        }

        let input = AccumulatorInput {
            entry_price,
            entry_time: entry.entry_time,
            current: None,
            supply: entry.supply(),
            candles: series,
            tolerance_secs: self.settings.tolerance_secs,
        };
        let fresh = accumulate(&input)
            .unwrap_or_else(|_| Extremum::trivial(entry_price, entry.entry_time));

        let record = merge_into_record(entry, entry_price, existing, &fresh, now);
        match self.store.upsert_extremum_record(&record) {
            Ok(()) if fresh.insufficient_data => EntryOutcome::Insufficient,
            Ok(()) => EntryOutcome::Succeeded,
            Err(e) => {
                logger::error(
                    LogTag::Backfill,
                    &format!("Failed to store record for entry {}: {}", entry.id, e),
                );
                EntryOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteStore;
    use crate::testing::{active_entry, candle, memory_store, ScriptedCandleSource, T0};

    fn settings() -> BackfillSettings {
        BackfillSettings {
            concurrency: 1,
            wave_delay: Duration::ZERO,
            stale_after_secs: 21_600,
            eta_window: 20,
            max_candles_per_call: 1000,
            tolerance_secs: 300,
        }
    }

    fn orchestrator(
        store: Arc<SqliteStore>,
        source: Arc<ScriptedCandleSource>,
    ) -> Arc<BackfillOrchestrator> {
        Arc::new(BackfillOrchestrator::new(store, source, settings()))
    }

    #[tokio::test]
    async fn test_backfill_computes_ath_for_each_entry() {
        let store = memory_store();
        let a = store.insert_entry(&active_entry("MintA", 1.0, T0)).unwrap();
        let b = store.insert_entry(&active_entry("MintA", 1.5, T0 + 60)).unwrap();
        let source = Arc::new(ScriptedCandleSource::new().with_candles(
            "MintA",
            vec![candle(T0 + 60, 2.0, 0.9), candle(T0 + 120, 1.5, 1.2)],
        ));

        let orch = orchestrator(store.clone(), source.clone());
        let progress = orch.run(BackfillOptions::default()).await.unwrap();

        assert_eq!(progress.status, BackfillStatus::Complete);
        assert_eq!(progress.total_groups, 1);
        assert_eq!(progress.succeeded, 2);
        assert_eq!(source.fetched_tokens(), vec!["MintA".to_string()]);

        let ra = store.get_extremum_record(a).unwrap().unwrap();
        assert_eq!(ra.ath_price, 2.0);
        assert_eq!(ra.ath_at, T0 + 60);
        assert!((ra.max_drawdown + 10.0).abs() < 1e-9);
        assert_eq!(ra.milestones.time_to_2x, Some(60));
        assert_eq!(ra.watermark, Some(T0 + 120));

        let rb = store.get_extremum_record(b).unwrap().unwrap();
        assert!((rb.ath_multiple - 2.0 / 1.5).abs() < 1e-9);
        assert_eq!(rb.time_to_ath, 0);
    }

    #[tokio::test]
    async fn test_missing_candles_store_trivial_record() {
        let store = memory_store();
        let id = store.insert_entry(&active_entry("NoPool", 0.25, T0)).unwrap();
        let orch = orchestrator(store.clone(), Arc::new(ScriptedCandleSource::new()));

        let progress = orch.run(BackfillOptions::default()).await.unwrap();
        assert_eq!(progress.insufficient, 1);

        let record = store.get_extremum_record(id).unwrap().unwrap();
        assert!(record.insufficient_data);
        assert_eq!(record.ath_price, 0.25);
        assert_eq!(record.ath_multiple, 1.0);

        // Not reselected unless asked for
        let again = orch.run(BackfillOptions::default()).await.unwrap();
        assert_eq!(again.total_entries, 0);
        let forced = orch
            .run(BackfillOptions {
                include_insufficient: true,
                ..BackfillOptions::default()
            })
            .await
            .unwrap();
        assert_eq!(forced.total_entries, 1);
    }

    #[tokio::test]
    async fn test_entry_without_price_is_skipped() {
        let store = memory_store();
        let mut broken = active_entry("MintB", 1.0, T0);
        broken.entry_price = None;
        let broken_id = store.insert_entry(&broken).unwrap();
        store.insert_entry(&active_entry("MintB", 1.0, T0)).unwrap();
        let source = Arc::new(
            ScriptedCandleSource::new().with_candles("MintB", vec![candle(T0 + 60, 3.0, 1.0)]),
        );

        let progress = orchestrator(store.clone(), source)
            .run(BackfillOptions::default())
            .await
            .unwrap();
        assert_eq!(progress.skipped, 1);
        assert_eq!(progress.succeeded, 1);
        assert_eq!(progress.status, BackfillStatus::Complete);
        assert!(store.get_extremum_record(broken_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stop_pauses_and_restart_resumes_remaining() {
        let store = memory_store();
        let mut source = ScriptedCandleSource::new();
        for token in ["T1", "T2", "T3"] {
            store.insert_entry(&active_entry(token, 1.0, T0)).unwrap();
            source = source.with_candles(token, vec![candle(T0 + 60, 2.0, 0.8)]);
        }
        let source = Arc::new(source);
        let orch = orchestrator(store.clone(), source.clone());

        let stop = orch.stop_handle();
        source.set_on_fetch(move |_| stop.stop());

        let first = orch.run(BackfillOptions::default()).await.unwrap();
        assert_eq!(first.status, BackfillStatus::Paused);
        assert_eq!(first.processed_groups, 1);
        assert_eq!(first.succeeded, 1);

        source.set_on_fetch(|_| {});
        let second = orch.run(BackfillOptions::default()).await.unwrap();
        assert_eq!(second.status, BackfillStatus::Complete);
        assert_eq!(second.total_groups, 2);
        assert_eq!(second.succeeded, 2);
        assert_eq!(source.fetched_tokens().len(), 3);
    }

    #[tokio::test]
    async fn test_second_start_rejected_while_running() {
        let store = memory_store();
        store.insert_entry(&active_entry("Slow", 1.0, T0)).unwrap();
        let source = Arc::new(ScriptedCandleSource::new());
        let orch = orchestrator(store, source);

        let handle = orch.start(BackfillOptions::default()).unwrap();
        let second = orch.start(BackfillOptions::default());
        assert!(matches!(second, Err(BackfillError::AlreadyRunning)));
        assert!(matches!(orch.reset(), Err(BackfillError::AlreadyRunning)));

        let done = handle.await.unwrap();
        assert_eq!(done.status, BackfillStatus::Complete);
        assert!(orch.reset().is_ok());
        assert_eq!(orch.get_progress().status, BackfillStatus::Idle);
    }

    #[tokio::test]
    async fn test_progress_persisted_and_reloaded() {
        let store = memory_store();
        store.insert_entry(&active_entry("MintP", 1.0, T0)).unwrap();
        let source = Arc::new(
            ScriptedCandleSource::new().with_candles("MintP", vec![candle(T0 + 60, 1.2, 1.0)]),
        );
        orchestrator(store.clone(), source.clone())
            .run(BackfillOptions::default())
            .await
            .unwrap();

        let reloaded = orchestrator(store, source);
        let progress = reloaded.get_progress();
        assert_eq!(progress.status, BackfillStatus::Complete);
        assert_eq!(progress.succeeded, 1);
    }

    async fn backfill_once(store: &Arc<SqliteStore>, candles: Vec<Candle>) {
        let source = Arc::new(ScriptedCandleSource::new().with_candles("MintI", candles));
        orchestrator(store.clone(), source)
            .run(BackfillOptions::default())
            .await
            .unwrap();
    }

    fn age_record(store: &SqliteStore, entry_id: i64) {
        let mut record = store.get_extremum_record(entry_id).unwrap().unwrap();
        record.updated_at = 0;
        store.upsert_extremum_record(&record).unwrap();
    }

    fn assert_incremental_selected(store: &Arc<SqliteStore>) {
        let orch = orchestrator(store.clone(), Arc::new(ScriptedCandleSource::new()));
        let selected = store
            .get_entries_needing_computation(
                &orch.filter_for(&BackfillOptions::default()),
                Utc::now().timestamp(),
            )
            .unwrap();
        let groups = group_by_token(selected, orch.settings.tolerance_secs, false);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].incremental);
    }

    fn early_history() -> Vec<Candle> {
        vec![
            candle(T0 + 60, 2.0, 0.9),
            candle(T0 + 120, 1.1, 0.3),
            candle(T0 + 180, 1.2, 1.0),
        ]
    }

    #[tokio::test]
    async fn test_stale_incremental_run_with_new_peak_matches_full_recompute() {
        let store = memory_store();
        let id = store.insert_entry(&active_entry("MintI", 1.0, T0)).unwrap();
        backfill_once(&store, early_history()).await;

        let first = store.get_extremum_record(id).unwrap().unwrap();
        assert_eq!(first.ath_price, 2.0);
        assert_eq!(first.min_low_price, 0.9);
        assert_eq!(first.watermark, Some(T0 + 180));

        age_record(&store, id);
        assert_incremental_selected(&store);

        let mut history = early_history();
        history.push(candle(T0 + 240, 4.0, 1.5));
        backfill_once(&store, history.clone()).await;
        let incremental = store.get_extremum_record(id).unwrap().unwrap();

        let full_store = memory_store();
        let full_id = full_store.insert_entry(&active_entry("MintI", 1.0, T0)).unwrap();
        backfill_once(&full_store, history).await;
        let full = full_store.get_extremum_record(full_id).unwrap().unwrap();

        assert_eq!(incremental.ath_price, 4.0);
        assert_eq!(incremental.ath_at, T0 + 240);
        assert_eq!(incremental.ath_at, full.ath_at);
        assert_eq!(incremental.min_low_price, 0.3);
        assert_eq!(incremental.min_low_price, full.min_low_price);
        assert_eq!(incremental.min_low_at, full.min_low_at);
        assert!((incremental.max_drawdown - full.max_drawdown).abs() < 1e-9);
        assert!((incremental.max_drawdown + 70.0).abs() < 1e-9);
        assert_eq!(incremental.watermark, Some(T0 + 240));
    }

    #[tokio::test]
    async fn test_stale_incremental_run_without_new_peak_extends_watermark() {
        let store = memory_store();
        let id = store.insert_entry(&active_entry("MintI", 1.0, T0)).unwrap();
        backfill_once(&store, early_history()).await;

        age_record(&store, id);
        assert_incremental_selected(&store);

        let mut history = early_history();
        history.push(candle(T0 + 240, 1.8, 0.1));
        backfill_once(&store, history.clone()).await;
        let incremental = store.get_extremum_record(id).unwrap().unwrap();

        let full_store = memory_store();
        let full_id = full_store.insert_entry(&active_entry("MintI", 1.0, T0)).unwrap();
        backfill_once(&full_store, history).await;
        let full = full_store.get_extremum_record(full_id).unwrap().unwrap();

        assert_eq!(incremental.ath_price, 2.0);
        assert_eq!(incremental.ath_at, T0 + 60);
        assert_eq!(incremental.min_low_price, full.min_low_price);
        assert!((incremental.max_drawdown - full.max_drawdown).abs() < 1e-9);
        assert!((incremental.max_drawdown + 10.0).abs() < 1e-9);
        assert_eq!(incremental.watermark, Some(T0 + 240));
        assert!(incremental.updated_at > 0);
    }

    #[tokio::test]
    async fn test_fresh_record_not_reselected_without_force() {
        let store = memory_store();
        let id = store.insert_entry(&active_entry("MintI", 1.0, T0)).unwrap();
        backfill_once(&store, vec![candle(T0 + 60, 2.0, 0.9)]).await;

        backfill_once(
            &store,
            vec![candle(T0 + 60, 2.0, 0.9), candle(T0 + 600, 4.0, 1.5)],
        )
        .await;
        let record = store.get_extremum_record(id).unwrap().unwrap();
        assert_eq!(record.ath_price, 2.0);

        let forced_source = Arc::new(ScriptedCandleSource::new().with_candles(
            "MintI",
            vec![candle(T0 + 60, 2.0, 0.9), candle(T0 + 600, 4.0, 1.5)],
        ));
        orchestrator(store.clone(), forced_source)
            .run(BackfillOptions {
                force: true,
                ..BackfillOptions::default()
            })
            .await
            .unwrap();
        let record = store.get_extremum_record(id).unwrap().unwrap();
        assert_eq!(record.ath_price, 4.0);
        assert_eq!(record.ath_at, T0 + 600);
        assert_eq!(record.watermark, Some(T0 + 600));
        assert!((record.max_drawdown + 10.0).abs() < 1e-9);
    }
}
