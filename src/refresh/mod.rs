//! Live ATH refresh from current prices
//!
//! Between backfills, peaks are kept current by comparing each Active
//! entry's stored ATH with the token's live price. Candles are never fetched
//! here and the candle watermark never moves.

use crate::backfill::BackfillStatus;
use crate::database::ExtremumStore;
use crate::entries::{TrackedEntry, TrackingStatus};
use crate::extremum::{
    accumulate, merge_into_record, AccumulatorInput, ExtremumRecord, PricePoint,
};
use crate::logger::{self, LogTag};
use crate::prices::PriceOracle;
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{interval, Duration, MissedTickBehavior};

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// A previous cycle is still in flight
    AlreadyRunning,
    /// The backfill has not completed yet
    BackfillNotComplete(Option<BackfillStatus>),
    Store(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyRunning => write!(f, "previous cycle still running"),
            SkipReason::BackfillNotComplete(Some(status)) => {
                write!(f, "backfill is {}", status)
            }
            SkipReason::BackfillNotComplete(None) => write!(f, "backfill never ran"),
            SkipReason::Store(message) => write!(f, "store unavailable: {}", message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub entries: usize,
    pub tokens: usize,
    pub prices_found: usize,
    pub raised: usize,
    pub created: usize,
    pub unchanged: usize,
    pub no_price: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Skipped(SkipReason),
    Completed(RefreshStats),
}

/// Clears the in-flight flag when a cycle ends, however it ends
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct RefreshLoop {
    store: Arc<dyn ExtremumStore>,
    oracle: Arc<dyn PriceOracle>,
    tolerance_secs: i64,
    in_flight: AtomicBool,
}

impl RefreshLoop {
    pub fn new(
        store: Arc<dyn ExtremumStore>,
        oracle: Arc<dyn PriceOracle>,
        tolerance_secs: i64,
    ) -> Self {
        Self {
            store,
            oracle,
            tolerance_secs,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Tick every `period` until `shutdown` fires; late ticks are dropped
    pub async fn run(self: Arc<Self>, period: Duration, shutdown: Arc<Notify>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        logger::info(
            LogTag::Refresh,
            &format!("Live refresh started (every {}s)", period.as_secs()),
        );

        // Registered up front so a shutdown sent mid-cycle is not lost
        let stopped = shutdown.notified();
        tokio::pin!(stopped);
        stopped.as_mut().enable();

        loop {
            tokio::select! {
                _ = &mut stopped => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = &mut stopped => break,
                        outcome = self.run_cycle() => {
                            if let RefreshOutcome::Skipped(reason) = outcome {
                                logger::debug(LogTag::Refresh, &format!("Cycle skipped: {}", reason));
                            }
                        }
                    }
                }
            }
        }

        logger::info(LogTag::Refresh, "Live refresh stopped");
    }

    pub async fn run_cycle(&self) -> RefreshOutcome {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return RefreshOutcome::Skipped(SkipReason::AlreadyRunning);
        }
        let _guard = CycleGuard(&self.in_flight);

        match self.store.load_backfill_progress() {
            Ok(Some(progress)) if progress.status == BackfillStatus::Complete => {}
            Ok(progress) => {
                return RefreshOutcome::Skipped(SkipReason::BackfillNotComplete(
                    progress.map(|p| p.status),
                ))
            }
            Err(e) => return RefreshOutcome::Skipped(SkipReason::Store(e.to_string())),
        }

        let rows = match self.store.get_active_entries_with_records() {
            Ok(rows) => rows,
            Err(e) => return RefreshOutcome::Skipped(SkipReason::Store(e.to_string())),
        };

        let mut seen = HashSet::new();
        let tokens: Vec<String> = rows
            .iter()
            .filter(|(entry, _)| seen.insert(entry.token_id.clone()))
            .map(|(entry, _)| entry.token_id.clone())
            .collect();

        let mut stats = RefreshStats {
            entries: rows.len(),
            tokens: tokens.len(),
            ..RefreshStats::default()
        };
        if tokens.is_empty() {
            return RefreshOutcome::Completed(stats);
        }

        let prices = self.oracle.fetch_current_prices(&tokens).await;
        stats.prices_found = prices.values().filter(|p| p.is_some()).count();
        let now = Utc::now().timestamp();

        for (entry, record) in &rows {
            let Some(price) = prices.get(&entry.token_id).copied().flatten() else {
                stats.no_price += 1;
                continue;
            };
            self.apply_price(entry, record.as_ref(), price, now, &mut stats);
        }

        if stats.raised > 0 || stats.created > 0 || stats.failed > 0 {
            logger::info(
                LogTag::Refresh,
                &format!(
                    "Refresh: {} raised, {} created, {} unchanged, {} without price, {} failed",
                    stats.raised, stats.created, stats.unchanged, stats.no_price, stats.failed
                ),
            );
        }

        RefreshOutcome::Completed(stats)
    }

    fn apply_price(
        &self,
        entry: &TrackedEntry,
        existing: Option<&ExtremumRecord>,
        price: f64,
        now: i64,
        stats: &mut RefreshStats,
    ) {
        if entry.status != TrackingStatus::Active {
            stats.skipped += 1;
            return;
        }
        let entry_price = match entry.require_entry_price() {
            Ok(p) => p,
            Err(_) => {
                stats.skipped += 1;
                return;
            }
        };
        if matches!(existing, Some(r) if r.ath_price >= price) {
            stats.unchanged += 1;
            return;
        }

        let input = AccumulatorInput {
            entry_price,
            entry_time: entry.entry_time,
            current: Some(PricePoint::new(price, now)),
            supply: entry.supply(),
            candles: &[],
            tolerance_secs: self.tolerance_secs,
        };
        let Ok(fresh) = accumulate(&input) else {
            stats.skipped += 1;
            return;
        };

        let mut record = merge_into_record(entry, entry_price, existing, &fresh, now);
        if let Some(old) = existing {
            // Staleness tracks the last candle pass, not live raises
            record.updated_at = old.updated_at;
        }

        match self.store.upsert_extremum_record(&record) {
            Ok(()) => {
                logger::debug(
                    LogTag::Refresh,
                    &format!(
                        "{} entry {}: ath {} -> {} ({:.2}x)",
                        entry.token_id,
                        entry.id,
                        existing.map_or(entry_price, |r| r.ath_price),
                        record.ath_price,
                        record.ath_multiple
                    ),
                );
                if existing.is_some() {
                    stats.raised += 1;
                } else {
                    stats.created += 1;
                }
            }
            Err(e) => {
                logger::error(
                    LogTag::Refresh,
                    &format!("Failed to store refreshed record for entry {}: {}", entry.id, e),
                );
                stats.failed += 1;
            }
        }
    }
}
