//! Backfill of ATH / drawdown statistics from historical candles
//!
//! Selection groups entries by token, each group is fetched once through the
//! planner and candle source, then every entry in it is accumulated and merged
//! into its stored record. Runs are resumable: a paused run picks up exactly
//! the entries that are still incomplete.

pub mod orchestrator;
pub mod progress;
pub mod selection;

pub use orchestrator::{BackfillOptions, BackfillOrchestrator, BackfillSettings, StopHandle};
pub use progress::{BackfillPhase, BackfillProgress, BackfillStatus, EntryOutcome, ProgressTracker};
pub use selection::{group_by_token, TokenGroup};
