//! Price extremum engine: ATH, drawdown-before-ATH, and milestone timings

pub mod accumulator;
pub mod merge;
pub mod types;

pub use accumulator::accumulate;
pub use merge::merge_into_record;
pub use types::{
    drawdown_pct, AccumulatorInput, Extremum, ExtremumRecord, InsufficientData, Milestones,
    PricePoint, DEFAULT_TOLERANCE_SECS, MILESTONE_MULTIPLES,
};
