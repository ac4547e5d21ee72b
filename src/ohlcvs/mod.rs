// Candle data: types, fetch planning, provider access, and series merging

pub mod fetcher;
pub mod manager;
pub mod merge;
pub mod planner;
pub mod types;

pub use fetcher::CandleSource;
pub use manager::OhlcvManager;
pub use merge::merge_candle_series;
pub use planner::plan_fetches;
pub use types::{Candle, FetchSegment, PoolRef, PoolSource, Timeframe};
