//! callscope: historical price-extremum engine for tracked token calls
//!
//! For every tracked entry (a token called at a price and time) callscope
//! computes the all-time high reached since the call, the worst drawdown on
//! the way there and the time-to-multiple milestones, backfilling from
//! historical candles and keeping peaks current from live prices.

pub mod apis;
pub mod backfill;
pub mod config;
pub mod database;
pub mod entries;
pub mod errors;
pub mod extremum;
pub mod logger;
pub mod ohlcvs;
pub mod paths;
pub mod prices;
pub mod refresh;
pub mod services;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;
