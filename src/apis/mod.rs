//! External HTTP providers
//!
//! - `geckoterminal`: pool lookup and OHLCV candles (primary)
//! - `dexscreener`: pool fallback and batched current prices
//! - `resilient`: the retry wrapper every call goes through

pub mod client;
pub mod dexscreener;
pub mod geckoterminal;
pub mod resilient;

pub use client::{ApiStats, RateLimiter};
pub use dexscreener::DexScreenerClient;
pub use geckoterminal::GeckoTerminalClient;
pub use resilient::{with_retry, RetryPolicy};
