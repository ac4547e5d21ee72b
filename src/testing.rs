//! Scripted fakes shared by unit tests. No network, no disk unless asked.

use crate::database::SqliteStore;
use crate::entries::{NewEntry, TrackingStatus};
use crate::ohlcvs::{Candle, CandleSource, PoolRef, PoolSource, Timeframe};
use crate::prices::PriceOracle;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub const T0: i64 = 1_700_000_000;

type FetchHook = Box<dyn Fn(&str) + Send + Sync>;

/// Candle source backed by a fixed per-token history
///
/// Returns every scripted candle before `before`, ignoring the timeframe and
/// limit, so planned segments see exactly the scripted candles in range.
#[derive(Default)]
pub struct ScriptedCandleSource {
    histories: HashMap<String, Vec<Candle>>,
    calls: Mutex<Vec<String>>,
    on_fetch: Mutex<Option<FetchHook>>,
}

impl ScriptedCandleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candles(mut self, token_id: &str, candles: Vec<Candle>) -> Self {
        self.histories.insert(token_id.to_string(), candles);
        self
    }

    /// Called with the token id on every candle fetch
    pub fn set_on_fetch<F>(&self, hook: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.on_fetch.lock() = Some(Box::new(hook));
    }

    /// Distinct tokens fetched, in first-fetch order
    pub fn fetched_tokens(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for token in self.calls.lock().iter() {
            if !seen.contains(token) {
                seen.push(token.clone());
            }
        }
        seen
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl CandleSource for ScriptedCandleSource {
    async fn resolve_pool(&self, token_id: &str) -> Option<PoolRef> {
        self.histories.get(token_id).map(|_| PoolRef {
            address: format!("pool-{}", token_id),
            dex: "raydium".to_string(),
            liquidity_usd: 10_000.0,
            source: PoolSource::GeckoTerminal,
        })
    }

    async fn fetch_candles(
        &self,
        token_id: &str,
        _timeframe: Timeframe,
        before: Option<i64>,
        _limit: u32,
    ) -> Vec<Candle> {
        self.calls.lock().push(token_id.to_string());
        if let Some(hook) = self.on_fetch.lock().as_ref() {
            hook(token_id);
        }

        self.histories
            .get(token_id)
            .map(|candles| {
                candles
                    .iter()
                    .filter(|c| before.map_or(true, |b| c.timestamp < b))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Price oracle returning a fixed table
#[derive(Default)]
pub struct FixedPriceOracle {
    prices: Mutex<HashMap<String, f64>>,
    lookups: Mutex<usize>,
}

impl FixedPriceOracle {
    pub fn new(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: Mutex::new(prices.iter().map(|(t, p)| (t.to_string(), *p)).collect()),
            lookups: Mutex::new(0),
        }
    }

    pub fn set_price(&self, token_id: &str, price: f64) {
        self.prices.lock().insert(token_id.to_string(), price);
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock()
    }
}

#[async_trait]
impl PriceOracle for FixedPriceOracle {
    async fn fetch_current_prices(&self, token_ids: &[String]) -> HashMap<String, Option<f64>> {
        *self.lookups.lock() += 1;
        let prices = self.prices.lock();
        token_ids
            .iter()
            .map(|t| (t.clone(), prices.get(t).copied()))
            .collect()
    }
}

pub fn memory_store() -> Arc<SqliteStore> {
    match SqliteStore::open_in_memory() {
        Ok(store) => Arc::new(store),
        Err(e) => panic!("in-memory store: {}", e),
    }
}

pub fn active_entry(token: &str, price: f64, at: i64) -> NewEntry {
    NewEntry {
        token_id: token.to_string(),
        entry_price: Some(price),
        entry_supply: Some(1_000_000.0),
        entry_market_cap: None,
        entry_time: at,
        status: TrackingStatus::Active,
    }
}

/// Minute candle with open = close = low
pub fn candle(ts: i64, high: f64, low: f64) -> Candle {
    Candle::new(ts, low, high, low, low, 10.0)
}
