// Production candle source: pool resolution with provider fallback and a
// per-process pool cache, candle pages from GeckoTerminal.

use crate::apis::resilient::{with_retry, RetryPolicy};
use crate::apis::{ApiStats, DexScreenerClient, GeckoTerminalClient};
use crate::config::OhlcvConfig;
use crate::errors::ApiError;
use crate::logger::{self, LogTag};
use crate::ohlcvs::fetcher::{normalize_candles, CandleSource};
use crate::ohlcvs::types::{Candle, PoolRef, PoolSource, Timeframe};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub struct OhlcvManager {
    gecko: GeckoTerminalClient,
    dexscreener: Arc<DexScreenerClient>,
    retry: RetryPolicy,
    fallback_enabled: bool,
    max_candles_per_call: u32,
    pools: RwLock<HashMap<String, PoolRef>>,
}

impl OhlcvManager {
    pub fn new(
        config: &OhlcvConfig,
        dexscreener: Arc<DexScreenerClient>,
        retry: RetryPolicy,
    ) -> Result<Self, ApiError> {
        let gecko = GeckoTerminalClient::new(
            &config.network,
            config.geckoterminal_rate_limit_per_minute as usize,
            Duration::from_secs(config.request_timeout_secs),
        )?;

        Ok(Self {
            gecko,
            dexscreener,
            retry,
            fallback_enabled: config.pool_fallback_enabled,
            max_candles_per_call: config.max_candles_per_call.max(1),
            pools: RwLock::new(HashMap::new()),
        })
    }

    /// Request counters per provider since startup
    pub async fn provider_stats(&self) -> Vec<(&'static str, ApiStats)> {
        vec![
            ("geckoterminal", self.gecko.get_stats().await),
            ("dexscreener", self.dexscreener.get_stats().await),
        ]
    }

    async fn resolve_from_geckoterminal(&self, mint: &str) -> Result<Option<PoolRef>, ApiError> {
        let pools = with_retry(&self.retry, &format!("geckoterminal pools {}", mint), || {
            self.gecko.fetch_pools(mint)
        })
        .await?;

        Ok(pools.into_iter().next().map(|p| PoolRef {
            address: p.pool_address,
            dex: p.dex_id,
            liquidity_usd: p.reserve_usd,
            source: PoolSource::GeckoTerminal,
        }))
    }

    async fn resolve_from_dexscreener(&self, mint: &str) -> Result<Option<PoolRef>, ApiError> {
        let pools = with_retry(&self.retry, &format!("dexscreener pools {}", mint), || {
            self.dexscreener.fetch_token_pools(mint)
        })
        .await?;

        Ok(pools
            .into_iter()
            .find(|p| !p.pair_address.is_empty())
            .map(|p| PoolRef {
                address: p.pair_address,
                dex: p.dex_id,
                liquidity_usd: p.liquidity_usd,
                source: PoolSource::DexScreener,
            }))
    }
}

#[async_trait]
impl CandleSource for OhlcvManager {
    async fn resolve_pool(&self, token_id: &str) -> Option<PoolRef> {
        if let Some(pool) = self.pools.read().await.get(token_id) {
            return Some(pool.clone());
        }

        let primary = match self.resolve_from_geckoterminal(token_id).await {
            Ok(pool) => pool,
            Err(e) => {
                logger::warning(
                    LogTag::Ohlcv,
                    &format!("GeckoTerminal pool lookup failed for {}: {}", token_id, e),
                );
                None
            }
        };

        let resolved = match primary {
            Some(pool) => Some(pool),
            None if self.fallback_enabled => match self.resolve_from_dexscreener(token_id).await {
                Ok(pool) => pool,
                Err(e) => {
                    logger::warning(
                        LogTag::Ohlcv,
                        &format!("DexScreener pool lookup failed for {}: {}", token_id, e),
                    );
                    None
                }
            },
            None => None,
        };

        match &resolved {
            Some(pool) => {
                logger::debug(
                    LogTag::Ohlcv,
                    &format!(
                        "Resolved pool {} ({}, {}, ${:.0}) for {}",
                        pool.address, pool.dex, pool.source, pool.liquidity_usd, token_id
                    ),
                );
                self.pools
                    .write()
                    .await
                    .insert(token_id.to_string(), pool.clone());
            }
            None => {
                logger::info(LogTag::Ohlcv, &format!("No pool found for {}", token_id));
            }
        }
        resolved
    }

    async fn fetch_candles(
        &self,
        token_id: &str,
        timeframe: Timeframe,
        before: Option<i64>,
        limit: u32,
    ) -> Vec<Candle> {
        let Some(pool) = self.resolve_pool(token_id).await else {
            return Vec::new();
        };
        let limit = limit.clamp(1, self.max_candles_per_call);

        let label = format!("ohlcv {} {} before={:?}", token_id, timeframe, before);
        let result = with_retry(&self.retry, &label, || {
            self.gecko
                .fetch_ohlcv(&pool.address, token_id, timeframe, before, limit)
        })
        .await;

        match result {
            Ok(candles) => {
                let candles = normalize_candles(candles);
                logger::debug(
                    LogTag::Ohlcv,
                    &format!("Fetched {} {} candles for {}", candles.len(), timeframe, token_id),
                );
                candles
            }
            Err(e) => {
                logger::warning(
                    LogTag::Ohlcv,
                    &format!("Candle fetch failed for {} ({}): {}", token_id, timeframe, e),
                );
                Vec::new()
            }
        }
    }
}
