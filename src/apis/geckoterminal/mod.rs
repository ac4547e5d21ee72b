/// GeckoTerminal API client
///
/// API Documentation: https://www.geckoterminal.com/dex-api
///
/// Endpoints implemented:
/// 1. /networks/{network}/tokens/{token}/pools - Pools for a token (pool resolution)
/// 2. /networks/{network}/pools/{pool}/ohlcv/{timeframe} - OHLCV candles
pub mod types;

pub use self::types::GeckoTerminalPool;

use self::types::{GeckoTerminalOhlcvResponse, GeckoTerminalPoolsResponse};
use crate::apis::client::{build_http_client, get_json, ApiStats, ApiStatsTracker, RateLimiter};
use crate::errors::ApiError;
use crate::logger::{self, LogTag};
use crate::ohlcvs::{Candle, Timeframe};
use reqwest::Client;
use std::time::Duration;

const GECKOTERMINAL_BASE_URL: &str = "https://api.geckoterminal.com/api/v2";
const PROVIDER: &str = "geckoterminal";

/// Hard page size limit of the OHLCV endpoint
pub const MAX_OHLCV_LIMIT: u32 = 1000;

/// GeckoTerminal API client with rate limiting and stats tracking
pub struct GeckoTerminalClient {
    client: Client,
    base_url: String,
    network: String,
    rate_limiter: RateLimiter,
    stats: ApiStatsTracker,
}

impl GeckoTerminalClient {
    pub fn new(network: &str, rate_limit: usize, timeout: Duration) -> Result<Self, ApiError> {
        if timeout.is_zero() {
            return Err(ApiError::Disabled(
                "GeckoTerminal timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: GECKOTERMINAL_BASE_URL.to_string(),
            network: network.to_string(),
            rate_limiter: RateLimiter::new(rate_limit),
            stats: ApiStatsTracker::new(),
        })
    }

    pub async fn get_stats(&self) -> ApiStats {
        self.stats.get_stats().await
    }

    /// Fetch all pools for a token, most liquid first
    pub async fn fetch_pools(&self, mint: &str) -> Result<Vec<GeckoTerminalPool>, ApiError> {
        let url = format!(
            "{}/networks/{}/tokens/{}/pools",
            self.base_url, self.network, mint
        );

        logger::debug(
            LogTag::Api,
            &format!("[GECKOTERMINAL] Fetching pools: token={}, network={}", mint, self.network),
        );

        let response: GeckoTerminalPoolsResponse =
            get_json(PROVIDER, &self.rate_limiter, &self.stats, self.client.get(&url)).await?;

        let mut pools: Vec<GeckoTerminalPool> =
            response.data.iter().map(|p| p.to_pool()).collect();
        pools.sort_by(|a, b| b.reserve_usd.total_cmp(&a.reserve_usd));
        Ok(pools)
    }

    /// Fetch candles for `mint` from a pool, ending before `before_timestamp`
    ///
    /// Returns valid candles only, in provider order (newest first).
    pub async fn fetch_ohlcv(
        &self,
        pool_address: &str,
        mint: &str,
        timeframe: Timeframe,
        before_timestamp: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Candle>, ApiError> {
        let url = format!(
            "{}/networks/{}/pools/{}/ohlcv/{}",
            self.base_url,
            self.network,
            pool_address,
            timeframe.to_api_param()
        );

        let mut query: Vec<(&str, String)> = vec![
            ("aggregate", "1".to_string()),
            ("limit", limit.clamp(1, MAX_OHLCV_LIMIT).to_string()),
            ("currency", "usd".to_string()),
            ("token", mint.to_string()),
        ];
        if let Some(ts) = before_timestamp {
            query.push(("before_timestamp", ts.to_string()));
        }

        logger::debug(
            LogTag::Api,
            &format!(
                "[GECKOTERMINAL] Fetching OHLCV: pool={}, timeframe={}, before={:?}, limit={}",
                pool_address, timeframe, before_timestamp, limit
            ),
        );

        let response: GeckoTerminalOhlcvResponse = get_json(
            PROVIDER,
            &self.rate_limiter,
            &self.stats,
            self.client.get(&url).query(&query),
        )
        .await?;

        let rows = response.data.attributes.ohlcv_list;
        let total = rows.len();
        let candles: Vec<Candle> = rows.iter().filter_map(|row| Candle::from_row(row)).collect();
        if candles.len() < total {
            logger::debug(
                LogTag::Api,
                &format!(
                    "[GECKOTERMINAL] Dropped {} malformed rows for pool {}",
                    total - candles.len(),
                    pool_address
                ),
            );
        }
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::types::*;

    #[test]
    fn test_pools_payload_parses() {
        let body = r#"{
            "data": [{
                "id": "solana_Pool1",
                "type": "pool",
                "attributes": { "address": "Pool1", "name": "BONK / SOL", "reserve_in_usd": "1523.5" },
                "relationships": { "dex": { "data": { "id": "raydium", "type": "dex" } } }
            }]
        }"#;
        let parsed: GeckoTerminalPoolsResponse = serde_json::from_str(body).unwrap();
        let pool = parsed.data[0].to_pool();
        assert_eq!(pool.pool_address, "Pool1");
        assert_eq!(pool.dex_id, "raydium");
        assert!((pool.reserve_usd - 1523.5).abs() < 1e-9);
    }

    #[test]
    fn test_ohlcv_payload_keeps_loose_rows() {
        let body = r#"{
            "data": { "id": "x", "type": "ohlcv_request_response",
              "attributes": { "ohlcv_list": [[1700000060, 1.0, 2.0, 0.9, 1.5, 100.0], [1700000000, 1.0]] } },
            "meta": {}
        }"#;
        let parsed: GeckoTerminalOhlcvResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.attributes.ohlcv_list.len(), 2);
    }
}
