/// DexScreener API client
///
/// API Documentation: https://docs.dexscreener.com/api/reference
///
/// Endpoints implemented:
/// 1. /token-pairs/v1/{chainId}/{tokenAddress} - All pairs for a token (pool fallback)
/// 2. /tokens/v1/{chainId}/{tokenAddresses} - Pairs for up to 30 tokens (batched prices)
pub mod types;

pub use self::types::DexScreenerPool;

use self::types::DexScreenerPairRaw;
use crate::apis::client::{build_http_client, get_json, ApiStats, ApiStatsTracker, RateLimiter};
use crate::errors::ApiError;
use crate::logger::{self, LogTag};
use reqwest::Client;
use std::time::Duration;

const DEXSCREENER_BASE_URL: &str = "https://api.dexscreener.com";
const PROVIDER: &str = "dexscreener";

/// Maximum addresses accepted by the batch endpoint
pub const MAX_TOKENS_PER_REQUEST: usize = 30;

pub const RATE_LIMIT_TOKEN_POOLS_PER_MINUTE: usize = 300;
pub const RATE_LIMIT_TOKEN_BATCH_PER_MINUTE: usize = 300;

pub struct DexScreenerClient {
    client: Client,
    base_url: String,
    chain_id: String,
    stats: ApiStatsTracker,
    limiter_token_pools: RateLimiter,
    limiter_token_batch: RateLimiter,
}

impl DexScreenerClient {
    pub fn new(chain_id: &str, timeout: Duration) -> Result<Self, ApiError> {
        if timeout.is_zero() {
            return Err(ApiError::Disabled(
                "DexScreener timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: DEXSCREENER_BASE_URL.to_string(),
            chain_id: chain_id.to_string(),
            stats: ApiStatsTracker::new(),
            limiter_token_pools: RateLimiter::new(RATE_LIMIT_TOKEN_POOLS_PER_MINUTE),
            limiter_token_batch: RateLimiter::new(RATE_LIMIT_TOKEN_BATCH_PER_MINUTE),
        })
    }

    pub async fn get_stats(&self) -> ApiStats {
        self.stats.get_stats().await
    }

    /// Fetch all pairs for a single token, most liquid first
    pub async fn fetch_token_pools(&self, mint: &str) -> Result<Vec<DexScreenerPool>, ApiError> {
        let url = format!("{}/token-pairs/v1/{}/{}", self.base_url, self.chain_id, mint);

        logger::debug(
            LogTag::Api,
            &format!("[DEXSCREENER] Fetching token pools: token={}, chain={}", mint, self.chain_id),
        );

        let pairs: Vec<DexScreenerPairRaw> = get_json(
            PROVIDER,
            &self.limiter_token_pools,
            &self.stats,
            self.client.get(&url),
        )
        .await?;

        let mut pools: Vec<DexScreenerPool> = pairs.iter().map(|p| p.to_pool()).collect();
        pools.sort_by(|a, b| b.liquidity_usd.total_cmp(&a.liquidity_usd));
        Ok(pools)
    }

    /// Fetch pairs for up to 30 tokens in one call
    pub async fn fetch_token_batch(
        &self,
        addresses: &[String],
    ) -> Result<Vec<DexScreenerPool>, ApiError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        if addresses.len() > MAX_TOKENS_PER_REQUEST {
            return Err(ApiError::Parse(format!(
                "Too many addresses: {} (max {})",
                addresses.len(),
                MAX_TOKENS_PER_REQUEST
            )));
        }

        let url = format!(
            "{}/tokens/v1/{}/{}",
            self.base_url,
            self.chain_id,
            addresses.join(",")
        );

        logger::debug(
            LogTag::Api,
            &format!("[DEXSCREENER] Fetching batch tokens: {} addresses", addresses.len()),
        );

        let pairs: Vec<DexScreenerPairRaw> = get_json(
            PROVIDER,
            &self.limiter_token_batch,
            &self.stats,
            self.client.get(&url),
        )
        .await?;

        Ok(pairs.iter().map(|p| p.to_pool()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::types::*;

    #[test]
    fn test_pair_payload_parses() {
        let body = r#"[{
            "chainId": "solana", "dexId": "raydium", "pairAddress": "PairA",
            "baseToken": { "address": "MintA", "symbol": "AAA" },
            "quoteToken": { "address": "So11111111111111111111111111111111111111112", "symbol": "SOL" },
            "priceUsd": "0.00123", "liquidity": { "usd": 5400.5 }, "marketCap": 120000
        }]"#;
        let pairs: Vec<DexScreenerPairRaw> = serde_json::from_str(body).unwrap();
        let pool = pairs[0].to_pool();
        assert_eq!(pool.pair_address, "PairA");
        assert_eq!(pool.base_token_address, "MintA");
        assert_eq!(pool.price_usd, Some(0.00123));
        assert!((pool.liquidity_usd - 5400.5).abs() < 1e-9);
    }

    #[test]
    fn test_bad_price_is_none() {
        let body = r#"[{ "pairAddress": "PairB", "priceUsd": "n/a" }]"#;
        let pairs: Vec<DexScreenerPairRaw> = serde_json::from_str(body).unwrap();
        assert_eq!(pairs[0].to_pool().price_usd, None);
    }
}
