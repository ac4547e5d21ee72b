//! Current price lookup for the live refresh

use crate::apis::dexscreener::{DexScreenerClient, DexScreenerPool, MAX_TOKENS_PER_REQUEST};
use crate::apis::resilient::{with_retry, RetryPolicy};
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Batched current-price provider; unknown prices map to None
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn fetch_current_prices(&self, token_ids: &[String]) -> HashMap<String, Option<f64>>;
}

pub struct DexScreenerPriceOracle {
    client: Arc<DexScreenerClient>,
    retry: RetryPolicy,
    batch_size: usize,
}

impl DexScreenerPriceOracle {
    pub fn new(client: Arc<DexScreenerClient>, retry: RetryPolicy, batch_size: usize) -> Self {
        Self {
            client,
            retry,
            batch_size: batch_size.clamp(1, MAX_TOKENS_PER_REQUEST),
        }
    }
}

/// Price of each token from its most liquid pair where it is the base token
pub fn best_prices(pools: &[DexScreenerPool]) -> HashMap<String, f64> {
    let mut best: HashMap<String, (f64, f64)> = HashMap::new();
    for pool in pools {
        let Some(price) = pool.price_usd else {
            continue;
        };
        let slot = best
            .entry(pool.base_token_address.clone())
            .or_insert((pool.liquidity_usd, price));
        if pool.liquidity_usd > slot.0 {
            *slot = (pool.liquidity_usd, price);
        }
    }
    best.into_iter().map(|(k, (_, price))| (k, price)).collect()
}

#[async_trait]
impl PriceOracle for DexScreenerPriceOracle {
    async fn fetch_current_prices(&self, token_ids: &[String]) -> HashMap<String, Option<f64>> {
        let mut result: HashMap<String, Option<f64>> =
            token_ids.iter().map(|t| (t.clone(), None)).collect();

        for batch in token_ids.chunks(self.batch_size) {
            let label = format!("dexscreener prices ({} tokens)", batch.len());
            match with_retry(&self.retry, &label, || self.client.fetch_token_batch(batch)).await {
                Ok(pools) => {
                    for (token, price) in best_prices(&pools) {
                        if let Some(slot) = result.get_mut(&token) {
                            *slot = Some(price);
                        }
                    }
                }
                Err(e) => {
                    logger::warning(
                        LogTag::Prices,
                        &format!("Price batch of {} tokens failed: {}", batch.len(), e),
                    );
                }
            }
        }

        let known = result.values().filter(|p| p.is_some()).count();
        logger::debug(
            LogTag::Prices,
            &format!("Fetched prices for {}/{} tokens", known, token_ids.len()),
        );
        result
    }
}
