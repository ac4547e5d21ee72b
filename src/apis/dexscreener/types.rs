//! DexScreener response payloads

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexScreenerPairRaw {
    pub dex_id: Option<String>,
    pub pair_address: Option<String>,
    pub base_token: Option<DexScreenerTokenRaw>,
    pub price_usd: Option<String>,
    pub liquidity: Option<DexScreenerLiquidityRaw>,
}

#[derive(Debug, Deserialize)]
pub struct DexScreenerTokenRaw {
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DexScreenerLiquidityRaw {
    pub usd: Option<f64>,
}

/// Normalized pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DexScreenerPool {
    pub pair_address: String,
    pub dex_id: String,
    pub base_token_address: String,
    pub price_usd: Option<f64>,
    pub liquidity_usd: f64,
}

impl DexScreenerPairRaw {
    pub fn to_pool(&self) -> DexScreenerPool {
        let mut pool = DexScreenerPool::default();

        if let Some(ref base) = self.base_token {
            pool.base_token_address = base.address.clone().unwrap_or_default();
        }

        pool.pair_address = self.pair_address.clone().unwrap_or_default();
        pool.dex_id = self.dex_id.clone().unwrap_or_default();
        pool.price_usd = self
            .price_usd
            .as_deref()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|p| p.is_finite() && *p > 0.0);
        pool.liquidity_usd = self
            .liquidity
            .as_ref()
            .and_then(|l| l.usd)
            .filter(|v| v.is_finite())
            .unwrap_or(0.0);
        pool
    }
}
