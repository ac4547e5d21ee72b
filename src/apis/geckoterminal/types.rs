//! GeckoTerminal response payloads (JSON:API style)

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct GeckoTerminalPoolsResponse {
    #[serde(default)]
    pub data: Vec<GeckoTerminalPoolData>,
}

#[derive(Debug, Deserialize)]
pub struct GeckoTerminalPoolData {
    pub attributes: GeckoTerminalPoolAttributes,
    #[serde(default)]
    pub relationships: Option<GeckoTerminalRelationships>,
}

#[derive(Debug, Deserialize)]
pub struct GeckoTerminalPoolAttributes {
    pub address: String,
    /// Decimal string, e.g. "123456.78"
    #[serde(default)]
    pub reserve_in_usd: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeckoTerminalRelationships {
    #[serde(default)]
    pub dex: Option<GeckoTerminalRelation>,
}

#[derive(Debug, Deserialize)]
pub struct GeckoTerminalRelation {
    pub data: Option<GeckoTerminalRelationData>,
}

#[derive(Debug, Deserialize)]
pub struct GeckoTerminalRelationData {
    pub id: String,
}

/// Normalized pool summary
#[derive(Debug, Clone, PartialEq)]
pub struct GeckoTerminalPool {
    pub pool_address: String,
    pub dex_id: String,
    pub reserve_usd: f64,
}

impl GeckoTerminalPoolData {
    pub fn to_pool(&self) -> GeckoTerminalPool {
        let dex_id = self
            .relationships
            .as_ref()
            .and_then(|r| r.dex.as_ref())
            .and_then(|d| d.data.as_ref())
            .map(|d| d.id.clone())
            .unwrap_or_default();

        GeckoTerminalPool {
            pool_address: self.attributes.address.clone(),
            dex_id,
            reserve_usd: self
                .attributes
                .reserve_in_usd
                .as_deref()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GeckoTerminalOhlcvResponse {
    pub data: GeckoTerminalOhlcvData,
}

#[derive(Debug, Deserialize)]
pub struct GeckoTerminalOhlcvData {
    pub attributes: GeckoTerminalOhlcvAttributes,
}

#[derive(Debug, Deserialize)]
pub struct GeckoTerminalOhlcvAttributes {
    /// Rows of `[timestamp, open, high, low, close, volume]`, newest first.
    /// Kept loose so a single malformed row does not fail the whole page.
    #[serde(default)]
    pub ohlcv_list: Vec<Vec<serde_json::Value>>,
}
