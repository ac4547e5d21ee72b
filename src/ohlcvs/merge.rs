// Merge candle batches from several segments into one ascending series

use crate::ohlcvs::types::Candle;
use std::collections::BTreeMap;

const MINUTE: i64 = 60;

/// Timestamp rounded to the nearest minute (half rounds up)
pub fn minute_key(timestamp: i64) -> i64 {
    (timestamp + MINUTE / 2).div_euclid(MINUTE) * MINUTE
}

/// Combine batches in fetch order; candles landing on the same rounded
/// minute are deduplicated and the later-fetched one wins.
pub fn merge_candle_series<I>(batches: I) -> Vec<Candle>
where
    I: IntoIterator<Item = Vec<Candle>>,
{
    let mut by_minute: BTreeMap<i64, Candle> = BTreeMap::new();
    for batch in batches {
        for candle in batch {
            if candle.is_valid() {
                by_minute.insert(minute_key(candle.timestamp), candle);
            }
        }
    }
    by_minute.into_values().collect()
}
