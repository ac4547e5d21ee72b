// Candle source abstraction used by the backfill

use crate::ohlcvs::types::{Candle, FetchSegment, PoolRef, Timeframe};
use async_trait::async_trait;

/// Provider of historical candles for a token
///
/// Implementations never fail outward: a missing pool or exhausted retries
/// yields an empty vector and the caller degrades to what it already knows.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Most liquid pool for the token, if any provider knows one
    async fn resolve_pool(&self, token_id: &str) -> Option<PoolRef>;

    /// Up to `limit` candles ending before `before` (latest when None), ascending
    async fn fetch_candles(
        &self,
        token_id: &str,
        timeframe: Timeframe,
        before: Option<i64>,
        limit: u32,
    ) -> Vec<Candle>;

    /// Candles covering one planned segment, restricted to `[range_start, range_end)`
    async fn fetch_segment(&self, token_id: &str, segment: &FetchSegment) -> Vec<Candle> {
        let candles = self
            .fetch_candles(
                token_id,
                segment.timeframe,
                Some(segment.range_end),
                segment.limit,
            )
            .await;

        candles
            .into_iter()
            .filter(|c| c.timestamp >= segment.range_start && c.timestamp < segment.range_end)
            .collect()
    }
}

/// Drop invalid candles and sort ascending by timestamp
pub fn normalize_candles(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.retain(|c| c.is_valid());
    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);
    candles
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSource {
        candles: Vec<Candle>,
        calls: Mutex<Vec<(Timeframe, Option<i64>, u32)>>,
    }

    #[async_trait]
    impl CandleSource for RecordingSource {
        async fn resolve_pool(&self, _token_id: &str) -> Option<PoolRef> {
            None
        }

        async fn fetch_candles(
            &self,
            _token_id: &str,
            timeframe: Timeframe,
            before: Option<i64>,
            limit: u32,
        ) -> Vec<Candle> {
            self.calls.lock().unwrap().push((timeframe, before, limit));
            self.candles.clone()
        }
    }

    #[tokio::test]
    async fn test_fetch_segment_clips_to_range() {
        let source = RecordingSource {
            candles: vec![
                Candle::new(100, 1.0, 1.0, 1.0, 1.0, 0.0),
                Candle::new(160, 1.0, 1.0, 1.0, 1.0, 0.0),
                Candle::new(220, 1.0, 1.0, 1.0, 1.0, 0.0),
            ],
            calls: Mutex::new(Vec::new()),
        };
        let segment = FetchSegment {
            timeframe: Timeframe::Minute1,
            range_start: 120,
            range_end: 220,
            limit: 2,
        };

        let candles = source.fetch_segment("mint", &segment).await;
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].timestamp, 160);
        assert_eq!(
            source.calls.lock().unwrap().as_slice(),
            &[(Timeframe::Minute1, Some(220), 2)]
        );
    }

    #[test]
    fn test_normalize_sorts_and_filters() {
        let candles = normalize_candles(vec![
            Candle::new(300, 1.0, 2.0, 0.5, 1.0, 0.0),
            Candle::new(100, 1.0, 0.5, 2.0, 1.0, 0.0),
            Candle::new(200, 1.0, 2.0, 0.5, 1.0, 0.0),
        ]);
        let timestamps: Vec<i64> = candles.iter().map(|c| c.timestamp).collect();
        assert_eq!(timestamps, vec![200, 300]);
    }
}
