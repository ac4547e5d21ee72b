// Resolution planner: splits a time span into boundary-aligned fetch segments
// of increasing granularity (minute -> hour -> day), paginated so no segment
// asks for more than the per-call candle cap.

use crate::logger::{self, LogTag};
use crate::ohlcvs::types::{FetchSegment, Timeframe};

const HOUR: i64 = 3600;
const DAY: i64 = 86_400;

/// Smallest multiple of `granularity` that is >= `ts`, saturating at `i64::MAX`
fn ceil_to_boundary(ts: i64, granularity: i64) -> i64 {
    let rem = ts.rem_euclid(granularity);
    if rem == 0 {
        ts
    } else {
        (ts - rem).saturating_add(granularity)
    }
}

fn push_paginated(
    plan: &mut Vec<FetchSegment>,
    timeframe: Timeframe,
    start: i64,
    end: i64,
    max_candles_per_call: u32,
) {
    let granularity = timeframe.to_seconds();
    let max_span = granularity.saturating_mul(max_candles_per_call as i64);

    let mut cursor = start;
    while cursor < end {
        let chunk_end = cursor.saturating_add(max_span).min(end);
        let span = chunk_end - cursor;
        let limit = ((span - 1) / granularity + 1).min(max_candles_per_call as i64);
        plan.push(FetchSegment {
            timeframe,
            range_start: cursor,
            range_end: chunk_end,
            limit: limit as u32,
        });
        cursor = chunk_end;
    }
}

/// Plan the provider calls needed to cover `[from_ts, to_ts)`
///
/// Minute candles run to the next hour boundary, hour candles to the next
/// UTC day boundary, day candles for the remainder. Each phase stops at
/// `to_ts`. Segments tile the range exactly and every `limit` stays within
/// `max_candles_per_call`.
pub fn plan_fetches(from_ts: i64, to_ts: i64, max_candles_per_call: u32) -> Vec<FetchSegment> {
    let mut plan = Vec::new();
    if to_ts <= from_ts || max_candles_per_call == 0 {
        return plan;
    }

    let minute_end = ceil_to_boundary(from_ts, HOUR).min(to_ts);
    push_paginated(&mut plan, Timeframe::Minute1, from_ts, minute_end, max_candles_per_call);

    let hour_end = ceil_to_boundary(minute_end, DAY).min(to_ts);
    push_paginated(&mut plan, Timeframe::Hour1, minute_end, hour_end, max_candles_per_call);

    push_paginated(&mut plan, Timeframe::Day1, hour_end, to_ts, max_candles_per_call);

    logger::verbose(
        LogTag::Planner,
        &format!("[{}, {}) -> {} segments", from_ts, to_ts, plan.len()),
    );
    plan
}
