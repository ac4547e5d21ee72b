//! Grouping selected entries by token so each token's candles are fetched once

use crate::entries::TrackedEntry;
use crate::extremum::ExtremumRecord;
use crate::ohlcvs::Candle;
use std::collections::HashMap;

/// All selected entries for one token plus the fetch lower bound
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGroup {
    pub token_id: String,
    pub entries: Vec<(TrackedEntry, Option<ExtremumRecord>)>,
    pub fetch_from: i64,
    /// Earliest entry time minus tolerance, the lower bound of a full fetch
    pub full_from: i64,
    /// True when only candles after the stored watermarks are fetched
    pub incremental: bool,
}

impl TokenGroup {
    /// Whether any candle tops a stored peak
    ///
    /// Records only keep the dip up to their peak, so a moved peak needs the
    /// candles between the old peak and the old watermark again.
    pub fn raises_any_peak(&self, candles: &[Candle]) -> bool {
        let Some(lowest_peak) = self
            .entries
            .iter()
            .map(|(_, record)| record.as_ref().map(|r| r.ath_price))
            .collect::<Option<Vec<f64>>>()
            .and_then(|peaks| peaks.into_iter().reduce(f64::min))
        else {
            return true;
        };
        candles.iter().any(|c| c.high > lowest_peak)
    }
}

/// Group by token, keeping first-seen token order
///
/// The lower bound is the earliest entry time minus tolerance. When every
/// entry already has a watermark and `force` is off, fetching resumes from
/// the earliest watermark instead.
pub fn group_by_token(
    selected: Vec<(TrackedEntry, Option<ExtremumRecord>)>,
    tolerance_secs: i64,
    force: bool,
) -> Vec<TokenGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut by_token: HashMap<String, Vec<(TrackedEntry, Option<ExtremumRecord>)>> =
        HashMap::new();

    for (entry, record) in selected {
        if !by_token.contains_key(&entry.token_id) {
            order.push(entry.token_id.clone());
        }
        by_token
            .entry(entry.token_id.clone())
            .or_default()
            .push((entry, record));
    }

    order
        .into_iter()
        .filter_map(|token_id| {
            let entries = by_token.remove(&token_id)?;
            let earliest_entry = entries.iter().map(|(e, _)| e.entry_time).min()?;

            let watermarks: Vec<Option<i64>> = entries
                .iter()
                .map(|(_, r)| r.as_ref().and_then(|r| r.watermark))
                .collect();
            let earliest_watermark = if !force && watermarks.iter().all(|w| w.is_some()) {
                watermarks.iter().flatten().min().copied()
            } else {
                None
            };

            let full_from = earliest_entry - tolerance_secs;
            let (fetch_from, incremental) = match earliest_watermark {
                Some(w) => (w, true),
                None => (full_from, false),
            };

            Some(TokenGroup {
                token_id,
                entries,
                fetch_from,
                full_from,
                incremental,
            })
        })
        .collect()
}
