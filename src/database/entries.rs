// tracked_entries access and backfill selection

use super::records::{record_from_row, RECORD_COLUMNS};
use crate::entries::{EntryFilter, NewEntry, TrackedEntry, TrackingStatus};
use crate::errors::StoreError;
use crate::extremum::ExtremumRecord;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};

const ENTRY_COLUMNS: &str =
    "e.id, e.token_id, e.entry_price, e.entry_supply, e.entry_market_cap, e.entry_time, e.status";
const ENTRY_COLUMN_COUNT: usize = 7;

fn entry_from_row(row: &Row<'_>) -> SqliteResult<TrackedEntry> {
    let status: String = row.get(6)?;
    let status = TrackingStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            format!("unknown tracking status '{}'", status).into(),
        )
    })?;

    Ok(TrackedEntry {
        id: row.get(0)?,
        token_id: row.get(1)?,
        entry_price: row.get(2)?,
        entry_supply: row.get(3)?,
        entry_market_cap: row.get(4)?,
        entry_time: row.get(5)?,
        status,
    })
}

/// Whether the backfill should (re)compute this entry
///
/// Pending entries never qualify. Inactive entries only qualify while their
/// record is missing. Active entries qualify when the record is missing, has
/// no candle coverage yet, or is stale; `force` selects every Active entry
/// and `include_insufficient` also picks up trivial records.
pub fn needs_computation(
    entry: &TrackedEntry,
    record: Option<&ExtremumRecord>,
    filter: &EntryFilter,
    now: i64,
) -> bool {
    if let Some(ref token) = filter.token {
        if &entry.token_id != token {
            return false;
        }
    }

    match entry.status {
        TrackingStatus::Pending => false,
        TrackingStatus::Inactive => record.is_none(),
        TrackingStatus::Active => {
            let Some(record) = record else {
                return true;
            };
            if filter.force {
                return true;
            }
            if record.insufficient_data {
                return filter.include_insufficient;
            }
            let stale = filter.stale_after_secs > 0
                && record.updated_at < now - filter.stale_after_secs;
            record.watermark.is_none() || stale
        }
    }
}

pub fn entries_with_records(
    conn: &Connection,
    status: Option<TrackingStatus>,
) -> Result<Vec<(TrackedEntry, Option<ExtremumRecord>)>, StoreError> {
    let sql = format!(
        "SELECT {}, {} FROM tracked_entries e \
         LEFT JOIN extremum_records r ON r.entry_id = e.id \
         WHERE (?1 IS NULL OR e.status = ?1) \
         ORDER BY e.entry_time ASC, e.id ASC",
        ENTRY_COLUMNS, RECORD_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![status.map(|s| s.as_str())], |row| {
            Ok((entry_from_row(row)?, record_from_row(row, ENTRY_COLUMN_COUNT)?))
        })?
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(rows)
}

pub fn select_needing_computation(
    conn: &Connection,
    filter: &EntryFilter,
    now: i64,
) -> Result<Vec<(TrackedEntry, Option<ExtremumRecord>)>, StoreError> {
    let mut selected: Vec<(TrackedEntry, Option<ExtremumRecord>)> =
        entries_with_records(conn, None)?
            .into_iter()
            .filter(|(entry, record)| needs_computation(entry, record.as_ref(), filter, now))
            .collect();

    if let Some(limit) = filter.limit {
        selected.truncate(limit);
    }
    Ok(selected)
}

pub fn get_entry(conn: &Connection, entry_id: i64) -> Result<Option<TrackedEntry>, StoreError> {
    let sql = format!("SELECT {} FROM tracked_entries e WHERE e.id = ?1", ENTRY_COLUMNS);
    Ok(conn
        .query_row(&sql, params![entry_id], entry_from_row)
        .optional()?)
}

pub fn insert_entry(conn: &Connection, entry: &NewEntry) -> Result<i64, StoreError> {
    if entry.token_id.trim().is_empty() {
        return Err(StoreError::InvalidData("empty token id".to_string()));
    }
    conn.execute(
        "INSERT INTO tracked_entries (token_id, entry_price, entry_supply, entry_market_cap, entry_time, status) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.token_id.trim(),
            entry.entry_price,
            entry.entry_supply,
            entry.entry_market_cap,
            entry.entry_time,
            entry.status.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_status(conn: &Connection, entry_id: i64, status: TrackingStatus) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE tracked_entries SET status = ?1 WHERE id = ?2",
        params![status.as_str(), entry_id],
    )?;
    if updated == 0 {
        return Err(StoreError::EntryNotFound(entry_id));
    }
    Ok(())
}
