// extremum_records access

use crate::errors::StoreError;
use crate::extremum::{ExtremumRecord, Milestones};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};

/// Column order understood by [`record_from_row`]
pub const RECORD_COLUMNS: &str = "r.entry_id, r.current_price, r.current_multiple, \
    r.current_market_cap, r.current_at, r.ath_price, r.ath_multiple, r.ath_market_cap, r.ath_at, \
    r.min_low_price, r.min_low_at, r.max_drawdown, r.time_to_ath, r.time_to_drawdown, \
    r.time_to_2x, r.time_to_3x, r.time_to_5x, r.time_to_10x, r.coverage_start, r.watermark, \
    r.insufficient_data, r.updated_at";

/// Read a record starting at column `start`; None when the joined side is absent
pub fn record_from_row(row: &Row<'_>, start: usize) -> SqliteResult<Option<ExtremumRecord>> {
    let entry_id: Option<i64> = row.get(start)?;
    let Some(entry_id) = entry_id else {
        return Ok(None);
    };
    let col = |i: usize| start + i;

    Ok(Some(ExtremumRecord {
        entry_id,
        current_price: row.get(col(1))?,
        current_multiple: row.get(col(2))?,
        current_market_cap: row.get(col(3))?,
        current_at: row.get(col(4))?,
        ath_price: row.get(col(5))?,
        ath_multiple: row.get(col(6))?,
        ath_market_cap: row.get(col(7))?,
        ath_at: row.get(col(8))?,
        min_low_price: row.get(col(9))?,
        min_low_at: row.get(col(10))?,
        max_drawdown: row.get(col(11))?,
        time_to_ath: row.get(col(12))?,
        time_to_drawdown: row.get(col(13))?,
        milestones: Milestones {
            time_to_2x: row.get(col(14))?,
            time_to_3x: row.get(col(15))?,
            time_to_5x: row.get(col(16))?,
            time_to_10x: row.get(col(17))?,
        },
        coverage_start: row.get(col(18))?,
        watermark: row.get(col(19))?,
        insufficient_data: row.get::<_, i64>(col(20))? != 0,
        updated_at: row.get(col(21))?,
    }))
}

pub fn get_record(conn: &Connection, entry_id: i64) -> Result<Option<ExtremumRecord>, StoreError> {
    let sql = format!(
        "SELECT {} FROM extremum_records r WHERE r.entry_id = ?1",
        RECORD_COLUMNS
    );
    let record = conn
        .query_row(&sql, params![entry_id], |row| record_from_row(row, 0))
        .optional()?;
    Ok(record.flatten())
}

pub fn upsert_record(conn: &Connection, record: &ExtremumRecord) -> Result<(), StoreError> {
    conn.execute(
        r#"
        INSERT INTO extremum_records (
            entry_id, current_price, current_multiple, current_market_cap, current_at,
            ath_price, ath_multiple, ath_market_cap, ath_at,
            min_low_price, min_low_at, max_drawdown, time_to_ath, time_to_drawdown,
            time_to_2x, time_to_3x, time_to_5x, time_to_10x,
            coverage_start, watermark, insufficient_data, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
        ON CONFLICT(entry_id) DO UPDATE SET
            current_price = excluded.current_price,
            current_multiple = excluded.current_multiple,
            current_market_cap = excluded.current_market_cap,
            current_at = excluded.current_at,
            ath_price = excluded.ath_price,
            ath_multiple = excluded.ath_multiple,
            ath_market_cap = excluded.ath_market_cap,
            ath_at = excluded.ath_at,
            min_low_price = excluded.min_low_price,
            min_low_at = excluded.min_low_at,
            max_drawdown = excluded.max_drawdown,
            time_to_ath = excluded.time_to_ath,
            time_to_drawdown = excluded.time_to_drawdown,
            time_to_2x = excluded.time_to_2x,
            time_to_3x = excluded.time_to_3x,
            time_to_5x = excluded.time_to_5x,
            time_to_10x = excluded.time_to_10x,
            coverage_start = excluded.coverage_start,
            watermark = excluded.watermark,
            insufficient_data = excluded.insufficient_data,
            updated_at = excluded.updated_at
        "#,
        params![
            record.entry_id,
            record.current_price,
            record.current_multiple,
            record.current_market_cap,
            record.current_at,
            record.ath_price,
            record.ath_multiple,
            record.ath_market_cap,
            record.ath_at,
            record.min_low_price,
            record.min_low_at,
            record.max_drawdown,
            record.time_to_ath,
            record.time_to_drawdown,
            record.milestones.time_to_2x,
            record.milestones.time_to_3x,
            record.milestones.time_to_5x,
            record.milestones.time_to_10x,
            record.coverage_start,
            record.watermark,
            record.insufficient_data as i64,
            record.updated_at,
        ],
    )?;
    Ok(())
}

/// Records whose entry no longer exists
pub fn orphan_records(conn: &Connection) -> Result<Vec<ExtremumRecord>, StoreError> {
    let sql = format!(
        "SELECT {} FROM extremum_records r \
         LEFT JOIN tracked_entries e ON e.id = r.entry_id \
         WHERE e.id IS NULL ORDER BY r.entry_id",
        RECORD_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| record_from_row(row, 0))?
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(rows.into_iter().flatten().collect())
}
