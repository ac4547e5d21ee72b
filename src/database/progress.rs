// backfill_state: single-row JSON snapshot of the last progress

use crate::backfill::progress::BackfillProgress;
use crate::errors::StoreError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

pub fn load_progress(conn: &Connection) -> Result<Option<BackfillProgress>, StoreError> {
    let snapshot: Option<String> = conn
        .query_row("SELECT snapshot FROM backfill_state WHERE id = 1", [], |row| row.get(0))
        .optional()?;

    match snapshot {
        Some(json) => {
            let progress: BackfillProgress = serde_json::from_str(&json)?;
            Ok(Some(progress.recovered()))
        }
        None => Ok(None),
    }
}

pub fn save_progress(conn: &Connection, progress: &BackfillProgress) -> Result<(), StoreError> {
    let json = serde_json::to_string(progress)?;
    conn.execute(
        "INSERT INTO backfill_state (id, snapshot, updated_at) VALUES (1, ?1, ?2) \
         ON CONFLICT(id) DO UPDATE SET snapshot = excluded.snapshot, updated_at = excluded.updated_at",
        params![json, Utc::now().timestamp()],
    )?;
    Ok(())
}
