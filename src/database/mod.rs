//! Persistence: the store contract the engine talks to, and its SQLite
//! implementation.

mod entries;
mod progress;
mod records;
mod schema;

pub use entries::needs_computation;

use crate::backfill::progress::BackfillProgress;
use crate::entries::{EntryFilter, NewEntry, TrackedEntry, TrackingStatus};
use crate::errors::StoreError;
use crate::extremum::ExtremumRecord;
use crate::logger::{self, LogTag};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

/// One (entry, record) pair for the auditor; either side may be missing
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRow {
    pub entry: Option<TrackedEntry>,
    pub record: Option<ExtremumRecord>,
}

/// Narrow persistence contract used by the backfill, refresh and validator
///
/// Each upsert is atomic per entry; there are no cross-entry transactions.
pub trait ExtremumStore: Send + Sync {
    /// Entries the backfill should (re)compute, oldest entry first
    fn get_entries_needing_computation(
        &self,
        filter: &EntryFilter,
        now: i64,
    ) -> Result<Vec<(TrackedEntry, Option<ExtremumRecord>)>, StoreError>;

    fn get_entry(&self, entry_id: i64) -> Result<Option<TrackedEntry>, StoreError>;

    fn get_extremum_record(&self, entry_id: i64) -> Result<Option<ExtremumRecord>, StoreError>;

    fn upsert_extremum_record(&self, record: &ExtremumRecord) -> Result<(), StoreError>;

    fn get_active_entries_with_records(
        &self,
    ) -> Result<Vec<(TrackedEntry, Option<ExtremumRecord>)>, StoreError>;

    fn get_audit_rows(&self) -> Result<Vec<AuditRow>, StoreError>;

    fn load_backfill_progress(&self) -> Result<Option<BackfillProgress>, StoreError>;

    fn save_backfill_progress(&self, progress: &BackfillProgress) -> Result<(), StoreError>;

    fn insert_entry(&self, entry: &NewEntry) -> Result<i64, StoreError>;

    fn set_entry_status(&self, entry_id: i64, status: TrackingStatus) -> Result<(), StoreError>;
}

/// SQLite-backed store; one connection behind a mutex
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure tables exist
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        let store = Self::from_connection(conn)?;

        logger::debug(
            LogTag::Database,
            &format!("Opened database at {}", path.display()),
        );
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl ExtremumStore for SqliteStore {
    fn get_entries_needing_computation(
        &self,
        filter: &EntryFilter,
        now: i64,
    ) -> Result<Vec<(TrackedEntry, Option<ExtremumRecord>)>, StoreError> {
        let conn = self.conn.lock();
        entries::select_needing_computation(&conn, filter, now)
    }

    fn get_entry(&self, entry_id: i64) -> Result<Option<TrackedEntry>, StoreError> {
        let conn = self.conn.lock();
        entries::get_entry(&conn, entry_id)
    }

    fn get_extremum_record(&self, entry_id: i64) -> Result<Option<ExtremumRecord>, StoreError> {
        let conn = self.conn.lock();
        records::get_record(&conn, entry_id)
    }

    fn upsert_extremum_record(&self, record: &ExtremumRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        records::upsert_record(&conn, record)
    }

    fn get_active_entries_with_records(
        &self,
    ) -> Result<Vec<(TrackedEntry, Option<ExtremumRecord>)>, StoreError> {
        let conn = self.conn.lock();
        entries::entries_with_records(&conn, Some(TrackingStatus::Active))
    }

    fn get_audit_rows(&self) -> Result<Vec<AuditRow>, StoreError> {
        let conn = self.conn.lock();
        let mut rows: Vec<AuditRow> = entries::entries_with_records(&conn, None)?
            .into_iter()
            .map(|(entry, record)| AuditRow {
                entry: Some(entry),
                record,
            })
            .collect();

        for record in records::orphan_records(&conn)? {
            rows.push(AuditRow {
                entry: None,
                record: Some(record),
            });
        }
        Ok(rows)
    }

    fn load_backfill_progress(&self) -> Result<Option<BackfillProgress>, StoreError> {
        let conn = self.conn.lock();
        progress::load_progress(&conn)
    }

    fn save_backfill_progress(&self, progress: &BackfillProgress) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        progress::save_progress(&conn, progress)
    }

    fn insert_entry(&self, entry: &NewEntry) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        entries::insert_entry(&conn, entry)
    }

    fn set_entry_status(&self, entry_id: i64, status: TrackingStatus) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        entries::set_status(&conn, entry_id, status)
    }
}
