// Table definitions

pub const SCHEMA: &str = r#"
-- Tracked calls
CREATE TABLE IF NOT EXISTS tracked_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token_id TEXT NOT NULL,
    entry_price REAL,
    entry_supply REAL,
    entry_market_cap REAL,
    entry_time INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
CREATE INDEX IF NOT EXISTS idx_entries_token ON tracked_entries(token_id);
CREATE INDEX IF NOT EXISTS idx_entries_status ON tracked_entries(status, entry_time);

-- Extremum statistics, 1:1 with tracked_entries
CREATE TABLE IF NOT EXISTS extremum_records (
    entry_id INTEGER PRIMARY KEY,
    current_price REAL,
    current_multiple REAL,
    current_market_cap REAL,
    current_at INTEGER,
    ath_price REAL NOT NULL,
    ath_multiple REAL NOT NULL,
    ath_market_cap REAL,
    ath_at INTEGER NOT NULL,
    min_low_price REAL NOT NULL,
    min_low_at INTEGER NOT NULL,
    max_drawdown REAL NOT NULL,
    time_to_ath INTEGER NOT NULL,
    time_to_drawdown INTEGER NOT NULL,
    time_to_2x INTEGER,
    time_to_3x INTEGER,
    time_to_5x INTEGER,
    time_to_10x INTEGER,
    coverage_start INTEGER,
    watermark INTEGER,
    insufficient_data INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_records_updated ON extremum_records(updated_at);

-- Last known backfill progress (single row)
CREATE TABLE IF NOT EXISTS backfill_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    snapshot TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;
