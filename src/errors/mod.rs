//! Error types for callscope
//!
//! One `thiserror` enum per concern. Transient provider failures are
//! classified through [`ApiError::retry_class`] so retry policy lives in a
//! single place (`apis::resilient`).

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// API ERRORS
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Rate limited by {provider} (retry after {retry_after:?})")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Client disabled: {0}")]
    Disabled(String),
}

/// How the resilient wrapper should treat a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Try again, optionally after a server-provided delay
    Retry(Option<Duration>),
    Fatal,
}

impl ApiError {
    pub fn retry_class(&self) -> RetryClass {
        match self {
            ApiError::RateLimited { retry_after, .. } => RetryClass::Retry(*retry_after),
            ApiError::Timeout(_) | ApiError::Network(_) => RetryClass::Retry(None),
            ApiError::Http { status, .. } if *status >= 500 => RetryClass::Retry(None),
            ApiError::Http { .. } | ApiError::Parse(_) | ApiError::Disabled(_) => {
                RetryClass::Fatal
            }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout(e.to_string())
        } else if e.is_decode() {
            ApiError::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            ApiError::Http {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

// =============================================================================
// PERSISTENCE ERRORS
// =============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Entry {0} not found")]
    EntryNotFound(i64),

    #[error("Invalid stored value: {0}")]
    InvalidData(String),
}

// =============================================================================
// ENTRY ERRORS
// =============================================================================

/// Malformed tracked entry; skipped and counted, never retried within a run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntryError {
    #[error("Entry {entry_id} has no positive entry price")]
    MissingEntryPrice { entry_id: i64 },

    #[error("Entry {entry_id} has an invalid entry time {entry_time}")]
    InvalidEntryTime { entry_id: i64, entry_time: i64 },
}

// =============================================================================
// BACKFILL ERRORS
// =============================================================================

#[derive(Error, Debug)]
pub enum BackfillError {
    #[error("Backfill already running")]
    AlreadyRunning,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

// =============================================================================
// CONFIG ERRORS
// =============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Config file '{0}' not found")]
    NotFound(String),
}
