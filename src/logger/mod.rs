//! Structured logging for callscope
//!
//! Provides a small tagged logging API:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-module debug control via `--debug <module>` or `[logging] debug_tags`
//! - Dual output: colored console + daily log file
//!
//! ## Usage
//!
//! ```rust
//! use callscope::logger::{self, LogTag};
//!
//! logger::info(LogTag::Backfill, "Processing 12 token groups");
//! logger::debug(LogTag::Api, "GET networks/solana/pools/..."); // only with --debug api
//! ```

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{build_logger_config, get_logger_config, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

use std::path::Path;

/// Initialize the logger. Call once at startup before services start.
pub fn init(config: LoggerConfig, logs_dir: &Path) {
    let file_output = config.file_output;
    set_logger_config(config);

    if file_output {
        file::init_file_logging(logs_dir);
    }
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level, only shown when debug is enabled for the tag
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level, only shown with --verbose
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Force flush pending file writes (call during shutdown)
pub fn flush() {
    file::flush_file_logging();
}
