//! Centralized path resolution for callscope
//!
//! All file and directory paths are resolved through this module.
//!
//! ## Path Strategy
//!
//! `CALLSCOPE_HOME` wins when set. Otherwise the platform data directory is used:
//! - **macOS**: `~/Library/Application Support/callscope/`
//! - **Windows**: `%LOCALAPPDATA%\callscope\`
//! - **Linux**: `$XDG_DATA_HOME/callscope/` (fallback `~/.local/share/callscope/`)
//!
//! ## Directory Structure
//!
//! ```text
//! callscope/
//! ├── data/
//! │   ├── config.toml
//! │   └── callscope.db
//! └── logs/
//!     └── callscope_YYYY-MM-DD.log
//! ```

use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "callscope";
pub const HOME_ENV_VAR: &str = "CALLSCOPE_HOME";

static BASE_DIRECTORY: Lazy<PathBuf> =
    Lazy::new(|| resolve_base_directory(std::env::var(HOME_ENV_VAR).ok()));

fn resolve_base_directory(home_override: Option<String>) -> PathBuf {
    if let Some(home) = home_override.filter(|h| !h.trim().is_empty()) {
        return PathBuf::from(home);
    }

    if let Some(dir) = dirs::data_local_dir() {
        return dir.join(APP_DIR);
    }

    if let Some(dir) = dirs::data_dir() {
        return dir.join(APP_DIR);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(format!(".{}", APP_DIR));
    }

    PathBuf::from(APP_DIR)
}

pub fn get_base_directory() -> PathBuf {
    BASE_DIRECTORY.clone()
}

pub fn get_data_directory() -> PathBuf {
    BASE_DIRECTORY.join("data")
}

pub fn get_logs_directory() -> PathBuf {
    BASE_DIRECTORY.join("logs")
}

pub fn get_config_path() -> PathBuf {
    get_data_directory().join("config.toml")
}

pub fn get_database_path() -> PathBuf {
    get_data_directory().join("callscope.db")
}

/// Database path honoring a configured override (empty = default)
pub fn resolve_database_path(configured: &str) -> PathBuf {
    if configured.trim().is_empty() {
        get_database_path()
    } else {
        PathBuf::from(configured)
    }
}

/// Create the data and logs directories if missing
pub fn ensure_all_directories() -> std::io::Result<()> {
    for dir in [get_data_directory(), get_logs_directory()] {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(())
}

pub fn display(path: &Path) -> String {
    path.display().to_string()
}
