//! Configuration utilities - loading, reloading, and access helpers

use super::schemas::Config;
use crate::errors::ConfigError;
use crate::logger::{self, LogTag};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::path::Path;

/// Global configuration instance
///
/// Falls back to defaults when read before `load_config_from_path`.
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

fn config_lock() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default()))
}

/// Parse a config file, returning defaults when it does not exist
pub fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    toml::from_str::<Config>(&contents).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Load configuration from a file and install it as the global CONFIG
///
/// A missing file is not an error: defaults are used and a warning logged.
pub fn load_config_from_path(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path.display()),
        );
    }
    let config = read_config_file(path)?;

    if CONFIG.set(RwLock::new(config.clone())).is_err() {
        *config_lock().write() = config;
    }

    logger::debug(
        LogTag::Config,
        &format!("Configuration loaded from {}", path.display()),
    );
    Ok(())
}

/// Reload configuration from disk, replacing the global atomically
pub fn reload_config_from_path(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    let new_config = read_config_file(path)?;
    *config_lock().write() = new_config;

    logger::info(
        LogTag::Config,
        &format!("Configuration reloaded from {}", path.display()),
    );
    Ok(())
}

/// Execute a function with read access to the configuration
///
/// ```
/// use callscope::config::with_config;
///
/// let concurrency = with_config(|cfg| cfg.backfill.concurrency);
/// assert!(concurrency > 0);
/// ```
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    let config = config_lock().read();
    f(&config)
}

/// Clone of the entire configuration, for holding across await points
pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}

/// Apply an in-memory change to the global configuration
pub fn update_config<F>(update_fn: F)
where
    F: FnOnce(&mut Config),
{
    let mut config = config_lock().write();
    update_fn(&mut config);
}

/// Write the current configuration to disk as pretty TOML
pub fn save_config(path: &Path) -> Result<(), ConfigError> {
    let config_str = with_config(|cfg| toml::to_string_pretty(cfg))
        .map_err(|e| ConfigError::Serialize(e.to_string()))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    std::fs::write(path, config_str).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = read_config_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[backfill\nconcurrency = ").unwrap();

        match read_config_file(&path) {
            Err(ConfigError::Parse { .. }) => {}
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_save_then_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        save_config(&path).unwrap();
        let config = read_config_file(&path).unwrap();
        assert_eq!(config.refresh.interval_secs, get_config_clone().refresh.interval_secs);
    }

    #[test]
    fn test_reload_replaces_in_memory_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[backfill]\nconcurrency = 7\n").unwrap();

        update_config(|cfg| cfg.backfill.concurrency = 1);
        assert_eq!(with_config(|cfg| cfg.backfill.concurrency), 1);

        reload_config_from_path(&path).unwrap();
        assert_eq!(with_config(|cfg| cfg.backfill.concurrency), 7);
        assert_eq!(with_config(|cfg| cfg.backfill.wave_delay_ms), 1500);

        assert!(matches!(
            reload_config_from_path(&dir.path().join("gone.toml")),
            Err(ConfigError::NotFound(_))
        ));
    }
}
