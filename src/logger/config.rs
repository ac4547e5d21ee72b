//! Logger configuration shared by every logging call.
//!
//! Built once at startup from the `[logging]` config section and the
//! command-line flags, then read on every log call.

use super::levels::LogLevel;
use super::tags::LogTag;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Messages noisier than this level are dropped
    pub min_level: LogLevel,
    /// Tags with debug output enabled (debug keys)
    pub debug_tags: HashSet<String>,
    /// Tags with verbose output enabled (debug keys)
    pub verbose_tags: HashSet<String>,
    /// When non-empty, only these tags log below Error
    pub enabled_tags: HashSet<String>,
    pub console_output: bool,
    pub file_output: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            verbose_tags: HashSet::new(),
            enabled_tags: HashSet::new(),
            console_output: true,
            file_output: false,
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

/// Build a logger config from textual settings, ignoring unknown tags
pub fn build_logger_config(
    min_level: &str,
    debug_tags: &[String],
    verbose: bool,
    file_output: bool,
) -> LoggerConfig {
    let mut config = LoggerConfig {
        min_level: LogLevel::parse(min_level).unwrap_or(LogLevel::Info),
        file_output,
        ..LoggerConfig::default()
    };

    for key in debug_tags {
        if let Some(tag) = LogTag::from_debug_key(key) {
            config.debug_tags.insert(tag.to_debug_key().to_string());
        }
    }

    if !config.debug_tags.is_empty() && config.min_level < LogLevel::Debug {
        config.min_level = LogLevel::Debug;
    }
    if verbose {
        config.min_level = LogLevel::Verbose;
    }

    config
}

pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    let config = LOGGER_CONFIG.read();
    config.debug_tags.contains(tag.to_debug_key()) || config.min_level == LogLevel::Verbose
}

pub fn is_verbose_enabled_for_tag(tag: &LogTag) -> bool {
    LOGGER_CONFIG.read().verbose_tags.contains(tag.to_debug_key())
}
