//! Core logging implementation with automatic filtering
//!
//! Filtering rules:
//! 1. Errors are always shown
//! 2. Anything above the minimum level threshold is dropped
//! 3. Debug requires the tag's debug flag (or global verbose)
//! 4. Verbose requires --verbose or the tag's verbose flag
//! 5. If enabled_tags is non-empty, the tag must be in the set

use super::config::{get_logger_config, is_debug_enabled_for_tag, is_verbose_enabled_for_tag};
use super::levels::LogLevel;
use super::tags::LogTag;

pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }

    let config = get_logger_config();
    if level > config.min_level && !is_verbose_enabled_for_tag(tag) {
        return false;
    }

    match level {
        LogLevel::Debug => return is_debug_enabled_for_tag(tag),
        LogLevel::Verbose => {
            return config.min_level == LogLevel::Verbose || is_verbose_enabled_for_tag(tag)
        }
        _ => {}
    }

    config.enabled_tags.is_empty() || config.enabled_tags.contains(tag.to_debug_key())
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }
    super::format::format_and_log(tag, level, message);
}
