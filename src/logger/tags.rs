/// Log tags identify the subsystem a message comes from.
///
/// Each tag has a debug key used by `--debug <key>` and `[logging] debug_tags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Api,
    Ohlcv,
    Planner,
    Accumulator,
    Backfill,
    Refresh,
    Validator,
    Database,
    Prices,
}

impl LogTag {
    pub fn all() -> &'static [LogTag] {
        &[
            LogTag::System,
            LogTag::Config,
            LogTag::Api,
            LogTag::Ohlcv,
            LogTag::Planner,
            LogTag::Accumulator,
            LogTag::Backfill,
            LogTag::Refresh,
            LogTag::Validator,
            LogTag::Database,
            LogTag::Prices,
        ]
    }

    /// Key used for per-module debug flags
    pub fn to_debug_key(&self) -> &'static str {
        match self {
            LogTag::System => "system",
            LogTag::Config => "config",
            LogTag::Api => "api",
            LogTag::Ohlcv => "ohlcv",
            LogTag::Planner => "planner",
            LogTag::Accumulator => "accumulator",
            LogTag::Backfill => "backfill",
            LogTag::Refresh => "refresh",
            LogTag::Validator => "validator",
            LogTag::Database => "database",
            LogTag::Prices => "prices",
        }
    }

    pub fn from_debug_key(key: &str) -> Option<LogTag> {
        let key = key.trim().to_lowercase();
        LogTag::all()
            .iter()
            .copied()
            .find(|tag| tag.to_debug_key() == key)
    }

    /// Uppercase label used in console and file output
    pub fn to_plain_string(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Api => "API",
            LogTag::Ohlcv => "OHLCV",
            LogTag::Planner => "PLANNER",
            LogTag::Accumulator => "ACCUM",
            LogTag::Backfill => "BACKFILL",
            LogTag::Refresh => "REFRESH",
            LogTag::Validator => "VALIDATE",
            LogTag::Database => "DATABASE",
            LogTag::Prices => "PRICES",
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_key_round_trip() {
        for tag in LogTag::all() {
            assert_eq!(LogTag::from_debug_key(tag.to_debug_key()), Some(*tag));
        }
        assert_eq!(LogTag::from_debug_key("BACKFILL"), Some(LogTag::Backfill));
        assert_eq!(LogTag::from_debug_key("trader"), None);
    }
}
