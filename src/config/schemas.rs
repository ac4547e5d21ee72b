//! Configuration schemas - all config structures defined once with defaults
use crate::config_struct;

// ============================================================================
// OHLCV / CANDLE SOURCE
// ============================================================================

config_struct! {
    /// Candle source configuration
    pub struct OhlcvConfig {
        /// Hard cap on candles returned by one provider call
        max_candles_per_call: u32 = 1000,
        /// Timeout applied to every HTTP request
        request_timeout_secs: u64 = 10,
        geckoterminal_rate_limit_per_minute: u32 = 30,
        /// Network slug used in provider URLs
        network: String = "solana".to_string(),
        /// Fall back to DexScreener when GeckoTerminal has no pool
        pool_fallback_enabled: bool = true,
    }
}

// ============================================================================
// RETRY
// ============================================================================

config_struct! {
    /// Bounded exponential backoff for external calls
    pub struct RetryConfig {
        max_retries: u32 = 3,
        base_delay_ms: u64 = 10_000,
        min_delay_ms: u64 = 10_000,
        max_delay_ms: u64 = 30_000,
    }
}

// ============================================================================
// BACKFILL
// ============================================================================

config_struct! {
    /// Historical backfill configuration
    pub struct BackfillConfig {
        /// Token groups processed in parallel per wave
        concurrency: usize = 3,
        /// Pause between waves for provider pacing
        wave_delay_ms: u64 = 1500,
        /// Active records older than this are recomputed
        stale_after_secs: i64 = 21_600,
        /// Unit durations kept for the ETA moving average
        eta_window: usize = 20,
    }
}

// ============================================================================
// LIVE REFRESH
// ============================================================================

config_struct! {
    /// Live ATH refresh loop configuration
    pub struct RefreshConfig {
        enabled: bool = true,
        interval_secs: u64 = 10,
        /// Tokens per batched price lookup
        price_batch_size: usize = 30,
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

config_struct! {
    /// Consistency audit configuration
    pub struct ValidatorConfig {
        /// ATH may sit this far below entry before it is flagged
        ath_tolerance_pct: f64 = 5.0,
        /// Clock skew allowed between entry time and the first candle
        time_tolerance_secs: i64 = 300,
        stale_threshold_secs: i64 = 86_400,
        max_multiple: f64 = 10_000.0,
        audit_interval_secs: u64 = 3600,
        /// Apply deterministic repairs during periodic audits
        auto_fix: bool = false,
    }
}

// ============================================================================
// LOGGING
// ============================================================================

config_struct! {
    /// Logger settings (CLI flags take precedence)
    pub struct LoggingConfig {
        min_level: String = "info".to_string(),
        debug_tags: Vec<String> = Vec::new(),
        file_logging: bool = true,
    }
}

// ============================================================================
// MAIN CONFIGURATION
// ============================================================================

config_struct! {
    /// Complete callscope configuration
    pub struct Config {
        /// SQLite database path; empty means the default under the base directory
        database_path: String = String::new(),
        ohlcv: OhlcvConfig = OhlcvConfig::default(),
        retry: RetryConfig = RetryConfig::default(),
        backfill: BackfillConfig = BackfillConfig::default(),
        refresh: RefreshConfig = RefreshConfig::default(),
        validator: ValidatorConfig = ValidatorConfig::default(),
        logging: LoggingConfig = LoggingConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [backfill]
            concurrency = 5

            [validator]
            auto_fix = true
            "#,
        )
        .unwrap();

        assert_eq!(config.backfill.concurrency, 5);
        assert_eq!(config.backfill.wave_delay_ms, 1500);
        assert!(config.validator.auto_fix);
        assert_eq!(config.validator.time_tolerance_secs, 300);
        assert_eq!(config.ohlcv.max_candles_per_call, 1000);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }
}
