//! Application configuration loaded from environment variables.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Venue Endpoints ===
    /// Polymarket gamma API base URL.
    #[serde(default = "default_polymarket_url")]
    pub polymarket_api_url: String,

    /// Kalshi trade API base URL.
    #[serde(default = "default_kalshi_url")]
    pub kalshi_api_url: String,

    // === Sizing ===
    /// Total stake committed per detected opportunity, split across both legs.
    #[serde(default = "default_total_stake")]
    pub total_stake: Decimal,

    // === Scheduling ===
    /// Base poll interval per category in seconds.
    #[serde(default = "default_base_interval")]
    pub base_poll_interval_secs: u64,

    /// Lower clamp for the adaptive poll interval.
    #[serde(default = "default_min_interval")]
    pub min_poll_interval_secs: u64,

    /// Upper clamp for the adaptive poll interval.
    #[serde(default = "default_max_interval")]
    pub max_poll_interval_secs: u64,

    /// Coordinator tick granularity in seconds.
    #[serde(default = "default_tick")]
    pub tick_secs: u64,

    // === Retry ===
    /// Maximum fetch attempts per venue per cycle.
    #[serde(default = "default_max_attempts")]
    pub max_fetch_attempts: u32,

    /// Concurrent category fetches per tick.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    // === Positions ===
    /// Default days until expiry when the venue provides none.
    #[serde(default = "default_expiry_days")]
    pub default_expiry_days: i64,

    // === Operation Modes ===
    /// Use the synthetic fault-injecting price source instead of live venues.
    #[serde(default)]
    pub dummy: bool,

    /// Failure probability for the synthetic source, in [0, 1].
    #[serde(default = "default_fault_rate")]
    pub fault_rate: f64,

    // === Server Configuration ===
    /// HTTP server port for the read-only dashboard API.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// HTTP timeout for venue requests in milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
}

fn default_polymarket_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}

fn default_kalshi_url() -> String {
    "https://api.kalshi.com/trade-api/v2".to_string()
}

fn default_total_stake() -> Decimal {
    Decimal::new(100, 0) // $100
}

fn default_base_interval() -> u64 {
    60
}

fn default_min_interval() -> u64 {
    30
}

fn default_max_interval() -> u64 {
    240
}

fn default_tick() -> u64 {
    1
}

fn default_max_attempts() -> u32 {
    crate::retry::DEFAULT_MAX_ATTEMPTS
}

fn default_fetch_concurrency() -> usize {
    4
}

fn default_expiry_days() -> i64 {
    30
}

fn default_fault_rate() -> f64 {
    0.10
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.total_stake <= Decimal::ZERO {
            return Err("TOTAL_STAKE must be positive".to_string());
        }

        if self.min_poll_interval_secs > self.max_poll_interval_secs {
            return Err("MIN_POLL_INTERVAL_SECS must not exceed MAX_POLL_INTERVAL_SECS".to_string());
        }

        if self.base_poll_interval_secs == 0 {
            return Err("BASE_POLL_INTERVAL_SECS must be positive".to_string());
        }

        if self.max_fetch_attempts == 0 {
            return Err("MAX_FETCH_ATTEMPTS must be at least 1".to_string());
        }

        if !(0.0..=1.0).contains(&self.fault_rate) {
            return Err("FAULT_RATE must be within [0, 1]".to_string());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            polymarket_api_url: default_polymarket_url(),
            kalshi_api_url: default_kalshi_url(),
            total_stake: default_total_stake(),
            base_poll_interval_secs: default_base_interval(),
            min_poll_interval_secs: default_min_interval(),
            max_poll_interval_secs: default_max_interval(),
            tick_secs: default_tick(),
            max_fetch_attempts: default_max_attempts(),
            fetch_concurrency: default_fetch_concurrency(),
            default_expiry_days: default_expiry_days(),
            dummy: false,
            fault_rate: default_fault_rate(),
            port: default_port(),
            rust_log: default_log_level(),
            http_timeout_ms: default_http_timeout_ms(),
        }
    }
}

fn default_http_timeout_ms() -> u64 {
    10_000
}
