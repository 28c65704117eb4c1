use chrono::Duration;
use fmp_common::{parse_env_or_default, DEFAULT_CURRENCY_CODE};
use log::*;

pub const SQLITE_DB_URL: &str = "sqlite://data/marketplace.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 50;
const DEFAULT_RESERVATION_TIMEOUT_SECS: i64 = 15 * 60;

/// Settings shared by everything that embeds the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// The currency code every order is placed in.
    pub currency: String,
    pub event_buffer_size: usize,
    /// How long a checkout may hold stock before the repair worker takes it back.
    pub reservation_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: SQLITE_DB_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            reservation_timeout: Duration::seconds(DEFAULT_RESERVATION_TIMEOUT_SECS),
        }
    }
}

impl EngineConfig {
    pub fn from_env_or_defaults() -> Self {
        let database_url = std::env::var("FMP_DATABASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ FMP_DATABASE_URL is not set. Using {SQLITE_DB_URL}");
            SQLITE_DB_URL.to_string()
        });
        let max_connections = parse_env_or_default("FMP_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let currency = std::env::var("FMP_CURRENCY")
            .map(|c| c.trim().to_ascii_lowercase())
            .ok()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string());
        let event_buffer_size = parse_env_or_default("FMP_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE);
        let timeout_secs = parse_env_or_default("FMP_RESERVATION_TIMEOUT", DEFAULT_RESERVATION_TIMEOUT_SECS);
        let timeout_secs = if timeout_secs <= 0 {
            warn!("🪛️ FMP_RESERVATION_TIMEOUT must be positive. Using {DEFAULT_RESERVATION_TIMEOUT_SECS}s");
            DEFAULT_RESERVATION_TIMEOUT_SECS
        } else {
            timeout_secs
        };
        Self {
            database_url,
            max_connections,
            currency,
            event_buffer_size,
            reservation_timeout: Duration::seconds(timeout_secs),
        }
    }
}
