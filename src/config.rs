use std::env;

/// Default Binance REST endpoint.
pub const DEFAULT_BINANCE_API_URL: &str = "https://api.binance.com/api/v3";

/// Default Binance market stream endpoint.
pub const DEFAULT_BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// Scheduling policy for analysis contexts.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Historical refresh (and retraining) cadence in seconds.
    pub refresh_interval_secs: u64,
    /// Minimum interval between applied tick merges (ms).
    pub merge_throttle_ms: i64,
    /// Number of candles requested per historical fetch.
    pub history_limit: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 60,
            merge_throttle_ms: 1_000,
            history_limit: 100,
        }
    }
}

/// Trade feed connection policy.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket URL for the trade stream.
    pub ws_url: String,
    /// Fixed backoff before reconnecting (ms).
    pub reconnect_delay_ms: u64,
    /// Delay between connect and the subscribe handshake (ms).
    pub resubscribe_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_BINANCE_WS_URL.to_string(),
            reconnect_delay_ms: 3_000,
            resubscribe_delay_ms: 100,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Binance REST base URL.
    pub binance_api_url: String,
    /// Binance API key (optional, public endpoints work without).
    pub binance_api_key: Option<String>,
    /// Symbols watched at startup.
    pub watch_symbols: Vec<String>,
    /// Maximum number of signals retained across all symbols.
    pub signal_capacity: usize,
    /// Seed for model initialization and shuffling (entropy when unset).
    pub model_seed: Option<u64>,
    /// Scheduling policy.
    pub schedule: ScheduleConfig,
    /// Trade feed policy.
    pub feed: FeedConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        // Format: "BTCUSDT,ETHUSDT"
        let watch_symbols = env::var("WATCH_SYMBOLS")
            .ok()
            .map(|s| parse_symbols(&s))
            .filter(|symbols| !symbols.is_empty())
            .unwrap_or_else(|| vec!["BTCUSDT".to_string()]);

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            binance_api_url: env::var("BINANCE_API_URL")
                .unwrap_or_else(|_| DEFAULT_BINANCE_API_URL.to_string()),
            binance_api_key: env::var("BINANCE_API_KEY").ok(),
            watch_symbols,
            signal_capacity: env::var("SIGNAL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            model_seed: env::var("MODEL_SEED").ok().and_then(|v| v.parse().ok()),
            schedule: ScheduleConfig {
                refresh_interval_secs: env::var("REFRESH_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
                merge_throttle_ms: env::var("MERGE_THROTTLE_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1_000),
                history_limit: env::var("HISTORY_LIMIT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(100),
            },
            feed: FeedConfig {
                ws_url: env::var("BINANCE_WS_URL")
                    .unwrap_or_else(|_| DEFAULT_BINANCE_WS_URL.to_string()),
                reconnect_delay_ms: env::var("RECONNECT_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3_000),
                resubscribe_delay_ms: env::var("RESUBSCRIBE_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(100),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Split a comma-separated symbol list, normalizing to upper case.
fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_defaults() {
        let schedule = ScheduleConfig::default();
        assert_eq!(schedule.refresh_interval_secs, 60);
        assert_eq!(schedule.merge_throttle_ms, 1_000);
        assert_eq!(schedule.history_limit, 100);
    }

    #[test]
    fn test_feed_defaults() {
        let feed = FeedConfig::default();
        assert_eq!(feed.reconnect_delay_ms, 3_000);
        assert_eq!(feed.resubscribe_delay_ms, 100);
        assert!(feed.ws_url.starts_with("wss://"));
    }

    #[test]
    fn test_parse_symbols() {
        let symbols = parse_symbols(" btcusdt, ETHUSDT ,,dogeusdt");
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT", "DOGEUSDT"]);
    }

    #[test]
    fn test_parse_symbols_empty() {
        assert!(parse_symbols(" , ").is_empty());
    }

    #[test]
    fn test_config_clone() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            binance_api_url: DEFAULT_BINANCE_API_URL.to_string(),
            binance_api_key: None,
            watch_symbols: vec!["BTCUSDT".to_string()],
            signal_capacity: 20,
            model_seed: Some(7),
            schedule: ScheduleConfig::default(),
            feed: FeedConfig::default(),
        };

        let cloned = config.clone();
        assert_eq!(cloned.port, 8080);
        assert_eq!(cloned.signal_capacity, 20);
        assert_eq!(cloned.model_seed, Some(7));
    }
}
