use super::CandleSource;
use crate::error::{AppError, Result};
use crate::types::{Candle, Timeframe, TradingPair};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

/// Pairs offered by default.
pub const SUPPORTED_PAIRS: &[&str] = &["BTCUSDT", "ETHUSDT", "BNBUSDT", "ADAUSDT", "DOGEUSDT"];

/// Longest error body excerpt logged from a failed request.
const ERROR_BODY_EXCERPT: usize = 200;

/// Supported pairs with their base and quote assets.
pub fn supported_pairs() -> Vec<TradingPair> {
    SUPPORTED_PAIRS
        .iter()
        .filter_map(|symbol| TradingPair::from_symbol(symbol))
        .collect()
}

/// First `ERROR_BODY_EXCERPT` characters of a response body.
fn excerpt(text: &str) -> String {
    text.chars().take(ERROR_BODY_EXCERPT).collect()
}

/// Binance REST client for kline history.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl BinanceClient {
    /// Create a new Binance client.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .user_agent("Seer/1.0")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn klines_url(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> String {
        format!(
            "{}/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            symbol.to_uppercase(),
            timeframe.as_str(),
            limit
        )
    }
}

#[async_trait]
impl CandleSource for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let url = self.klines_url(symbol, timeframe, limit);

        let mut request = self.client.get(&url);
        if let Some(ref key) = self.api_key {
            request = request.header("X-MBX-APIKEY", key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(
                "Binance API returned {}: {}",
                status,
                excerpt(&text)
            );
            return Err(AppError::ExternalApi(format!("Binance API error: {}", status)));
        }

        let rows: Vec<Vec<Value>> = response.json().await?;
        let candles = parse_klines(&rows)?;
        debug!(
            "Fetched {} {} candles for {}",
            candles.len(),
            timeframe,
            symbol
        );
        Ok(candles)
    }
}

/// Convert kline rows `[openTimeMs, "o", "h", "l", "c", "v", ...]` into
/// candles with open time in seconds.
pub fn parse_klines(rows: &[Vec<Value>]) -> Result<Vec<Candle>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            parse_kline_row(row)
                .ok_or_else(|| AppError::ExternalApi(format!("Malformed kline row {}", i)))
        })
        .collect()
}

fn parse_kline_row(row: &[Value]) -> Option<Candle> {
    if row.len() < 6 {
        return None;
    }

    let open_time_ms = row[0].as_i64()?;
    Some(Candle {
        time: open_time_ms.div_euclid(1000),
        open: number(&row[1])?,
        high: number(&row[2])?,
        low: number(&row[3])?,
        close: number(&row[4])?,
        volume: number(&row[5])?,
    })
}

/// Binance sends decimals as strings; accept plain numbers too.
fn number(value: &Value) -> Option<f64> {
    let parsed: f64 = match value {
        Value::String(s) => s.parse().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    if parsed.is_finite() {
        Some(parsed)
    } else {
        None
    }
}
