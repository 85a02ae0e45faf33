use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// Analysis timeframe, matching the exchange kline intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
}

impl Timeframe {
    /// Timeframes analyzed on every refresh pass.
    pub const ALL: [Timeframe; 4] = [
        Timeframe::FifteenMinutes,
        Timeframe::ThirtyMinutes,
        Timeframe::OneHour,
        Timeframe::FourHours,
    ];

    /// Kline interval label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::FifteenMinutes => "15m",
            Timeframe::ThirtyMinutes => "30m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHours => "4h",
        }
    }

    /// Bucket length in seconds.
    pub fn seconds(&self) -> i64 {
        match self {
            Timeframe::FifteenMinutes => 900,
            Timeframe::ThirtyMinutes => 1800,
            Timeframe::OneHour => 3600,
            Timeframe::FourHours => 14400,
        }
    }

    /// Start of the bucket containing `timestamp_ms`, in seconds.
    pub fn bucket_start(&self, timestamp_ms: i64) -> i64 {
        let secs = timestamp_ms.div_euclid(1000);
        secs.div_euclid(self.seconds()) * self.seconds()
    }
}

impl std::str::FromStr for Timeframe {
    type Err = AppError;

    /// Parse from a kline interval label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "15m" => Ok(Timeframe::FifteenMinutes),
            "30m" => Ok(Timeframe::ThirtyMinutes),
            "1h" => Ok(Timeframe::OneHour),
            "4h" => Ok(Timeframe::FourHours),
            other => Err(AppError::BadRequest(format!(
                "Unsupported timeframe: {} (expected 15m, 30m, 1h or 4h)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OHLCV candle. `time` is the bucket open time in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A single trade from the live feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    pub price: f64,
    /// Trade time in milliseconds.
    pub timestamp: i64,
}

/// Chart state exposed to consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSnapshot {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub candles: Vec<Candle>,
    /// True until the first historical fetch completes.
    pub loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Most recent trade from the live feed, merged or not.
    pub last_trade: Option<TradeTick>,
}

/// A tradable pair split into base and quote assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPair {
    pub symbol: String,
    pub base: String,
    pub quote: String,
}

impl TradingPair {
    /// Quote assets recognised when splitting a symbol, longest first.
    const QUOTES: [&'static str; 6] = ["USDT", "USDC", "BUSD", "BTC", "ETH", "BNB"];

    /// Split `BTCUSDT` into `BTC` / `USDT`. None when no known quote
    /// asset ends the symbol or nothing would be left for the base.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let symbol = symbol.to_uppercase();
        Self::QUOTES.iter().find_map(|quote| {
            let base = symbol.strip_suffix(quote)?;
            if base.is_empty() {
                return None;
            }
            Some(Self {
                base: base.to_string(),
                quote: quote.to_string(),
                symbol: symbol.clone(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_round_trip_labels() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
        }
        assert!(matches!(
            "1d".parse::<Timeframe>(),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_trading_pair_split() {
        let pair = TradingPair::from_symbol("ethusdt").unwrap();
        assert_eq!(pair.symbol, "ETHUSDT");
        assert_eq!(pair.base, "ETH");
        assert_eq!(pair.quote, "USDT");

        let pair = TradingPair::from_symbol("ETHBTC").unwrap();
        assert_eq!((pair.base.as_str(), pair.quote.as_str()), ("ETH", "BTC"));

        assert_eq!(TradingPair::from_symbol("USDT"), None);
        assert_eq!(TradingPair::from_symbol("XYZ"), None);
    }

    #[test]
    fn test_timeframe_serde_label() {
        let json = serde_json::to_string(&Timeframe::FourHours).unwrap();
        assert_eq!(json, "\"4h\"");
    }

    #[test]
    fn test_bucket_start() {
        // 2024-01-01T00:59:59.999Z belongs to the 00:00 hour bucket
        assert_eq!(Timeframe::OneHour.bucket_start(1_704_070_799_999), 1_704_067_200);
        assert_eq!(Timeframe::OneHour.bucket_start(1_704_070_800_000), 1_704_070_800);
        assert_eq!(Timeframe::FifteenMinutes.bucket_start(1_704_068_100_000), 1_704_068_100);
    }
}
