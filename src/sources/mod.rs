//! Market data collaborators: historical candles and the live trade feed.

pub mod binance;
pub mod binance_ws;

pub use binance::BinanceClient;
pub use binance_ws::BinanceTradeFeed;

use crate::error::Result;
use crate::types::{Candle, Timeframe, TradeTick};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Supplier of historical candle snapshots.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch up to `limit` candles, ordered ascending by open time.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>>;
}

/// Live trade stream. Implementations own reconnect and backoff.
#[async_trait]
pub trait TradeFeed: Send + Sync {
    /// Start streaming trades for `symbol`. A second subscribe for the same
    /// symbol replaces the first.
    async fn subscribe(&self, symbol: &str) -> Result<mpsc::Receiver<TradeTick>>;

    /// Stop streaming trades for `symbol`. Unknown symbols are ignored.
    async fn unsubscribe(&self, symbol: &str) -> Result<()>;
}
