use super::TradeFeed;
use crate::config::FeedConfig;
use crate::error::{AppError, Result};
use crate::types::TradeTick;
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Buffered ticks per subscription before the sender waits.
const TICK_CHANNEL_CAPACITY: usize = 256;

/// Binance stream control message.
#[derive(Debug, Serialize)]
struct StreamRequest {
    method: &'static str,
    params: Vec<String>,
    id: u64,
}

impl StreamRequest {
    fn subscribe(stream: &str) -> Self {
        Self {
            method: "SUBSCRIBE",
            params: vec![stream.to_string()],
            id: 1,
        }
    }

    fn unsubscribe(stream: &str) -> Self {
        Self {
            method: "UNSUBSCRIBE",
            params: vec![stream.to_string()],
            id: 1,
        }
    }
}

/// Binance trade event.
#[derive(Debug, Deserialize)]
struct TradeMessage {
    #[serde(rename = "e")]
    event: String,
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "T")]
    trade_time: i64,
}

/// Trade stream name for a symbol, e.g. `btcusdt@trade`.
pub fn trade_stream(symbol: &str) -> String {
    format!("{}@trade", symbol.to_lowercase())
}

/// Parse a text frame into a tick. Acks, other events and malformed
/// payloads yield `Feed` errors, which callers log and skip.
pub fn parse_trade(text: &str) -> Result<TradeTick> {
    let msg: TradeMessage =
        serde_json::from_str(text).map_err(|e| AppError::Feed(format!("unparsed frame: {}", e)))?;

    if msg.event != "trade" {
        return Err(AppError::Feed(format!("unexpected event {}", msg.event)));
    }

    let price: f64 = msg
        .price
        .parse()
        .map_err(|_| AppError::Feed(format!("bad trade price {}", msg.price)))?;
    if !price.is_finite() || price <= 0.0 {
        return Err(AppError::Feed(format!("bad trade price {}", msg.price)));
    }

    Ok(TradeTick {
        price,
        timestamp: msg.trade_time,
    })
}

/// How a connection ended.
#[derive(Debug, PartialEq, Eq)]
enum ConnectionEnd {
    /// Unsubscribed or the receiver went away; do not reconnect.
    Stopped,
    /// The server closed the stream; reconnect.
    Dropped,
}

/// Binance trade feed. One socket per subscribed symbol, each with its own
/// reconnect loop.
pub struct BinanceTradeFeed {
    config: FeedConfig,
    subscriptions: DashMap<String, CancellationToken>,
}

impl BinanceTradeFeed {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            subscriptions: DashMap::new(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

#[async_trait]
impl TradeFeed for BinanceTradeFeed {
    async fn subscribe(&self, symbol: &str) -> Result<mpsc::Receiver<TradeTick>> {
        let key = symbol.to_uppercase();
        let token = CancellationToken::new();
        if let Some(previous) = self.subscriptions.insert(key.clone(), token.clone()) {
            debug!("Replacing existing trade subscription for {}", key);
            previous.cancel();
        }

        let (tx, rx) = mpsc::channel(TICK_CHANNEL_CAPACITY);
        let config = self.config.clone();
        tokio::spawn(async move {
            run_stream(config, key, tx, token).await;
        });

        Ok(rx)
    }

    async fn unsubscribe(&self, symbol: &str) -> Result<()> {
        if let Some((key, token)) = self.subscriptions.remove(&symbol.to_uppercase()) {
            info!("Unsubscribing trade stream for {}", key);
            token.cancel();
        }
        Ok(())
    }
}

/// Reconnect loop for one symbol. Runs until cancelled or the receiver is
/// dropped.
async fn run_stream(
    config: FeedConfig,
    symbol: String,
    tx: mpsc::Sender<TradeTick>,
    token: CancellationToken,
) {
    let stream = trade_stream(&symbol);
    let reconnect_delay = Duration::from_millis(config.reconnect_delay_ms);

    loop {
        match run_connection(&config, &stream, &tx, &token).await {
            Ok(ConnectionEnd::Stopped) => break,
            Ok(ConnectionEnd::Dropped) => {
                warn!("Binance trade stream {} disconnected, reconnecting...", stream);
            }
            Err(e) => {
                error!("Binance trade stream {} error: {}, reconnecting...", stream, e);
            }
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }

    debug!("Trade stream task for {} finished", symbol);
}

async fn run_connection(
    config: &FeedConfig,
    stream: &str,
    tx: &mpsc::Sender<TradeTick>,
    token: &CancellationToken,
) -> anyhow::Result<ConnectionEnd> {
    info!("Connecting to Binance trade stream {}", stream);
    let ws_stream = tokio::select! {
        _ = token.cancelled() => return Ok(ConnectionEnd::Stopped),
        connected = connect_async(config.ws_url.as_str()) => connected?.0,
    };
    let (mut write, mut read) = ws_stream.split();

    // Give the socket a moment before the subscribe handshake
    tokio::select! {
        _ = token.cancelled() => return Ok(ConnectionEnd::Stopped),
        _ = tokio::time::sleep(Duration::from_millis(config.resubscribe_delay_ms)) => {}
    }

    let subscribe = serde_json::to_string(&StreamRequest::subscribe(stream))?;
    write.send(Message::Text(subscribe)).await?;
    info!("Subscribed to Binance trade stream {}", stream);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                if let Ok(json) = serde_json::to_string(&StreamRequest::unsubscribe(stream)) {
                    let _ = write.send(Message::Text(json)).await;
                }
                let _ = write.send(Message::Close(None)).await;
                return Ok(ConnectionEnd::Stopped);
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match parse_trade(&text) {
                        Ok(tick) => {
                            if tx.send(tick).await.is_err() {
                                debug!("Tick receiver for {} dropped", stream);
                                let _ = write.send(Message::Close(None)).await;
                                return Ok(ConnectionEnd::Stopped);
                            }
                        }
                        Err(e) => debug!("Skipping Binance frame on {}: {}", stream, e),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Binance trade stream {} closed", stream);
                        return Ok(ConnectionEnd::Dropped);
                    }
                    Some(Err(e)) => {
                        error!("Binance trade stream {} read error: {}", stream, e);
                        return Ok(ConnectionEnd::Dropped);
                    }
                    None => return Ok(ConnectionEnd::Dropped),
                    _ => {}
                }
            }
        }
    }
}
