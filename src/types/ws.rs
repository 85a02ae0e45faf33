use super::{Candle, ChartSnapshot, PredictionSnapshot, Signal, TradeTick};
use serde::{Deserialize, Serialize};

/// Incoming WebSocket message from client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Set the push interval in milliseconds.
    SetThrottle { throttle_ms: u64 },
}

/// Outgoing WebSocket message to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full state, sent once after connecting.
    Snapshot {
        chart: ChartSnapshot,
        predictions: PredictionSnapshot,
        signals: Vec<Signal>,
    },
    /// A new trade arrived, whether or not it was merged.
    Trade { symbol: String, trade: TradeTick },
    /// The live candle changed.
    Candle { symbol: String, candle: Candle },
    /// A new forecast landed or training started/finished.
    Predictions { data: PredictionSnapshot },
    /// The symbol's signal list changed.
    Signals { symbol: String, signals: Vec<Signal> },
    ThrottleSet { throttle_ms: u64 },
    Error { error: String },
}
