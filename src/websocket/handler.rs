use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::{AppError, Result};
use crate::services::analysis::normalize_symbol;
use crate::types::{
    Candle, ChartSnapshot, ClientMessage, PredictionSnapshot, ServerMessage, Signal, TradeTick,
};
use crate::AppState;

const MIN_THROTTLE_MS: u64 = 250;
const MAX_THROTTLE_MS: u64 = 60_000;

/// What a client has already been sent.
#[derive(Debug, Default)]
pub struct LastSent {
    initialized: bool,
    trade: Option<TradeTick>,
    candle: Option<Candle>,
    predictions: Option<PredictionSnapshot>,
    signals: Option<Vec<Signal>>,
}

impl LastSent {
    /// Messages needed to bring a client up to date, recording what was sent.
    pub fn diff(
        &mut self,
        chart: ChartSnapshot,
        predictions: PredictionSnapshot,
        signals: Vec<Signal>,
    ) -> Vec<ServerMessage> {
        let candle = chart.candles.last().copied();

        if !self.initialized {
            self.initialized = true;
            self.trade = chart.last_trade;
            self.candle = candle;
            self.predictions = Some(predictions.clone());
            self.signals = Some(signals.clone());
            return vec![ServerMessage::Snapshot {
                chart,
                predictions,
                signals,
            }];
        }

        let mut updates = Vec::new();
        if let Some(trade) = chart.last_trade {
            if self.trade != Some(trade) {
                self.trade = Some(trade);
                updates.push(ServerMessage::Trade {
                    symbol: chart.symbol.clone(),
                    trade,
                });
            }
        }
        if let Some(candle) = candle {
            if self.candle != Some(candle) {
                self.candle = Some(candle);
                updates.push(ServerMessage::Candle {
                    symbol: chart.symbol.clone(),
                    candle,
                });
            }
        }
        if self.predictions.as_ref() != Some(&predictions) {
            self.predictions = Some(predictions.clone());
            updates.push(ServerMessage::Predictions { data: predictions });
        }
        if self.signals.as_ref() != Some(&signals) {
            self.signals = Some(signals.clone());
            updates.push(ServerMessage::Signals {
                symbol: chart.symbol,
                signals,
            });
        }
        updates
    }
}

/// WebSocket upgrade handler for a watched symbol's live updates.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(symbol): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    let symbol = normalize_symbol(&symbol)?;
    if !state.hub.is_watching(&symbol) {
        return Err(AppError::NotFound(format!("{} is not being watched", symbol)));
    }
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, symbol)))
}

async fn handle_socket(socket: WebSocket, state: AppState, symbol: String) {
    let (mut sender, mut receiver) = socket.split();
    info!("WebSocket client connected for {}", symbol);

    let throttle_ms = (state.config.schedule.merge_throttle_ms.max(0) as u64)
        .clamp(MIN_THROTTLE_MS, MAX_THROTTLE_MS);
    let mut push = tokio::time::interval(Duration::from_millis(throttle_ms));
    let mut last = LastSent::default();

    loop {
        tokio::select! {
            _ = push.tick() => {
                let updates = match collect(&state, &symbol, &mut last).await {
                    Some(updates) => updates,
                    None => {
                        let msg = ServerMessage::Error {
                            error: format!("{} is no longer watched", symbol),
                        };
                        let _ = send(&mut sender, &msg).await;
                        break;
                    }
                };
                let mut delivered = true;
                for msg in &updates {
                    if !send(&mut sender, msg).await {
                        delivered = false;
                        break;
                    }
                }
                if !delivered {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Received message for {}: {}", symbol, text);
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::SetThrottle { throttle_ms }) => {
                                let throttle_ms = throttle_ms.clamp(MIN_THROTTLE_MS, MAX_THROTTLE_MS);
                                push = tokio::time::interval(Duration::from_millis(throttle_ms));
                                ServerMessage::ThrottleSet { throttle_ms }
                            }
                            Err(e) => ServerMessage::Error {
                                error: format!("Invalid message: {}", e),
                            },
                        };
                        if !send(&mut sender, &reply).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnecting from {}", symbol);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error for {}: {}", symbol, e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket client disconnected from {}", symbol);
}

async fn collect(state: &AppState, symbol: &str, last: &mut LastSent) -> Option<Vec<ServerMessage>> {
    let chart = state.hub.chart_snapshot(symbol).await?;
    let predictions = state.hub.prediction_snapshot(symbol).await?;
    let signals = state.hub.signals_for(symbol).await;
    Some(last.diff(chart, predictions, signals))
}

async fn send(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            error!("Failed to encode WebSocket message: {}", e);
            true
        }
    }
}
