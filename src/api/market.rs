//! Market analysis API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::ApiResponse;
use crate::error::{AppError, Result};
use crate::services::analysis::normalize_symbol;
use crate::sources::binance::supported_pairs;
use crate::types::{ChartSnapshot, PredictionSnapshot, Signal, Timeframe, TradingPair};
use crate::AppState;

/// Watch state change for a symbol.
#[derive(Debug, Serialize)]
pub struct WatchResponse {
    pub symbol: String,
    pub watching: bool,
    /// False when the request did not change anything.
    pub changed: bool,
}

/// Latest trade price for a symbol. Fields are null until the first trade.
#[derive(Debug, Serialize)]
pub struct CurrentPrice {
    pub symbol: String,
    pub price: Option<f64>,
    /// Trade time in milliseconds.
    pub timestamp: Option<i64>,
}

/// Create the market router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_watched))
        .route("/signals", get(all_signals))
        .route("/pairs", get(list_pairs))
        .route("/:symbol/price", get(get_price))
        .route("/:symbol/chart", get(get_chart))
        .route("/:symbol/signals", get(get_signals))
        .route("/:symbol/signals/:timeframe", get(get_timeframe_signal))
        .route("/:symbol/predictions", get(get_predictions))
        .route("/:symbol/refresh", post(refresh))
        .route("/:symbol/watch", post(watch).delete(unwatch))
}

/// Watched symbols.
async fn list_watched(State(state): State<AppState>) -> Json<ApiResponse<Vec<String>>> {
    Json(ApiResponse::new(state.hub.watched()))
}

/// Every stored signal across symbols, most recent first.
async fn all_signals(State(state): State<AppState>) -> Json<ApiResponse<Vec<Signal>>> {
    Json(ApiResponse::new(state.hub.all_signals().await))
}

/// Tradable pairs with base and quote assets.
async fn list_pairs() -> Json<ApiResponse<Vec<TradingPair>>> {
    Json(ApiResponse::new(supported_pairs()))
}

async fn get_price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<CurrentPrice>>> {
    let chart = state
        .hub
        .chart_snapshot(&symbol)
        .await
        .ok_or_else(|| not_watched(&symbol))?;
    Ok(Json(ApiResponse::new(CurrentPrice {
        symbol: chart.symbol,
        price: chart.last_trade.map(|t| t.price),
        timestamp: chart.last_trade.map(|t| t.timestamp),
    })))
}

async fn get_chart(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<ChartSnapshot>>> {
    let chart = state
        .hub
        .chart_snapshot(&symbol)
        .await
        .ok_or_else(|| not_watched(&symbol))?;
    Ok(Json(ApiResponse::new(chart)))
}

/// Signals for one symbol. Empty until the first analysis pass lands.
async fn get_signals(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<Vec<Signal>>>> {
    let symbol = normalize_symbol(&symbol)?;
    Ok(Json(ApiResponse::new(state.hub.signals_for(&symbol).await)))
}

/// Latest signal for one timeframe (`15m`, `30m`, `1h` or `4h`).
async fn get_timeframe_signal(
    State(state): State<AppState>,
    Path((symbol, timeframe)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Signal>>> {
    let symbol = normalize_symbol(&symbol)?;
    let timeframe: Timeframe = timeframe.parse()?;
    let signal = state
        .hub
        .signal_for(&symbol, timeframe)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No {} signal for {} yet", timeframe, symbol)))?;
    Ok(Json(ApiResponse::new(signal)))
}

async fn get_predictions(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<PredictionSnapshot>>> {
    let predictions = state
        .hub
        .prediction_snapshot(&symbol)
        .await
        .ok_or_else(|| not_watched(&symbol))?;
    Ok(Json(ApiResponse::new(predictions)))
}

/// Run an analysis pass and chart refresh immediately.
async fn refresh(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<StatusCode> {
    state.hub.refresh(&symbol).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn watch(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<WatchResponse>>)> {
    let symbol = normalize_symbol(&symbol)?;
    let changed = state.hub.watch(&symbol).await?;
    let status = if changed {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(ApiResponse::new(WatchResponse {
            symbol,
            watching: true,
            changed,
        })),
    ))
}

async fn unwatch(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<WatchResponse>>> {
    let symbol = normalize_symbol(&symbol)?;
    let changed = state.hub.unwatch(&symbol).await?;
    if !changed {
        return Err(not_watched(&symbol));
    }

    Ok(Json(ApiResponse::new(WatchResponse {
        symbol,
        watching: false,
        changed,
    })))
}

fn not_watched(symbol: &str) -> AppError {
    AppError::NotFound(format!("{} is not being watched", symbol.to_uppercase()))
}
