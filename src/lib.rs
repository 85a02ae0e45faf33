//! Seer - real-time market analysis server
//!
//! Aggregates live trades into candles, classifies technical signals per
//! timeframe and serves a short-horizon price forecast.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;
pub mod websocket;

use axum::{routing::get, Router};
use config::Config;
use services::MarketHub;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{AppError, Result};
pub use types::*;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: Arc<MarketHub>,
}

/// Build the HTTP application with CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::router())
        .route("/ws/:symbol", get(websocket::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
