use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    watching: Vec<String>,
    signals: usize,
    signal_capacity: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (signals, signal_capacity) = state.hub.signal_usage().await;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        watching: state.hub.watched(),
        signals,
        signal_capacity,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}
