//! Integration tests for API endpoints

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use common::{app_state, choppy_rally, wait_for_chart, wait_for_signals, FakeFeed, FakeSource};
use seer::TradeTick;
use serde_json::Value;
use tower::ServiceExt;

async fn send(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let state = app_state(FakeSource::new(choppy_rally(61)), FakeFeed::new());
    let app = seer::app(state);

    let (status, body) = send(&app, Method::GET, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
    assert_eq!(body["watching"], serde_json::json!([]));
    assert_eq!(body["signals"], 0);
    assert_eq!(body["signal_capacity"], 20);
}

#[tokio::test]
async fn test_pairs_split_base_and_quote() {
    let state = app_state(FakeSource::new(choppy_rally(61)), FakeFeed::new());
    let app = seer::app(state);

    let (status, body) = send(&app, Method::GET, "/api/market/pairs").await;
    assert_eq!(status, StatusCode::OK);
    let pairs = body["data"].as_array().unwrap();
    assert_eq!(pairs.len(), 5);
    assert_eq!(pairs[0]["symbol"], "BTCUSDT");
    assert_eq!(pairs[0]["base"], "BTC");
    assert_eq!(pairs[0]["quote"], "USDT");
}

#[tokio::test]
async fn test_current_price() {
    let feed = FakeFeed::new();
    let state = app_state(FakeSource::new(choppy_rally(61)), feed.clone());
    let hub = state.hub.clone();
    let app = seer::app(state);

    let (status, _) = send(&app, Method::GET, "/api/market/BTCUSDT/price").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app, Method::POST, "/api/market/BTCUSDT/watch").await;
    let (status, body) = send(&app, Method::GET, "/api/market/BTCUSDT/price").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["symbol"], "BTCUSDT");
    assert!(body["data"]["price"].is_null());

    feed.sender("BTCUSDT")
        .unwrap()
        .send(TradeTick {
            price: 42_000.5,
            timestamp: 1_704_067_200_120,
        })
        .await
        .unwrap();
    assert!(wait_for_chart(&hub, "BTCUSDT", |c| c.last_trade.is_some()).await);

    let (_, body) = send(&app, Method::GET, "/api/market/BTCUSDT/price").await;
    assert_eq!(body["data"]["price"], 42_000.5);
    assert_eq!(body["data"]["timestamp"], 1_704_067_200_120i64);

    let (_, body) = send(&app, Method::GET, "/api/market/BTCUSDT/chart").await;
    assert_eq!(body["data"]["lastTrade"]["price"], 42_000.5);

    hub.shutdown().await;
}

#[tokio::test]
async fn test_signal_by_timeframe() {
    let state = app_state(FakeSource::new(choppy_rally(61)), FakeFeed::new());
    let hub = state.hub.clone();
    let app = seer::app(state);

    send(&app, Method::POST, "/api/market/BTCUSDT/watch").await;
    assert!(wait_for_signals(&hub, "BTCUSDT", 4).await);

    let (status, body) = send(&app, Method::GET, "/api/market/BTCUSDT/signals/15m").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["timeframe"], "15m");

    let (status, body) = send(&app, Method::GET, "/api/market/BTCUSDT/signals/1d").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("1d"));

    let (status, _) = send(&app, Method::GET, "/api/market/ETHUSDT/signals/1h").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    hub.shutdown().await;
}

#[tokio::test]
async fn test_watch_then_unwatch() {
    let state = app_state(FakeSource::new(choppy_rally(61)), FakeFeed::new());
    let hub = state.hub.clone();
    let app = seer::app(state);

    let (status, body) = send(&app, Method::POST, "/api/market/btcusdt/watch").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["symbol"], "BTCUSDT");
    assert_eq!(body["data"]["changed"], true);

    let (status, body) = send(&app, Method::POST, "/api/market/BTCUSDT/watch").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["changed"], false);

    let (_, body) = send(&app, Method::GET, "/api/market").await;
    assert_eq!(body["data"], serde_json::json!(["BTCUSDT"]));

    let (status, body) = send(&app, Method::DELETE, "/api/market/BTCUSDT/watch").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["watching"], false);

    let (status, body) = send(&app, Method::DELETE, "/api/market/BTCUSDT/watch").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);

    assert!(hub.watched().is_empty());
}

#[tokio::test]
async fn test_invalid_symbol_is_bad_request() {
    let state = app_state(FakeSource::new(choppy_rally(61)), FakeFeed::new());
    let app = seer::app(state);

    let (status, body) = send(&app, Method::POST, "/api/market/BTC-USDT/watch").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid symbol"));
}

#[tokio::test]
async fn test_unwatched_symbol_is_not_found() {
    let state = app_state(FakeSource::new(choppy_rally(61)), FakeFeed::new());
    let app = seer::app(state);

    let (status, _) = send(&app, Method::GET, "/api/market/ETHUSDT/chart").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, "/api/market/ETHUSDT/predictions").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::POST, "/api/market/ETHUSDT/refresh").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::GET, "/api/market/ETHUSDT/signals").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], serde_json::json!([]));
}

#[tokio::test]
async fn test_signals_and_chart_for_watched_symbol() {
    let state = app_state(FakeSource::new(choppy_rally(61)), FakeFeed::new());
    let hub = state.hub.clone();
    let app = seer::app(state);

    send(&app, Method::POST, "/api/market/BTCUSDT/watch").await;
    assert!(wait_for_signals(&hub, "BTCUSDT", 4).await);

    let (status, body) = send(&app, Method::GET, "/api/market/btcusdt/signals").await;
    assert_eq!(status, StatusCode::OK);
    let signals = body["data"].as_array().unwrap();
    assert_eq!(signals.len(), 4);
    for signal in signals {
        assert_eq!(signal["symbol"], "BTCUSDT");
        assert_eq!(signal["signal"], "buy");
        assert!(signal["timestamp"].is_i64());
    }

    let (_, body) = send(&app, Method::GET, "/api/market/signals").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 4);

    let (status, body) = send(&app, Method::GET, "/api/market/BTCUSDT/chart").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["symbol"], "BTCUSDT");
    assert_eq!(body["data"]["timeframe"], "1h");

    let (status, body) = send(&app, Method::GET, "/api/market/BTCUSDT/predictions").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["points"].is_array());
    assert!(body["data"]["isTraining"].is_boolean());
    assert!(body["data"]["isTrained"].is_boolean());

    let (status, _) = send(&app, Method::POST, "/api/market/BTCUSDT/refresh").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    hub.shutdown().await;
}
