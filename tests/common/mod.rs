//! Shared fakes for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use dashmap::DashMap;
use seer::config::{Config, FeedConfig, ScheduleConfig};
use seer::services::MarketHub;
use seer::sources::{CandleSource, TradeFeed};
use seer::{AppError, AppState, Candle, ChartSnapshot, Result, Timeframe, TradeTick};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Config with a long refresh interval so only the immediate first pass runs.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        binance_api_url: "http://127.0.0.1:9".to_string(),
        binance_api_key: None,
        watch_symbols: Vec::new(),
        signal_capacity: 20,
        model_seed: Some(7),
        schedule: ScheduleConfig {
            refresh_interval_secs: 3_600,
            merge_throttle_ms: 0,
            history_limit: 100,
        },
        feed: FeedConfig::default(),
    }
}

/// Closes that alternate +3/-2 and finish on an up step.
pub fn choppy_rally(len: usize) -> Vec<f64> {
    let mut price = 100.0;
    (0..len)
        .map(|i| {
            price += if i % 2 == 0 { 3.0 } else { -2.0 };
            price
        })
        .collect()
}

/// Candles ending in the current bucket of `timeframe`.
pub fn candles_ending_now(closes: &[f64], timeframe: Timeframe) -> Vec<Candle> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let last_open = timeframe.bucket_start(now_ms);
    let n = closes.len() as i64;
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| Candle {
            time: last_open - (n - 1 - i as i64) * timeframe.seconds(),
            open: close - 1.0,
            high: close + 2.0,
            low: close - 2.0,
            close: *close,
            volume: 10.0,
        })
        .collect()
}

/// Candle source serving a fixed close series for every timeframe.
pub struct FakeSource {
    closes: Vec<f64>,
    fail: AtomicBool,
    calls: AtomicUsize,
    delay: Duration,
}

impl FakeSource {
    pub fn new(closes: Vec<f64>) -> Arc<Self> {
        Self::slow(closes, Duration::ZERO)
    }

    /// Source whose every fetch takes `delay` to answer.
    pub fn slow(closes: Vec<f64>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            closes,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn failing() -> Arc<Self> {
        let source = Self::new(Vec::new());
        source.fail.store(true, Ordering::SeqCst);
        source
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandleSource for FakeSource {
    async fn fetch_candles(
        &self,
        _symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::ExternalApi("upstream unavailable".to_string()));
        }
        let skip = self.closes.len().saturating_sub(limit);
        Ok(candles_ending_now(&self.closes[skip..], timeframe))
    }
}

/// Trade feed that hands the test a sender per subscribed symbol.
#[derive(Default)]
pub struct FakeFeed {
    senders: DashMap<String, mpsc::Sender<TradeTick>>,
    subscribes: AtomicUsize,
    unsubscribed: Mutex<Vec<String>>,
}

impl FakeFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sender(&self, symbol: &str) -> Option<mpsc::Sender<TradeTick>> {
        self.senders.get(symbol).map(|s| s.clone())
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribed
            .lock()
            .map(|u| u.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TradeFeed for FakeFeed {
    async fn subscribe(&self, symbol: &str) -> Result<mpsc::Receiver<TradeTick>> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);
        self.senders.insert(symbol.to_string(), tx);
        Ok(rx)
    }

    async fn unsubscribe(&self, symbol: &str) -> Result<()> {
        self.senders.remove(symbol);
        if let Ok(mut unsubscribed) = self.unsubscribed.lock() {
            unsubscribed.push(symbol.to_string());
        }
        Ok(())
    }
}

pub fn hub(source: Arc<FakeSource>, feed: Arc<FakeFeed>) -> Arc<MarketHub> {
    MarketHub::new(test_config(), source, feed)
}

pub fn app_state(source: Arc<FakeSource>, feed: Arc<FakeFeed>) -> AppState {
    AppState {
        config: Arc::new(test_config()),
        hub: hub(source, feed),
    }
}

const WAIT_LIMIT: Duration = Duration::from_secs(5);
const POLL_EVERY: Duration = Duration::from_millis(20);

/// Poll a synchronous condition for up to five seconds.
pub async fn wait_until(check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(POLL_EVERY).await;
    }
    false
}

/// Wait until `symbol` has exactly `count` stored signals.
pub async fn wait_for_signals(hub: &MarketHub, symbol: &str, count: usize) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while tokio::time::Instant::now() < deadline {
        if hub.signals_for(symbol).await.len() == count {
            return true;
        }
        tokio::time::sleep(POLL_EVERY).await;
    }
    false
}

/// Wait until the store holds `count` signals across all symbols.
pub async fn wait_for_all_signals(hub: &MarketHub, count: usize) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while tokio::time::Instant::now() < deadline {
        if hub.all_signals().await.len() == count {
            return true;
        }
        tokio::time::sleep(POLL_EVERY).await;
    }
    false
}

/// Wait until the chart for `symbol` satisfies `ready`.
pub async fn wait_for_chart(
    hub: &MarketHub,
    symbol: &str,
    ready: impl Fn(&ChartSnapshot) -> bool,
) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while tokio::time::Instant::now() < deadline {
        if let Some(chart) = hub.chart_snapshot(symbol).await {
            if ready(&chart) {
                return true;
            }
        }
        tokio::time::sleep(POLL_EVERY).await;
    }
    false
}

/// Wait until a forecast has been published for `symbol`.
pub async fn wait_for_forecast(hub: &MarketHub, symbol: &str) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while tokio::time::Instant::now() < deadline {
        if let Some(predictions) = hub.prediction_snapshot(symbol).await {
            if !predictions.points.is_empty() {
                return true;
            }
        }
        tokio::time::sleep(POLL_EVERY).await;
    }
    false
}
