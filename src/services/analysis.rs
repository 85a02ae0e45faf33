//! Per-symbol analysis contexts and the hub that owns them.
//!
//! Each watched symbol gets an [`AnalysisContext`] with its own candle
//! series, prediction model and cancellation token. Background tasks:
//! - one analysis loop per timeframe (fetch, classify, store the signal)
//! - a chart refresh loop that reseeds the 1h series and retrains the model
//! - a tick loop that merges live trades into the last candle
//!
//! Every task checks the token under the write lock before applying a
//! result, so work that finishes after `unwatch` is discarded.

use crate::config::{Config, ScheduleConfig};
use crate::error::{AppError, Result};
use crate::services::candles::{CandleAggregator, MergeOutcome};
use crate::services::prediction::model::MIN_TRAINING_CANDLES;
use crate::services::prediction::{PredictionModel, TrainOutcome};
use crate::services::signals::{analyze_market, SignalStore};
use crate::sources::{CandleSource, TradeFeed};
use crate::types::{
    ChartSnapshot, ConfidenceBand, PredictionPoint, PredictionSnapshot, Signal, Timeframe,
    TradeTick,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timeframe of the live chart and the training series.
pub const CHART_TIMEFRAME: Timeframe = Timeframe::OneHour;

/// Spacing between successive prediction points, in seconds.
pub const PREDICTION_STEP_SECS: i64 = 86_400;

pub const CHART_FETCH_ERROR: &str = "Failed to fetch chart data";

/// Validate and normalize a trading pair symbol (e.g. `btcusdt` -> `BTCUSDT`).
pub fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.len() < 2
        || symbol.len() > 20
        || !symbol.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(AppError::BadRequest(format!("Invalid symbol: {}", symbol)));
    }
    Ok(symbol)
}

/// Live chart state.
#[derive(Debug)]
struct ChartState {
    aggregator: CandleAggregator,
    loading: bool,
    error: Option<String>,
    last_trade: Option<TradeTick>,
}

/// Latest prediction overlay.
#[derive(Debug, Default)]
struct Forecast {
    points: Vec<PredictionPoint>,
    confidence: Vec<ConfidenceBand>,
}

/// State shared between a context and its background tasks.
#[derive(Clone)]
struct ContextShared {
    symbol: String,
    token: CancellationToken,
    chart: Arc<RwLock<ChartState>>,
    forecast: Arc<RwLock<Forecast>>,
    model: Arc<PredictionModel>,
    source: Arc<dyn CandleSource>,
    signals: Arc<RwLock<SignalStore>>,
    schedule: ScheduleConfig,
}

/// Analysis scope for one symbol.
pub struct AnalysisContext {
    shared: ContextShared,
    tasks: Vec<JoinHandle<()>>,
}

impl AnalysisContext {
    /// Subscribe to trades and start the background tasks.
    async fn start(
        symbol: String,
        config: &Config,
        source: Arc<dyn CandleSource>,
        feed: Arc<dyn TradeFeed>,
        signals: Arc<RwLock<SignalStore>>,
    ) -> Result<Self> {
        let ticks = feed.subscribe(&symbol).await?;

        let shared = ContextShared {
            symbol: symbol.clone(),
            token: CancellationToken::new(),
            chart: Arc::new(RwLock::new(ChartState {
                aggregator: CandleAggregator::new(
                    CHART_TIMEFRAME,
                    config.schedule.merge_throttle_ms,
                ),
                loading: true,
                error: None,
                last_trade: None,
            })),
            forecast: Arc::new(RwLock::new(Forecast::default())),
            model: Arc::new(PredictionModel::new(config.model_seed)),
            source,
            signals,
            schedule: config.schedule.clone(),
        };

        let mut tasks = Vec::with_capacity(Timeframe::ALL.len() + 2);
        for timeframe in Timeframe::ALL {
            let task = shared.clone();
            tasks.push(tokio::spawn(async move {
                task.run_analysis_loop(timeframe).await;
            }));
        }

        let task = shared.clone();
        tasks.push(tokio::spawn(async move {
            task.run_chart_loop().await;
        }));

        let task = shared.clone();
        tasks.push(tokio::spawn(async move {
            task.run_tick_loop(ticks).await;
        }));

        info!("Started analysis context for {}", symbol);
        Ok(Self { shared, tasks })
    }

    /// Cancel all tasks and wait for them to wind down.
    async fn shutdown(mut self) {
        self.shared.token.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Analysis task for {} ended abnormally: {}", self.shared.symbol, e);
            }
        }
        debug!("Analysis context for {} stopped", self.shared.symbol);
    }
}

impl Drop for AnalysisContext {
    fn drop(&mut self) {
        self.shared.token.cancel();
    }
}

impl ContextShared {
    async fn chart_snapshot(&self) -> ChartSnapshot {
        let chart = self.chart.read().await;
        ChartSnapshot {
            symbol: self.symbol.clone(),
            timeframe: chart.aggregator.timeframe(),
            candles: chart.aggregator.candles().to_vec(),
            loading: chart.loading,
            error: chart.error.clone(),
            last_trade: chart.last_trade,
        }
    }

    async fn prediction_snapshot(&self) -> PredictionSnapshot {
        let forecast = self.forecast.read().await;
        PredictionSnapshot {
            symbol: self.symbol.clone(),
            points: forecast.points.clone(),
            confidence: forecast.confidence.clone(),
            is_training: self.model.is_training(),
            is_trained: self.model.is_trained(),
        }
    }

    fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.refresh_interval_secs.max(1))
    }

    async fn run_analysis_loop(&self, timeframe: Timeframe) {
        let mut interval = tokio::time::interval(self.refresh_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = interval.tick() => {}
            }
            self.analyze_timeframe(timeframe).await;
        }
    }

    async fn analyze_timeframe(&self, timeframe: Timeframe) {
        let fetched = tokio::select! {
            _ = self.token.cancelled() => return,
            fetched = self.source.fetch_candles(&self.symbol, timeframe, self.schedule.history_limit) => fetched,
        };

        let candles = match fetched {
            Ok(candles) => candles,
            Err(e) => {
                error!("Error analyzing {} {}: {}", self.symbol, timeframe, e);
                return;
            }
        };

        let analysis = analyze_market(&candles);
        let signal = Signal::from_analysis(
            &self.symbol,
            timeframe,
            analysis,
            chrono::Utc::now().timestamp_millis(),
        );

        let mut store = self.signals.write().await;
        if self.token.is_cancelled() {
            debug!("Discarding stale {} {} signal", self.symbol, timeframe);
            return;
        }
        if signal.kind.is_neutral() {
            debug!("{} {} signal: Neutral ({})", self.symbol, timeframe, signal.reason);
        } else {
            info!(
                "{} {} signal: {} ({})",
                self.symbol,
                timeframe,
                signal.kind.label(),
                signal.strength
            );
        }
        store.record(signal);
    }

    async fn run_chart_loop(&self) {
        let mut interval = tokio::time::interval(self.refresh_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = interval.tick() => {}
            }
            self.refresh_chart().await;
        }
    }

    async fn refresh_chart(&self) {
        let fetched = tokio::select! {
            _ = self.token.cancelled() => return,
            fetched = self.source.fetch_candles(&self.symbol, CHART_TIMEFRAME, self.schedule.history_limit) => fetched,
        };

        {
            let mut chart = self.chart.write().await;
            if self.token.is_cancelled() {
                debug!("Discarding stale {} chart refresh", self.symbol);
                return;
            }
            chart.loading = false;
            match fetched {
                Ok(candles) => {
                    debug!("Loaded {} chart candles for {}", candles.len(), self.symbol);
                    chart.aggregator.replace(candles);
                    chart.error = None;
                }
                Err(e) => {
                    error!("Error fetching chart data for {}: {}", self.symbol, e);
                    chart.error = Some(CHART_FETCH_ERROR.to_string());
                    return;
                }
            }
        }

        self.update_predictions().await;
    }

    async fn update_predictions(&self) {
        let candles = self.chart.read().await.aggregator.candles().to_vec();
        if candles.len() < MIN_TRAINING_CANDLES {
            debug!(
                "Not enough candles to train for {} ({})",
                self.symbol,
                candles.len()
            );
            return;
        }
        let last_time = candles.last().map(|c| c.time).unwrap_or_default();

        let model = Arc::clone(&self.model);
        let joined = tokio::task::spawn_blocking(move || {
            let outcome = model.train(&candles);
            let predictions = model.predict(&candles);
            let intervals = model.confidence_interval(&predictions);
            (outcome, predictions, intervals)
        })
        .await;

        let (outcome, predictions, intervals) = match joined {
            Ok(result) => result,
            Err(e) => {
                error!("Prediction task for {} panicked: {}", self.symbol, e);
                return;
            }
        };

        if let TrainOutcome::Failed(reason) = &outcome {
            warn!("Keeping previous model for {}: {}", self.symbol, reason);
        }

        let mut forecast = self.forecast.write().await;
        if self.token.is_cancelled() {
            debug!("Discarding stale {} prediction", self.symbol);
            return;
        }

        forecast.points = predictions
            .iter()
            .enumerate()
            .map(|(i, value)| PredictionPoint {
                time: last_time + (i as i64 + 1) * PREDICTION_STEP_SECS,
                value: *value,
            })
            .collect();
        forecast.confidence = forecast
            .points
            .iter()
            .zip(intervals)
            .map(|(point, interval)| ConfidenceBand {
                time: point.time,
                upper: interval.upper,
                lower: interval.lower,
            })
            .collect();
    }

    async fn run_tick_loop(&self, mut ticks: mpsc::Receiver<TradeTick>) {
        loop {
            let tick = tokio::select! {
                _ = self.token.cancelled() => break,
                tick = ticks.recv() => tick,
            };

            match tick {
                Some(tick) => self.merge_tick(tick).await,
                None => {
                    warn!("Trade feed for {} closed", self.symbol);
                    break;
                }
            }
        }
    }

    async fn merge_tick(&self, tick: TradeTick) {
        let received_at = chrono::Utc::now().timestamp_millis();
        let mut chart = self.chart.write().await;
        if self.token.is_cancelled() {
            return;
        }

        // Every trade is the current price, even when the merge skips it
        chart.last_trade = Some(tick);
        let outcome = chart.aggregator.merge(&tick, received_at);
        if outcome.is_applied() {
            debug!("{} tick {} merged into last candle", self.symbol, tick.price);
        } else if outcome != MergeOutcome::Throttled {
            debug!("{} tick {} not merged: {:?}", self.symbol, tick.price, outcome);
        }
    }
}

/// Registry of analysis contexts plus the shared signal store.
pub struct MarketHub {
    config: Config,
    source: Arc<dyn CandleSource>,
    feed: Arc<dyn TradeFeed>,
    signals: Arc<RwLock<SignalStore>>,
    contexts: DashMap<String, AnalysisContext>,
    /// Serializes watch/unwatch so feed subscriptions stay one per symbol.
    lifecycle: Mutex<()>,
}

impl MarketHub {
    pub fn new(
        config: Config,
        source: Arc<dyn CandleSource>,
        feed: Arc<dyn TradeFeed>,
    ) -> Arc<Self> {
        let signals = Arc::new(RwLock::new(SignalStore::new(config.signal_capacity)));
        Arc::new(Self {
            config,
            source,
            feed,
            signals,
            contexts: DashMap::new(),
            lifecycle: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start analyzing a symbol. Returns false if it was already watched.
    pub async fn watch(&self, symbol: &str) -> Result<bool> {
        let symbol = normalize_symbol(symbol)?;
        let _lifecycle = self.lifecycle.lock().await;
        if self.contexts.contains_key(&symbol) {
            return Ok(false);
        }

        let context = AnalysisContext::start(
            symbol.clone(),
            &self.config,
            Arc::clone(&self.source),
            Arc::clone(&self.feed),
            Arc::clone(&self.signals),
        )
        .await?;
        self.contexts.insert(symbol, context);
        Ok(true)
    }

    /// Stop analyzing a symbol. Returns false if it was not watched.
    pub async fn unwatch(&self, symbol: &str) -> Result<bool> {
        let symbol = normalize_symbol(symbol)?;
        let _lifecycle = self.lifecycle.lock().await;
        let Some((_, context)) = self.contexts.remove(&symbol) else {
            return Ok(false);
        };

        context.shared.token.cancel();
        if let Err(e) = self.feed.unsubscribe(&symbol).await {
            warn!("Failed to unsubscribe {}: {}", symbol, e);
        }
        context.shutdown().await;
        info!("Stopped analysis context for {}", symbol);
        Ok(true)
    }

    pub fn is_watching(&self, symbol: &str) -> bool {
        normalize_symbol(symbol)
            .map(|s| self.contexts.contains_key(&s))
            .unwrap_or(false)
    }

    /// Watched symbols, sorted.
    pub fn watched(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.contexts.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }

    fn shared_for(&self, symbol: &str) -> Option<ContextShared> {
        let symbol = normalize_symbol(symbol).ok()?;
        self.contexts.get(&symbol).map(|c| c.shared.clone())
    }

    /// Live chart for a watched symbol.
    pub async fn chart_snapshot(&self, symbol: &str) -> Option<ChartSnapshot> {
        Some(self.shared_for(symbol)?.chart_snapshot().await)
    }

    /// Prediction overlay for a watched symbol.
    pub async fn prediction_snapshot(&self, symbol: &str) -> Option<PredictionSnapshot> {
        Some(self.shared_for(symbol)?.prediction_snapshot().await)
    }

    /// Run one analysis pass and chart refresh for a watched symbol now.
    pub async fn refresh(&self, symbol: &str) -> Result<()> {
        let shared = self
            .shared_for(symbol)
            .ok_or_else(|| AppError::NotFound(format!("{} is not watched", symbol)))?;
        for timeframe in Timeframe::ALL {
            shared.analyze_timeframe(timeframe).await;
        }
        shared.refresh_chart().await;
        Ok(())
    }

    /// Signals for one symbol, most recent first.
    pub async fn signals_for(&self, symbol: &str) -> Vec<Signal> {
        self.signals.read().await.for_symbol(symbol)
    }

    /// Latest signal for one (symbol, timeframe) pair.
    pub async fn signal_for(&self, symbol: &str, timeframe: Timeframe) -> Option<Signal> {
        self.signals.read().await.get(symbol, timeframe).cloned()
    }

    /// Stored signal count and the global cap.
    pub async fn signal_usage(&self) -> (usize, usize) {
        let store = self.signals.read().await;
        (store.len(), store.capacity())
    }

    /// Every stored signal, most recent first.
    pub async fn all_signals(&self) -> Vec<Signal> {
        self.signals.read().await.all()
    }

    /// Stop every context.
    pub async fn shutdown(&self) {
        for symbol in self.watched() {
            if let Err(e) = self.unwatch(&symbol).await {
                warn!("Failed to stop {}: {}", symbol, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" btcusdt ").unwrap(), "BTCUSDT");
        assert!(normalize_symbol("").is_err());
        assert!(normalize_symbol("BTC/USDT").is_err());
        assert!(normalize_symbol("X").is_err());
    }
}
