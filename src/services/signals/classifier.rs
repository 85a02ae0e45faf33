//! Signal classification from SMA, RSI and MACD readings.

use super::indicators::{Indicator, Macd, Rsi, Sma};
use super::levels::trading_levels;
use crate::error::Result;
use crate::types::{AnalysisResult, Candle, SignalKind, TradingLevels};
use tracing::{debug, warn};

/// Minimum number of candles for the signal path.
pub const MIN_ANALYSIS_CANDLES: usize = 50;

/// Strength assigned to a matched buy or sell rule.
pub const DIRECTIONAL_STRENGTH: u8 = 70;

/// Strength assigned to neutral results.
pub const NEUTRAL_STRENGTH: u8 = 50;

pub const INSUFFICIENT_DATA_REASON: &str =
    "Insufficient data for analysis. At least 50 candles are required.";

pub const ANALYSIS_FAILED_REASON: &str =
    "Analysis failed due to technical issues. Please try again later.";

pub const NEUTRAL_REASON: &str =
    "Market showing mixed signals. Consider waiting for clearer direction.";

/// Indicator readings feeding the decision table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub sma20: f64,
    pub sma50: f64,
    pub rsi: f64,
    pub histogram: f64,
}

impl IndicatorSnapshot {
    /// Recompute every indicator from scratch over `closes`.
    pub fn compute(closes: &[f64]) -> Result<Self> {
        let close = match closes.last() {
            Some(close) => *close,
            None => return Err(crate::error::AppError::insufficient(1, 0)),
        };

        Ok(Self {
            close,
            sma20: Sma::new(20).calculate(closes)?,
            sma50: Sma::new(50).calculate(closes)?,
            rsi: Rsi::default().calculate(closes)?,
            histogram: Macd::default().calculate(closes)?.histogram,
        })
    }
}

/// Apply the decision table. First match wins.
pub fn classify(snapshot: &IndicatorSnapshot) -> (SignalKind, u8) {
    let s = snapshot;

    if s.close > s.sma20 && s.sma20 > s.sma50 && s.rsi < 70.0 && s.histogram > 0.0 {
        (SignalKind::Buy, DIRECTIONAL_STRENGTH)
    } else if s.close < s.sma20 && s.sma20 < s.sma50 && s.rsi > 30.0 && s.histogram < 0.0 {
        (SignalKind::Sell, DIRECTIONAL_STRENGTH)
    } else {
        (SignalKind::Neutral, NEUTRAL_STRENGTH)
    }
}

/// Rationale for a classified signal.
pub fn reason(kind: SignalKind, rsi: f64, levels: Option<&TradingLevels>) -> String {
    let mut reason = match kind {
        SignalKind::Buy => format!(
            "Bullish trend detected with price above SMAs. RSI at {:.2} shows momentum.",
            rsi
        ),
        SignalKind::Sell => format!(
            "Bearish trend detected with price below SMAs. RSI at {:.2} shows momentum.",
            rsi
        ),
        SignalKind::Neutral => NEUTRAL_REASON.to_string(),
    };

    if let Some(levels) = levels {
        reason.push_str(&format!(
            " Entry at {}, take profit at {}, stop loss at {} ({}:1 risk/reward ratio).",
            levels.entry, levels.take_profit, levels.stop_loss, levels.risk_reward_ratio
        ));
    }

    reason
}

/// Classify a candle series. Never fails: errors collapse to neutral.
pub fn analyze_market(candles: &[Candle]) -> AnalysisResult {
    if candles.len() < MIN_ANALYSIS_CANDLES {
        debug!(
            "Only {} candles available, need {}",
            candles.len(),
            MIN_ANALYSIS_CANDLES
        );
        return AnalysisResult::neutral(INSUFFICIENT_DATA_REASON);
    }

    match try_analyze(candles) {
        Ok(result) => result,
        Err(e) => {
            warn!("Market analysis failed: {}", e);
            AnalysisResult::neutral(ANALYSIS_FAILED_REASON)
        }
    }
}

fn try_analyze(candles: &[Candle]) -> Result<AnalysisResult> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let snapshot = IndicatorSnapshot::compute(&closes)?;
    let (kind, strength) = classify(&snapshot);
    let levels = trading_levels(candles, kind)?;

    Ok(AnalysisResult {
        kind,
        strength,
        reason: reason(kind, snapshot.rsi, levels.as_ref()),
        levels,
    })
}
