use serde::{Deserialize, Serialize};

use super::Timeframe;

/// Discrete signal classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Buy,
    Sell,
    Neutral,
}

impl SignalKind {
    /// Get display label for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            SignalKind::Buy => "Buy",
            SignalKind::Sell => "Sell",
            SignalKind::Neutral => "Neutral",
        }
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, SignalKind::Neutral)
    }
}

/// Risk-managed trade levels for a non-neutral signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingLevels {
    pub entry: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    /// Reward multiplier over risk multiplier; fixed by policy.
    pub risk_reward_ratio: f64,
}

/// Classifier output before it is attached to a symbol and timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub kind: SignalKind,
    /// Strength from 0 to 100.
    pub strength: u8,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<TradingLevels>,
}

impl AnalysisResult {
    /// Neutral result with a fixed rationale.
    pub fn neutral(reason: &str) -> Self {
        Self {
            kind: SignalKind::Neutral,
            strength: 50,
            reason: reason.to_string(),
            levels: None,
        }
    }
}

/// A trading signal for one (symbol, timeframe) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub symbol: String,
    pub timeframe: Timeframe,
    #[serde(rename = "signal")]
    pub kind: SignalKind,
    pub strength: u8,
    /// Unix timestamp (milliseconds) when produced.
    pub timestamp: i64,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<TradingLevels>,
}

impl Signal {
    /// Attach an analysis result to its symbol and timeframe.
    pub fn from_analysis(
        symbol: &str,
        timeframe: Timeframe,
        analysis: AnalysisResult,
        timestamp: i64,
    ) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            timeframe,
            kind: analysis.kind,
            strength: analysis.strength,
            timestamp,
            reason: analysis.reason,
            levels: analysis.levels,
        }
    }

    /// Whether this signal has the given identity.
    pub fn matches(&self, symbol: &str, timeframe: Timeframe) -> bool {
        self.timeframe == timeframe && self.symbol.eq_ignore_ascii_case(symbol)
    }
}
