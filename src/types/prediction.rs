use serde::{Deserialize, Serialize};

/// Confidence interval aligned with one predicted value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub upper: f64,
    pub lower: f64,
}

/// Predicted price at a future time (seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionPoint {
    pub time: i64,
    pub value: f64,
}

/// Confidence band point for chart overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBand {
    pub time: i64,
    pub upper: f64,
    pub lower: f64,
}

/// Prediction state exposed to consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionSnapshot {
    pub symbol: String,
    pub points: Vec<PredictionPoint>,
    pub confidence: Vec<ConfidenceBand>,
    pub is_training: bool,
    /// Whether at least one training pass has completed.
    pub is_trained: bool,
}
