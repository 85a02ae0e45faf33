//! Core services: candle aggregation, signals, prediction and orchestration.

pub mod analysis;
pub mod candles;
pub mod prediction;
pub mod signals;

pub use analysis::{AnalysisContext, MarketHub};
pub use candles::{CandleAggregator, MergeOutcome};
pub use prediction::{PredictionModel, TrainOutcome};
pub use signals::SignalStore;
