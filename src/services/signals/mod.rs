//! Trading signals service module.
//!
//! Provides the indicator calculations, the signal classifier, ATR-based
//! trade levels and the bounded signal store.

pub mod classifier;
pub mod indicators;
pub mod levels;
pub mod store;

pub use classifier::{analyze_market, classify, IndicatorSnapshot, MIN_ANALYSIS_CANDLES};
pub use levels::trading_levels;
pub use store::SignalStore;
