//! Technical indicator implementations.

pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use atr::Atr;
pub use ema::Ema;
pub use macd::{Macd, MacdValue};
pub use rsi::Rsi;
pub use sma::Sma;

use crate::error::{AppError, Result};

/// Indicator over a closing-price series.
pub trait Indicator: Send + Sync {
    type Output;

    /// Unique identifier for this indicator.
    fn id(&self) -> &str;

    /// Minimum number of closes required for calculation.
    fn min_periods(&self) -> usize;

    /// Calculate the latest indicator value from closing prices.
    fn calculate(&self, closes: &[f64]) -> Result<Self::Output>;
}

/// Fail with `InsufficientData` unless `values` holds at least `required` points.
pub(crate) fn require_len<T>(values: &[T], required: usize) -> Result<()> {
    if values.len() < required {
        return Err(AppError::insufficient(required, values.len()));
    }
    Ok(())
}

/// Reject NaN and infinite results.
pub(crate) fn finite(value: f64, what: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AppError::Analysis(format!("{} is not finite", what)))
    }
}
