//! MACD (Moving Average Convergence Divergence) indicator.

use super::{finite, require_len, Ema, Indicator};
use crate::error::{AppError, Result};
use serde::Serialize;

/// Latest MACD reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD indicator.
///
/// Shows the relationship between two EMAs:
/// - MACD Line = EMA(12) - EMA(26)
/// - Signal Line = EMA(9) of MACD Line
/// - Histogram = MACD Line - Signal Line
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast_period,
            slow_period,
            signal_period,
        }
    }
}

impl Indicator for Macd {
    type Output = MacdValue;

    fn id(&self) -> &str {
        "macd"
    }

    fn min_periods(&self) -> usize {
        self.slow_period + self.signal_period - 1
    }

    fn calculate(&self, closes: &[f64]) -> Result<MacdValue> {
        if self.fast_period >= self.slow_period {
            return Err(AppError::Analysis(format!(
                "fast period {} must be shorter than slow period {}",
                self.fast_period, self.slow_period
            )));
        }
        require_len(closes, self.min_periods())?;

        let fast_ema = Ema::series(closes, self.fast_period)?;
        let slow_ema = Ema::series(closes, self.slow_period)?;

        // Align the EMAs (fast starts earlier)
        let offset = self.slow_period - self.fast_period;
        let macd_line: Vec<f64> = fast_ema
            .iter()
            .skip(offset)
            .zip(slow_ema.iter())
            .map(|(f, s)| f - s)
            .collect();

        let signal_line = Ema::series(&macd_line, self.signal_period)?;

        let macd = macd_line.last().copied().unwrap_or(f64::NAN);
        let signal = signal_line.last().copied().unwrap_or(f64::NAN);

        Ok(MacdValue {
            macd: finite(macd, "macd line")?,
            signal: finite(signal, "macd signal line")?,
            histogram: finite(macd - signal, "macd histogram")?,
        })
    }
}
