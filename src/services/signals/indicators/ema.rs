//! Exponential Moving Average (EMA) indicator.

use super::{finite, require_len, Indicator};
use crate::error::Result;

/// EMA (Exponential Moving Average) indicator.
///
/// Like SMA but gives more weight to recent prices. The first value is
/// seeded with the SMA of the first `period` points.
pub struct Ema {
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// EMA series aligned to `values[period - 1..]`.
    pub fn series(values: &[f64], period: usize) -> Result<Vec<f64>> {
        require_len(values, period.max(1))?;

        let multiplier = 2.0 / (period as f64 + 1.0);
        let mut ema = Vec::with_capacity(values.len() - period + 1);

        // First EMA is SMA
        let mut current = values.iter().take(period).sum::<f64>() / period as f64;
        ema.push(current);

        for value in &values[period..] {
            current = (value - current) * multiplier + current;
            ema.push(current);
        }

        Ok(ema)
    }
}

impl Indicator for Ema {
    type Output = f64;

    fn id(&self) -> &str {
        match self.period {
            12 => "ema12",
            26 => "ema26",
            _ => "ema",
        }
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, closes: &[f64]) -> Result<f64> {
        let series = Self::series(closes, self.period)?;
        let last = series.last().copied().unwrap_or(f64::NAN);
        finite(last, self.id())
    }
}
