//! Average True Range (ATR) indicator.

use super::{finite, require_len};
use crate::error::Result;
use crate::types::Candle;

/// ATR (Average True Range) over the trailing window.
///
/// TR = max(High-Low, |High-PrevClose|, |Low-PrevClose|)
///
/// The first candle of the window has no previous close inside the window
/// and contributes High-Low only. The result is the plain mean of the
/// window's true ranges.
pub struct Atr {
    period: usize,
}

impl Default for Atr {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    pub fn min_periods(&self) -> usize {
        self.period.max(1)
    }

    /// Calculate True Range.
    fn true_range(current: &Candle, previous: Option<&Candle>) -> f64 {
        let hl = current.high - current.low;
        match previous {
            Some(prev) => {
                let hc = (current.high - prev.close).abs();
                let lc = (current.low - prev.close).abs();
                hl.max(hc).max(lc)
            }
            None => hl,
        }
    }

    pub fn calculate(&self, candles: &[Candle]) -> Result<f64> {
        require_len(candles, self.min_periods())?;

        let window = &candles[candles.len() - self.min_periods()..];
        let total: f64 = window
            .iter()
            .enumerate()
            .map(|(i, candle)| {
                let previous = if i == 0 { None } else { window.get(i - 1) };
                Self::true_range(candle, previous)
            })
            .sum();

        finite(total / window.len() as f64, "atr")
    }
}
