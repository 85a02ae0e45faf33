//! Simple Moving Average (SMA) indicator.

use super::{finite, require_len, Indicator};
use crate::error::Result;

/// SMA (Simple Moving Average) indicator.
///
/// Arithmetic mean of the trailing `period` closes. Undefined until the
/// window is full.
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Indicator for Sma {
    type Output = f64;

    fn id(&self) -> &str {
        match self.period {
            20 => "sma20",
            50 => "sma50",
            _ => "sma",
        }
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, closes: &[f64]) -> Result<f64> {
        require_len(closes, self.period.max(1))?;

        let sma = closes.iter().rev().take(self.period).sum::<f64>() / self.period as f64;

        finite(sma, self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_sma_ids() {
        assert_eq!(Sma::new(20).id(), "sma20");
        assert_eq!(Sma::new(50).id(), "sma50");
        assert_eq!(Sma::new(7).id(), "sma");
    }

    #[test]
    fn test_sma_trailing_window() {
        let closes: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let sma = Sma::new(4).calculate(&closes).unwrap();
        assert_eq!(sma, 8.5);
    }

    #[test]
    fn test_sma_insufficient_data() {
        let closes = vec![1.0; 19];
        let err = Sma::new(20).calculate(&closes).unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientData {
                required: 20,
                available: 19
            }
        ));
    }

    #[test]
    fn test_sma_rejects_nan() {
        let mut closes = vec![1.0; 20];
        closes[19] = f64::NAN;
        assert!(matches!(
            Sma::new(20).calculate(&closes),
            Err(AppError::Analysis(_))
        ));
    }
}
