//! Risk-managed trade levels derived from ATR.

use super::indicators::Atr;
use crate::error::Result;
use crate::types::{Candle, SignalKind, TradingLevels};

/// Stop distance in ATR units.
pub const RISK_MULTIPLIER: f64 = 1.5;

/// Target distance in ATR units.
pub const REWARD_MULTIPLIER: f64 = 3.0;

/// Round to 8 decimal places.
pub fn round8(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

/// Compute entry, take-profit and stop-loss for a classified signal.
///
/// Neutral signals carry no levels. The risk/reward ratio is fixed by the
/// multipliers and never depends on the ATR.
pub fn trading_levels(candles: &[Candle], kind: SignalKind) -> Result<Option<TradingLevels>> {
    let direction = match kind {
        SignalKind::Buy => 1.0,
        SignalKind::Sell => -1.0,
        SignalKind::Neutral => return Ok(None),
    };

    let atr = Atr::default().calculate(candles)?;
    let current_price = match candles.last() {
        Some(candle) => candle.close,
        None => return Ok(None),
    };

    let stop_loss = current_price - direction * atr * RISK_MULTIPLIER;
    let take_profit = current_price + direction * atr * REWARD_MULTIPLIER;

    Ok(Some(TradingLevels {
        entry: round8(current_price),
        take_profit: round8(take_profit),
        stop_loss: round8(stop_loss),
        risk_reward_ratio: REWARD_MULTIPLIER / RISK_MULTIPLIER,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(count: usize, spread: f64) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let close = 100.0 + i as f64;
                Candle {
                    time: i as i64 * 3600,
                    open: close - 1.0,
                    high: close + spread,
                    low: close - 1.0 - spread,
                    close,
                    volume: 10.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_neutral_has_no_levels() {
        assert_eq!(trading_levels(&ramp(60, 0.5), SignalKind::Neutral).unwrap(), None);
    }

    #[test]
    fn test_buy_levels_ordering() {
        let levels = trading_levels(&ramp(60, 0.5), SignalKind::Buy).unwrap().unwrap();
        assert!(levels.stop_loss < levels.entry);
        assert!(levels.entry < levels.take_profit);
        assert_eq!(levels.risk_reward_ratio, 2.0);
    }

    #[test]
    fn test_sell_levels_ordering() {
        let levels = trading_levels(&ramp(60, 0.5), SignalKind::Sell).unwrap().unwrap();
        assert!(levels.take_profit < levels.entry);
        assert!(levels.entry < levels.stop_loss);
        assert_eq!(levels.risk_reward_ratio, 2.0);
    }

    #[test]
    fn test_risk_reward_independent_of_volatility() {
        for spread in [0.0, 0.5, 5.0, 250.0] {
            let levels = trading_levels(&ramp(60, spread), SignalKind::Buy).unwrap().unwrap();
            assert_eq!(levels.risk_reward_ratio, 2.0);
        }
    }

    #[test]
    fn test_ascending_scenario_levels() {
        // Closes 100..=150; each candle spans [close - 1.5, close + 0.5].
        // TR = 2.0 for the first candle of the window, 2.0 afterwards
        // (previous close sits inside the range), so ATR = 2.0.
        let candles = ramp(51, 0.5);
        let levels = trading_levels(&candles, SignalKind::Buy).unwrap().unwrap();
        assert_eq!(levels.entry, 150.0);
        assert_eq!(levels.take_profit, 150.0 + 2.0 * 3.0);
        assert_eq!(levels.stop_loss, 150.0 - 2.0 * 1.5);
        assert_eq!(levels.risk_reward_ratio, 2.0);
    }

    #[test]
    fn test_sub_unit_prices_rounded_to_eight_places() {
        let candles: Vec<Candle> = (0..20)
            .map(|i| Candle {
                time: i,
                open: 0.000012345,
                high: 0.0000123456789,
                low: 0.0000123,
                close: 0.00001234567891,
                volume: 1.0,
            })
            .collect();
        let levels = trading_levels(&candles, SignalKind::Buy).unwrap().unwrap();
        assert_eq!(levels.entry, 0.00001235);
    }

    #[test]
    fn test_round8() {
        assert_eq!(round8(1.234567891), 1.23456789);
        assert_eq!(round8(150.0), 150.0);
    }
}
