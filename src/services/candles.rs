//! Live candle aggregation.
//!
//! Merges trade ticks into the last candle of a fetched history series.
//! New candles only ever come from a historical fetch; the aggregator
//! never opens a bucket on its own.

use crate::types::{Candle, Timeframe, TradeTick};
use serde::Serialize;

/// Result of a single merge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    /// The last candle was updated.
    Applied,
    /// The tick would not change high, low or close.
    Unchanged,
    /// Arrived within the throttle interval of the last applied merge.
    Throttled,
    /// The tick belongs to a different bucket than the last candle.
    OutsideBucket,
    /// No candles loaded yet.
    Empty,
}

impl MergeOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MergeOutcome::Applied)
    }
}

/// Candle series for one timeframe with a throttled tick merge.
#[derive(Debug, Clone)]
pub struct CandleAggregator {
    timeframe: Timeframe,
    candles: Vec<Candle>,
    throttle_ms: i64,
    /// Arrival time (ms) of the last applied merge.
    last_merge_ms: Option<i64>,
}

impl CandleAggregator {
    pub fn new(timeframe: Timeframe, throttle_ms: i64) -> Self {
        Self {
            timeframe,
            candles: Vec::new(),
            throttle_ms: throttle_ms.max(0),
            last_merge_ms: None,
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Install a freshly fetched series, replacing the current one.
    pub fn replace(&mut self, candles: Vec<Candle>) {
        self.candles = candles;
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Merge a tick into the last candle.
    ///
    /// `received_at_ms` is the tick's arrival time, used for throttling.
    /// Only the last element of the series is ever mutated.
    pub fn merge(&mut self, tick: &TradeTick, received_at_ms: i64) -> MergeOutcome {
        if let Some(last_merge) = self.last_merge_ms {
            if received_at_ms - last_merge < self.throttle_ms {
                return MergeOutcome::Throttled;
            }
        }

        let bucket = self.timeframe.bucket_start(tick.timestamp);
        let last = match self.candles.last_mut() {
            Some(last) => last,
            None => return MergeOutcome::Empty,
        };

        if bucket != last.time {
            return MergeOutcome::OutsideBucket;
        }

        let price = tick.price;
        if !price.is_finite() || (price <= last.high && price >= last.low && price == last.close)
        {
            return MergeOutcome::Unchanged;
        }

        last.high = last.high.max(price);
        last.low = last.low.min(price);
        last.close = price;
        self.last_merge_ms = Some(received_at_ms);

        MergeOutcome::Applied
    }
}
