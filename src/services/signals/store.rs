//! Bounded, deduplicated store of the latest trading signals.

use crate::types::{Signal, Timeframe};
use std::collections::VecDeque;
use tracing::debug;

/// Default number of signals retained across all symbols.
pub const DEFAULT_SIGNAL_CAPACITY: usize = 20;

/// Most-recent-first signal list keyed by (symbol, timeframe).
///
/// The capacity is global: a burst of updates for one symbol can evict
/// signals belonging to other symbols.
#[derive(Debug, Clone)]
pub struct SignalStore {
    signals: VecDeque<Signal>,
    capacity: usize,
}

impl Default for SignalStore {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNAL_CAPACITY)
    }
}

impl SignalStore {
    /// Create a store holding at most `capacity` signals.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            signals: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a signal, superseding any entry with the same key.
    pub fn record(&mut self, signal: Signal) {
        self.signals
            .retain(|existing| !existing.matches(&signal.symbol, signal.timeframe));
        self.signals.push_front(signal);

        while self.signals.len() > self.capacity {
            if let Some(evicted) = self.signals.pop_back() {
                debug!(
                    "Evicted {} {} signal from store",
                    evicted.symbol, evicted.timeframe
                );
            }
        }
    }

    /// All signals, most recent first.
    pub fn all(&self) -> Vec<Signal> {
        self.signals.iter().cloned().collect()
    }

    /// Signals for one symbol, most recent first.
    pub fn for_symbol(&self, symbol: &str) -> Vec<Signal> {
        self.signals
            .iter()
            .filter(|s| s.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
            .collect()
    }

    /// Latest signal for a (symbol, timeframe) pair.
    pub fn get(&self, symbol: &str, timeframe: Timeframe) -> Option<&Signal> {
        self.signals.iter().find(|s| s.matches(symbol, timeframe))
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
