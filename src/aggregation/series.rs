// =============================================================================
// Short series — trade tape and per-trade micro-momentum
// =============================================================================

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::Trade;

/// Chronological tape of the most recent trades.
#[derive(Debug, Clone)]
pub struct TradeTape {
    entries: VecDeque<Trade>,
    cap: usize,
}

impl TradeTape {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap + 1),
            cap,
        }
    }

    pub fn push(&mut self, trade: Trade) {
        self.entries.push_back(trade);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<Trade> {
        self.entries.iter().copied().collect()
    }
}

/// Price change of one trade relative to the trade before it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumSample {
    pub event_time: f64,
    pub displacement: f64,
}

#[derive(Debug, Clone)]
pub struct MicroMomentum {
    samples: VecDeque<MomentumSample>,
    previous_price: Option<f64>,
    cap: usize,
}

impl MicroMomentum {
    pub fn new(cap: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(cap + 1),
            previous_price: None,
            cap,
        }
    }

    /// The first trade of a session only primes the previous price.
    pub fn record(&mut self, trade: &Trade) {
        if let Some(prev) = self.previous_price {
            self.samples.push_back(MomentumSample {
                event_time: trade.event_time,
                displacement: trade.price - prev,
            });
            while self.samples.len() > self.cap {
                self.samples.pop_front();
            }
        }
        self.previous_price = Some(trade.price);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn snapshot(&self) -> Vec<MomentumSample> {
        self.samples.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    #[test]
    fn tape_keeps_last_entries_in_order() {
        let mut tape = TradeTape::new(10);
        for i in 1..=15 {
            tape.push(Trade::new(100.0 + i as f64, 1.0, Side::Buy, i as f64));
            assert!(tape.len() <= 10);
        }
        let times: Vec<f64> = tape.snapshot().iter().map(|t| t.event_time).collect();
        assert_eq!(times, (6..=15).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn first_trade_produces_no_momentum() {
        let mut m = MicroMomentum::new(300);
        m.record(&Trade::new(100.0, 1.0, Side::Buy, 1.0));
        assert!(m.is_empty());

        m.record(&Trade::new(100.5, 1.0, Side::Sell, 2.0));
        m.record(&Trade::new(100.25, 1.0, Side::Sell, 3.0));
        let s = m.snapshot();
        assert_eq!(s.len(), 2);
        assert_eq!(s[0], MomentumSample { event_time: 2.0, displacement: 0.5 });
        assert_eq!(s[1].displacement, -0.25);
    }

    #[test]
    fn momentum_is_capped() {
        let mut m = MicroMomentum::new(300);
        for i in 0..400 {
            m.record(&Trade::new(i as f64, 1.0, Side::Buy, i as f64));
        }
        let s = m.snapshot();
        assert_eq!(s.len(), 300);
        assert_eq!(s[0].event_time, 100.0);
    }
}
