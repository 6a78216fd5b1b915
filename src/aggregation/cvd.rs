// =============================================================================
// Cumulative volume delta and price/CVD divergence
// =============================================================================

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::Trade;

/// Samples compared by [`divergence`] unless configured otherwise.
pub const DEFAULT_DIVERGENCE_LOOKBACK: usize = 20;

/// CVD and price after one trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CvdPoint {
    pub event_time: f64,
    pub cvd: f64,
    pub price: f64,
}

/// Disagreement between price direction and order-flow direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Divergence {
    /// Price falling while CVD rises.
    Bullish,
    /// Price rising while CVD falls.
    Bearish,
    None,
}

/// Compare the newest point with the one `lookback - 1` steps earlier.
/// Needs more than `lookback` points.
pub fn divergence(points: &[CvdPoint], lookback: usize) -> Divergence {
    if lookback < 2 || points.len() <= lookback {
        return Divergence::None;
    }
    let now = points[points.len() - 1];
    let then = points[points.len() - lookback];
    let price_slope = now.price - then.price;
    let cvd_slope = now.cvd - then.cvd;

    if price_slope < 0.0 && cvd_slope > 0.0 {
        Divergence::Bullish
    } else if price_slope > 0.0 && cvd_slope < 0.0 {
        Divergence::Bearish
    } else {
        Divergence::None
    }
}

/// Running signed volume sum. Never reset for the lifetime of the store.
#[derive(Debug, Clone)]
pub struct CumulativeDelta {
    value: f64,
    history: VecDeque<CvdPoint>,
    history_len: usize,
}

impl CumulativeDelta {
    pub fn new(history_len: usize) -> Self {
        Self {
            value: 0.0,
            history: VecDeque::with_capacity(history_len + 1),
            history_len,
        }
    }

    pub fn record(&mut self, trade: &Trade) {
        self.value += trade.signed_volume();
        self.history.push_back(CvdPoint {
            event_time: trade.event_time,
            cvd: self.value,
            price: trade.price,
        });
        while self.history.len() > self.history_len {
            self.history.pop_front();
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn history(&self) -> Vec<CvdPoint> {
        self.history.iter().copied().collect()
    }
}
