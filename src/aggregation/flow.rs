// =============================================================================
// Hourly OHLC flow — footprint candles with buy/sell volume split
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::hourly::hour_key;
use crate::types::{Side, Trade};

/// Net price direction of an hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Flat => write!(f, "flat"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlyOhlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub buy_volume: f64,
    pub sell_volume: f64,
}

impl HourlyOhlc {
    fn seeded(price: f64) -> Self {
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            buy_volume: 0.0,
            sell_volume: 0.0,
        }
    }

    pub fn direction(&self) -> Direction {
        if self.close > self.open {
            Direction::Up
        } else if self.close < self.open {
            Direction::Down
        } else {
            Direction::Flat
        }
    }

    pub fn delta(&self) -> f64 {
        self.buy_volume - self.sell_volume
    }
}

/// Hour-keyed candles. Trimming back to `keep` hours only happens once the
/// map grows past `trim_threshold`.
#[derive(Debug, Clone)]
pub struct HourlyFlow {
    hours: BTreeMap<i64, HourlyOhlc>,
    keep: usize,
    trim_threshold: usize,
}

impl HourlyFlow {
    pub fn new(keep: usize, trim_threshold: usize) -> Self {
        Self {
            hours: BTreeMap::new(),
            keep,
            trim_threshold,
        }
    }

    pub fn record(&mut self, trade: &Trade) {
        let candle = self
            .hours
            .entry(hour_key(trade.event_time))
            .and_modify(|c| {
                c.close = trade.price;
                c.high = c.high.max(trade.price);
                c.low = c.low.min(trade.price);
            })
            .or_insert_with(|| HourlyOhlc::seeded(trade.price));

        match trade.side {
            Side::Buy => candle.buy_volume += trade.volume,
            Side::Sell => candle.sell_volume += trade.volume,
        }

        if self.hours.len() > self.trim_threshold {
            while self.hours.len() > self.keep {
                self.hours.pop_first();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<i64, HourlyOhlc> {
        self.hours.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_and_tracks_extremes() {
        let mut flow = HourlyFlow::new(24, 48);
        flow.record(&Trade::new(100.0, 1.0, Side::Buy, 3600.0));
        flow.record(&Trade::new(105.0, 2.0, Side::Sell, 3700.0));
        flow.record(&Trade::new(98.0, 0.5, Side::Buy, 3800.0));
        flow.record(&Trade::new(101.0, 1.0, Side::Buy, 3900.0));

        let c = flow.snapshot()[&3600];
        assert_eq!(c.open, 100.0);
        assert_eq!(c.high, 105.0);
        assert_eq!(c.low, 98.0);
        assert_eq!(c.close, 101.0);
        assert!((c.buy_volume - 2.5).abs() < 1e-12);
        assert!((c.sell_volume - 2.0).abs() < 1e-12);
        assert_eq!(c.direction(), Direction::Up);
    }

    #[test]
    fn first_trade_of_hour_is_flat() {
        let mut flow = HourlyFlow::new(24, 48);
        flow.record(&Trade::new(50.0, 1.0, Side::Sell, 0.0));
        let c = flow.snapshot()[&0];
        assert_eq!(c.direction(), Direction::Flat);
        assert_eq!(c.delta(), -1.0);
    }

    #[test]
    fn trims_with_hysteresis() {
        let mut flow = HourlyFlow::new(24, 48);
        for h in 0..48 {
            flow.record(&Trade::new(10.0, 1.0, Side::Buy, h as f64 * 3600.0));
        }
        // At the threshold nothing is trimmed yet.
        assert_eq!(flow.len(), 48);

        flow.record(&Trade::new(10.0, 1.0, Side::Buy, 48.0 * 3600.0));
        assert_eq!(flow.len(), 24);
        let snap = flow.snapshot();
        assert_eq!(*snap.keys().next().unwrap(), 25 * 3600);
        assert_eq!(*snap.keys().last().unwrap(), 48 * 3600);
    }
}
