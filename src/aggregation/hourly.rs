// =============================================================================
// Hourly buy/sell metrics — 24h retention, evicted on every write
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Side, Trade};

/// Start of the hour containing `ts` (epoch seconds).
pub fn hour_key(ts: f64) -> i64 {
    ((ts / 3600.0).floor() * 3600.0) as i64
}

/// Buy/sell volume, cost and counts for one hour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HourBucket {
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub buy_cost: f64,
    pub sell_cost: f64,
    pub buy_count: u64,
    pub sell_count: u64,
    pub trade_count: u64,
}

impl HourBucket {
    fn record(&mut self, trade: &Trade) {
        match trade.side {
            Side::Buy => {
                self.buy_volume += trade.volume;
                self.buy_cost += trade.cost();
                self.buy_count += 1;
            }
            Side::Sell => {
                self.sell_volume += trade.volume;
                self.sell_cost += trade.cost();
                self.sell_count += 1;
            }
        }
        self.trade_count += 1;
    }

    pub fn total_volume(&self) -> f64 {
        self.buy_volume + self.sell_volume
    }

    /// Volume-weighted average buy price, `None` without buys.
    pub fn avg_buy_price(&self) -> Option<f64> {
        (self.buy_volume > 0.0).then(|| self.buy_cost / self.buy_volume)
    }

    /// Volume-weighted average sell price, `None` without sells.
    pub fn avg_sell_price(&self) -> Option<f64> {
        (self.sell_volume > 0.0).then(|| self.sell_cost / self.sell_volume)
    }
}

/// Hour-keyed buckets, sorted by hour.
#[derive(Debug, Clone, Default)]
pub struct HourlyMetrics {
    buckets: BTreeMap<i64, HourBucket>,
}

impl HourlyMetrics {
    pub fn record(&mut self, trade: &Trade) {
        self.buckets
            .entry(hour_key(trade.event_time))
            .or_default()
            .record(trade);
    }

    /// Drop every bucket whose hour starts before `cutoff`. Returns the
    /// number of buckets removed.
    pub fn evict_before(&mut self, cutoff: f64) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|hour, _| *hour as f64 >= cutoff);
        before - self.buckets.len()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<i64, HourBucket> {
        self.buckets.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hour_key_floors_to_hour() {
        assert_eq!(hour_key(3725.0), 3600);
        assert_eq!(hour_key(3600.0), 3600);
        assert_eq!(hour_key(3599.999), 0);
        assert_eq!(hour_key(1_700_000_123.4), 1_699_999_200);
    }

    #[test]
    fn record_splits_by_side() {
        let mut m = HourlyMetrics::default();
        m.record(&Trade::new(100.0, 2.0, Side::Buy, 7200.0));
        m.record(&Trade::new(110.0, 1.0, Side::Sell, 7300.0));
        m.record(&Trade::new(102.0, 2.0, Side::Buy, 7400.0));

        let snap = m.snapshot();
        let b = snap[&7200];
        assert_eq!(b.trade_count, 3);
        assert_eq!(b.buy_count, 2);
        assert_eq!(b.sell_count, 1);
        assert!((b.buy_volume - 4.0).abs() < 1e-12);
        assert!((b.buy_cost - 404.0).abs() < 1e-9);
        assert_eq!(b.avg_buy_price(), Some(101.0));
        assert_eq!(b.avg_sell_price(), Some(110.0));
        assert!((b.total_volume() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn evict_keeps_buckets_inside_window() {
        let mut m = HourlyMetrics::default();
        for hour in 0..30 {
            m.record(&Trade::new(1.0, 1.0, Side::Buy, hour as f64 * 3600.0));
        }
        let now = 29.0 * 3600.0 + 10.0;
        let removed = m.evict_before(now - 24.0 * 3600.0);
        assert_eq!(removed, 6);
        assert_eq!(m.len(), 24);
        assert_eq!(*m.snapshot().keys().next().unwrap(), 6 * 3600);
    }

    #[test]
    fn empty_bucket_has_no_average() {
        assert_eq!(HourBucket::default().avg_buy_price(), None);
    }
}
