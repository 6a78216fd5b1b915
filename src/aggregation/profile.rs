// =============================================================================
// Price profile — volume by quantized price level, with the flash pulse
// =============================================================================
//
// Buckets are keyed by their integer index `round(price / bucket_size)` so
// the map key is exact; the public price key is `index * bucket_size`.
// The flash decays once per processed event, not on a timer: a quiet market
// keeps the pulse alive longer than a busy one.
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Side, Trade};

/// Bucket index of `price`. Rounds half away from zero.
pub fn price_index(price: f64, bucket_size: f64) -> i64 {
    (price / bucket_size).round() as i64
}

/// Quantized price level containing `price`.
pub fn price_key(price: f64, bucket_size: f64) -> f64 {
    price_index(price, bucket_size) as f64 * bucket_size
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBucket {
    pub buy_volume: f64,
    pub sell_volume: f64,
}

impl PriceBucket {
    pub fn total(&self) -> f64 {
        self.buy_volume + self.sell_volume
    }
}

/// The single active pulse marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlashState {
    /// Price key of the pulsing bucket, `None` once the pulse has faded.
    pub active_bucket: Option<f64>,
    /// Pulse intensity in `[0, 1]`.
    pub strength: f64,
}

/// One row of a profile snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub buy_volume: f64,
    pub sell_volume: f64,
}

/// Point-in-time copy of the profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub bucket_size: f64,
    /// Ascending by price.
    pub levels: Vec<PriceLevel>,
    pub flash: FlashState,
    pub last_price: Option<f64>,
}

impl ProfileSnapshot {
    pub fn total_volume(&self) -> f64 {
        self.levels.iter().map(|l| l.buy_volume + l.sell_volume).sum()
    }

    /// Levels within `buckets` steps of `center` (inclusive).
    pub fn window_around(&self, center: f64, buckets: usize) -> Vec<PriceLevel> {
        let half_width = buckets as f64 * self.bucket_size;
        // Half a bucket of slack absorbs float error on the boundary keys.
        let slack = self.bucket_size / 2.0;
        let (lo, hi) = (center - half_width - slack, center + half_width + slack);
        self.levels
            .iter()
            .filter(|l| l.price >= lo && l.price <= hi)
            .copied()
            .collect()
    }

    pub fn level(&self, price: f64) -> Option<PriceLevel> {
        let idx = price_index(price, self.bucket_size);
        self.levels
            .iter()
            .find(|l| price_index(l.price, self.bucket_size) == idx)
            .copied()
    }
}

#[derive(Debug, Clone)]
pub struct PriceProfile {
    bucket_size: f64,
    buckets: BTreeMap<i64, PriceBucket>,
    flash_index: Option<i64>,
    flash_strength: f64,
    last_price: Option<f64>,
}

impl PriceProfile {
    pub fn new(bucket_size: f64) -> Self {
        Self {
            bucket_size,
            buckets: BTreeMap::new(),
            flash_index: None,
            flash_strength: 0.0,
            last_price: None,
        }
    }

    /// Add the trade's volume to its bucket. Returns the bucket index.
    pub fn record(&mut self, trade: &Trade) -> i64 {
        let idx = price_index(trade.price, self.bucket_size);
        let bucket = self.buckets.entry(idx).or_default();
        match trade.side {
            Side::Buy => bucket.buy_volume += trade.volume,
            Side::Sell => bucket.sell_volume += trade.volume,
        }
        self.last_price = Some(trade.price);
        idx
    }

    /// Point the flash at `idx` at full strength, even mid-decay.
    pub fn arm_flash(&mut self, idx: i64) {
        self.flash_index = Some(idx);
        self.flash_strength = 1.0;
    }

    /// One decay tick. Clears the flash once it falls below `min_strength`.
    pub fn tick_flash(&mut self, decay: f64, min_strength: f64) {
        if self.flash_index.is_none() {
            return;
        }
        self.flash_strength *= decay;
        if self.flash_strength < min_strength {
            self.flash_index = None;
            self.flash_strength = 0.0;
        }
    }

    pub fn flash(&self) -> FlashState {
        FlashState {
            active_bucket: self.flash_index.map(|i| i as f64 * self.bucket_size),
            strength: self.flash_strength,
        }
    }

    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            bucket_size: self.bucket_size,
            levels: self
                .buckets
                .iter()
                .map(|(idx, b)| PriceLevel {
                    price: *idx as f64 * self.bucket_size,
                    buy_volume: b.buy_volume,
                    sell_volume: b.sell_volume,
                })
                .collect(),
            flash: self.flash(),
            last_price: self.last_price,
        }
    }
}
