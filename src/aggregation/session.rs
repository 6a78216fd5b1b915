// =============================================================================
// Session statistics — rolling buy/sell ratios and price change
// =============================================================================
//
// The store keeps the raw recent-trade window plus session totals; ratios
// over each lookback are computed by the reader from a copy.
// =============================================================================

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::{Side, Trade};

/// Trade-count lookbacks reported by [`SessionSnapshot::report`].
pub const LOOKBACKS: [usize; 5] = [50, 100, 200, 500, 1000];

/// Figures over the last `trades` trades.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LookbackStats {
    pub trades: usize,
    /// Buy share of volume, in percent. 0 when there is no volume.
    pub buy_ratio_pct: f64,
    pub buy_cost: f64,
    pub sell_cost: f64,
    /// Percent price change across the lookback. 0 until enough trades exist.
    pub price_change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub lookbacks: Vec<LookbackStats>,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub buy_cost: f64,
    pub sell_cost: f64,
    pub buy_ratio_pct: f64,
    pub price_change_pct: f64,
    pub trade_count: u64,
}

/// Copy of the session state taken under the store lock.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub recent: Vec<Trade>,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub buy_cost: f64,
    pub sell_cost: f64,
    pub first_price: Option<f64>,
    pub trade_count: u64,
}

fn ratio_pct(buy: f64, sell: f64) -> f64 {
    let total = buy + sell;
    if total > 0.0 {
        100.0 * buy / total
    } else {
        0.0
    }
}

fn change_pct(from: f64, to: f64) -> f64 {
    if from != 0.0 {
        (to - from) / from * 100.0
    } else {
        0.0
    }
}

impl SessionSnapshot {
    pub fn lookback(&self, size: usize) -> LookbackStats {
        let window = &self.recent[self.recent.len().saturating_sub(size)..];

        let (mut buy_vol, mut sell_vol, mut buy_cost, mut sell_cost) = (0.0, 0.0, 0.0, 0.0);
        for t in window {
            match t.side {
                Side::Buy => {
                    buy_vol += t.volume;
                    buy_cost += t.cost();
                }
                Side::Sell => {
                    sell_vol += t.volume;
                    sell_cost += t.cost();
                }
            }
        }

        let price_change_pct = if size > 0 && self.recent.len() >= size {
            let start = self.recent[self.recent.len() - size].price;
            let end = self.recent[self.recent.len() - 1].price;
            change_pct(start, end)
        } else {
            0.0
        };

        LookbackStats {
            trades: window.len(),
            buy_ratio_pct: ratio_pct(buy_vol, sell_vol),
            buy_cost,
            sell_cost,
            price_change_pct,
        }
    }

    pub fn report(&self) -> SessionReport {
        let price_change_pct = match (self.first_price, self.recent.last()) {
            (Some(first), Some(last)) if self.trade_count > 1 => change_pct(first, last.price),
            _ => 0.0,
        };

        SessionReport {
            lookbacks: LOOKBACKS.iter().map(|n| self.lookback(*n)).collect(),
            buy_volume: self.buy_volume,
            sell_volume: self.sell_volume,
            buy_cost: self.buy_cost,
            sell_cost: self.sell_cost,
            buy_ratio_pct: ratio_pct(self.buy_volume, self.sell_volume),
            price_change_pct,
            trade_count: self.trade_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionStats {
    recent: VecDeque<Trade>,
    window: usize,
    buy_volume: f64,
    sell_volume: f64,
    buy_cost: f64,
    sell_cost: f64,
    first_price: Option<f64>,
    trade_count: u64,
}

impl SessionStats {
    pub fn new(window: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(window + 1),
            window,
            buy_volume: 0.0,
            sell_volume: 0.0,
            buy_cost: 0.0,
            sell_cost: 0.0,
            first_price: None,
            trade_count: 0,
        }
    }

    pub fn record(&mut self, trade: &Trade) {
        match trade.side {
            Side::Buy => {
                self.buy_volume += trade.volume;
                self.buy_cost += trade.cost();
            }
            Side::Sell => {
                self.sell_volume += trade.volume;
                self.sell_cost += trade.cost();
            }
        }
        self.first_price.get_or_insert(trade.price);
        self.trade_count += 1;

        self.recent.push_back(*trade);
        while self.recent.len() > self.window {
            self.recent.pop_front();
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            recent: self.recent.iter().copied().collect(),
            buy_volume: self.buy_volume,
            sell_volume: self.sell_volume,
            buy_cost: self.buy_cost,
            sell_cost: self.sell_cost,
            first_price: self.first_price,
            trade_count: self.trade_count,
        }
    }
}
