// =============================================================================
// Velocity windows — time-pruned trade and per-side volume samples
// =============================================================================

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::{Side, Trade};

/// Per-second rates over a trailing window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityRates {
    pub window_secs: f64,
    pub trades_per_sec: f64,
    pub buy_volume_per_sec: f64,
    pub sell_volume_per_sec: f64,
}

/// Copied tail of the windows, newest samples only.
#[derive(Debug, Clone, Default)]
pub struct VelocitySamples {
    pub trades: Vec<f64>,
    pub buys: Vec<(f64, f64)>,
    pub sells: Vec<(f64, f64)>,
}

impl VelocitySamples {
    /// Rates over the `window_secs` ending at `now`. A sample at exactly
    /// `now - window_secs` counts.
    pub fn rates(&self, now: f64, window_secs: f64) -> VelocityRates {
        let cutoff = now - window_secs;
        let trades = self.trades.iter().filter(|ts| **ts >= cutoff).count();
        let buy: f64 = self
            .buys
            .iter()
            .filter(|(ts, _)| *ts >= cutoff)
            .map(|(_, v)| v)
            .sum();
        let sell: f64 = self
            .sells
            .iter()
            .filter(|(ts, _)| *ts >= cutoff)
            .map(|(_, v)| v)
            .sum();

        VelocityRates {
            window_secs,
            trades_per_sec: trades as f64 / window_secs,
            buy_volume_per_sec: buy / window_secs,
            sell_volume_per_sec: sell / window_secs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VelocityWindow {
    trades: VecDeque<f64>,
    buys: VecDeque<(f64, f64)>,
    sells: VecDeque<(f64, f64)>,
    horizon_secs: f64,
    max_samples: usize,
}

impl VelocityWindow {
    pub fn new(horizon_secs: f64, max_samples: usize) -> Self {
        Self {
            trades: VecDeque::new(),
            buys: VecDeque::new(),
            sells: VecDeque::new(),
            horizon_secs,
            max_samples,
        }
    }

    pub fn record(&mut self, trade: &Trade, now: f64) {
        self.trades.push_back(trade.event_time);
        let sample = (trade.event_time, trade.volume);
        match trade.side {
            Side::Buy => self.buys.push_back(sample),
            Side::Sell => self.sells.push_back(sample),
        }
        self.prune(now);
    }

    /// Drop samples older than the horizon, then enforce the hard cap.
    pub fn prune(&mut self, now: f64) {
        let cutoff = now - self.horizon_secs;
        while self.trades.front().is_some_and(|ts| *ts < cutoff) {
            self.trades.pop_front();
        }
        for side in [&mut self.buys, &mut self.sells] {
            while side.front().is_some_and(|(ts, _)| *ts < cutoff) {
                side.pop_front();
            }
        }

        while self.trades.len() > self.max_samples {
            self.trades.pop_front();
        }
        for side in [&mut self.buys, &mut self.sells] {
            while side.len() > self.max_samples {
                side.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Copy the samples at or after `since`. The whole window is scanned, so
    /// trades delivered out of order are still counted.
    pub fn samples_since(&self, since: f64) -> VelocitySamples {
        VelocitySamples {
            trades: self.trades.iter().filter(|ts| **ts >= since).copied().collect(),
            buys: self.buys.iter().filter(|(ts, _)| *ts >= since).copied().collect(),
            sells: self.sells.iter().filter(|(ts, _)| *ts >= since).copied().collect(),
        }
    }
}
