// =============================================================================
// Aggregation Store — single writer, many readers
// =============================================================================
//
// Every aggregate lives behind one parking_lot::RwLock. The writer holds the
// write lock only for the in-memory updates of one event; validation, cloning
// of ticker payloads and logging happen outside it. Each sub-update is
// infallible once the trade has been validated, so an event is either applied
// in full or not at all.
//
// Flash decay is driven by processed events (trades and tickers alike), not
// by a wall-clock timer, so its visual lifetime depends on feed throughput.
// =============================================================================

pub mod cvd;
pub mod flow;
pub mod hourly;
pub mod profile;
pub mod series;
pub mod session;
pub mod velocity;

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::warn;

use crate::runtime_config::EngineConfig;
use crate::types::{now_secs, FeedEvent, TickerSnapshot, Trade};

pub use cvd::{divergence, CumulativeDelta, CvdPoint, Divergence, DEFAULT_DIVERGENCE_LOOKBACK};
pub use flow::{Direction, HourlyFlow, HourlyOhlc};
pub use hourly::{hour_key, HourBucket, HourlyMetrics};
pub use profile::{price_key, FlashState, PriceBucket, PriceLevel, PriceProfile, ProfileSnapshot};
pub use series::{MicroMomentum, MomentumSample, TradeTape};
pub use session::{LookbackStats, SessionReport, SessionSnapshot, SessionStats};
pub use velocity::{VelocityRates, VelocitySamples, VelocityWindow};

/// All rolling aggregates. Only reachable through [`AggregationStore`].
#[derive(Debug)]
pub(crate) struct Aggregates {
    pub(crate) hourly: HourlyMetrics,
    pub(crate) profile: PriceProfile,
    pub(crate) cvd: CumulativeDelta,
    pub(crate) tape: TradeTape,
    pub(crate) velocity: VelocityWindow,
    pub(crate) momentum: MicroMomentum,
    pub(crate) flow: HourlyFlow,
    pub(crate) session: SessionStats,
    pub(crate) tickers: HashMap<String, TickerSnapshot>,
    pub(crate) events_applied: u64,
}

/// Parameters the store needs from [`EngineConfig`].
#[derive(Debug, Clone, Copy)]
struct StoreLimits {
    flash_decay: f64,
    flash_min_strength: f64,
    hourly_retention_secs: f64,
}

/// Owner of every rolling aggregate derived from the feed.
pub struct AggregationStore {
    limits: StoreLimits,
    state: RwLock<Aggregates>,
}

impl AggregationStore {
    pub fn new(config: &EngineConfig) -> Self {
        let aggregates = Aggregates {
            hourly: HourlyMetrics::default(),
            profile: PriceProfile::new(config.bucket_size),
            cvd: CumulativeDelta::new(config.cvd_history_len),
            tape: TradeTape::new(config.tape_len),
            velocity: VelocityWindow::new(config.velocity_horizon_secs, config.velocity_max_samples),
            momentum: MicroMomentum::new(config.momentum_len),
            flow: HourlyFlow::new(config.ohlc_keep_hours, config.ohlc_trim_threshold),
            session: SessionStats::new(config.session_window),
            tickers: HashMap::new(),
            events_applied: 0,
        };

        Self {
            limits: StoreLimits {
                flash_decay: config.flash_decay,
                flash_min_strength: config.flash_min_strength,
                hourly_retention_secs: config.hourly_retention_secs(),
            },
            state: RwLock::new(aggregates),
        }
    }

    /// Apply one event using the wall clock for eviction and pruning.
    pub fn apply(&self, event: &FeedEvent) -> bool {
        self.apply_at(event, now_secs())
    }

    /// Apply one event as of `now` (epoch seconds). Returns `false` when the
    /// event was ignored; the store is untouched in that case.
    pub fn apply_at(&self, event: &FeedEvent, now: f64) -> bool {
        match event {
            FeedEvent::Trade(trade) => {
                if let Err(reason) = validate_trade(trade) {
                    warn!(reason = %reason, price = trade.price, volume = trade.volume, "ignoring invalid trade");
                    return false;
                }
                self.apply_trade(trade, now);
            }
            FeedEvent::Ticker(snapshot) => {
                let owned = snapshot.clone();
                let mut state = self.state.write();
                self.tick(&mut state, now);
                state.tickers.insert(owned.product_id.clone(), owned);
            }
        }
        true
    }

    fn apply_trade(&self, trade: &Trade, now: f64) {
        let mut state = self.state.write();
        self.tick(&mut state, now);

        // 1. hourly metrics; a late trade may land in an already expired hour
        state.hourly.record(trade);
        state.hourly.evict_before(now - self.limits.hourly_retention_secs);
        // 2-3. price profile and flash pulse
        let bucket = state.profile.record(trade);
        state.profile.arm_flash(bucket);
        // 4. cumulative delta
        state.cvd.record(trade);
        // 5. tape
        state.tape.push(*trade);
        // 6. velocity windows
        state.velocity.record(trade, now);
        // 7. micro-momentum
        state.momentum.record(trade);
        // 8. hourly OHLC flow
        state.flow.record(trade);
        // 9. session statistics
        state.session.record(trade);
    }

    /// Per-event housekeeping shared by trades and tickers.
    fn tick(&self, state: &mut Aggregates, now: f64) {
        state.events_applied += 1;
        state
            .profile
            .tick_flash(self.limits.flash_decay, self.limits.flash_min_strength);
        state.hourly.evict_before(now - self.limits.hourly_retention_secs);
    }

    /// Run `f` against the aggregates under the read lock. `f` must only copy.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&Aggregates) -> R) -> R {
        f(&self.state.read())
    }

    pub fn events_applied(&self) -> u64 {
        self.state.read().events_applied
    }
}

fn validate_trade(trade: &Trade) -> Result<(), &'static str> {
    if !(trade.price.is_finite() && trade.price > 0.0) {
        return Err("price must be finite and positive");
    }
    if !(trade.volume.is_finite() && trade.volume > 0.0) {
        return Err("volume must be finite and positive");
    }
    if !trade.event_time.is_finite() {
        return Err("event time must be finite");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    const NOW: f64 = 1_700_000_000.0;

    fn store() -> AggregationStore {
        AggregationStore::new(&EngineConfig::default())
    }

    fn trade(price: f64, volume: f64, side: Side, t: f64) -> FeedEvent {
        FeedEvent::Trade(Trade::new(price, volume, side, t))
    }

    fn ticker() -> FeedEvent {
        FeedEvent::Ticker(TickerSnapshot {
            product_id: "PF_SOLUSD".into(),
            fields: serde_json::Map::new(),
        })
    }

    #[test]
    fn trade_updates_every_aggregate() {
        let s = store();
        assert!(s.apply_at(&trade(100.30, 2.0, Side::Buy, NOW), NOW));

        s.read(|a| {
            assert_eq!(a.hourly.len(), 1);
            assert_eq!(a.profile.flash().active_bucket, Some(100.5));
            assert_eq!(a.profile.flash().strength, 1.0);
            assert_eq!(a.cvd.value(), 2.0);
            assert_eq!(a.tape.len(), 1);
            assert_eq!(a.velocity.len(), 1);
            assert!(a.momentum.is_empty());
            assert_eq!(a.flow.len(), 1);
        });
        assert_eq!(s.events_applied(), 1);
    }

    #[test]
    fn cvd_nets_buys_and_sells() {
        let s = store();
        s.apply_at(&trade(10.0, 2.0, Side::Buy, NOW), NOW);
        s.apply_at(&trade(10.0, 0.5, Side::Sell, NOW + 1.0), NOW + 1.0);
        assert!((s.read(|a| a.cvd.value()) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn flash_decays_on_ticker_ticks() {
        let s = store();
        s.apply_at(&trade(100.0, 1.0, Side::Buy, NOW), NOW);
        let mut strengths = vec![s.read(|a| a.profile.flash().strength)];
        for _ in 0..2 {
            s.apply_at(&ticker(), NOW);
            strengths.push(s.read(|a| a.profile.flash().strength));
        }
        assert!((strengths[0] - 1.0).abs() < 1e-12);
        assert!((strengths[1] - 0.85).abs() < 1e-12);
        assert!((strengths[2] - 0.7225).abs() < 1e-12);

        for _ in 3..=18 {
            s.apply_at(&ticker(), NOW);
        }
        assert!(s.read(|a| a.profile.flash().active_bucket).is_some());
        s.apply_at(&ticker(), NOW);
        assert_eq!(s.read(|a| a.profile.flash()), FlashState::default());
    }

    #[test]
    fn stale_hour_is_evicted_by_next_apply() {
        let s = store();
        let old = NOW - 25.0 * 3600.0;
        s.apply_at(&trade(50.0, 1.0, Side::Buy, old), old);
        assert!(s.read(|a| a.hourly.snapshot().contains_key(&hour_key(old))));

        s.apply_at(&ticker(), NOW);
        assert!(s.read(|a| a.hourly.is_empty()));
    }

    #[test]
    fn invalid_trade_leaves_store_untouched() {
        let s = store();
        assert!(!s.apply_at(&trade(f64::NAN, 1.0, Side::Buy, NOW), NOW));
        assert!(!s.apply_at(&trade(10.0, -1.0, Side::Sell, NOW), NOW));
        assert_eq!(s.events_applied(), 0);
        assert_eq!(s.read(|a| a.tape.len()), 0);
    }

    #[test]
    fn ticker_is_last_write_wins() {
        let s = store();
        let mut fields = serde_json::Map::new();
        fields.insert("last".into(), serde_json::json!(1.0));
        s.apply_at(&ticker(), NOW);
        s.apply_at(
            &FeedEvent::Ticker(TickerSnapshot {
                product_id: "PF_SOLUSD".into(),
                fields,
            }),
            NOW,
        );
        s.read(|a| {
            assert_eq!(a.tickers.len(), 1);
            assert_eq!(a.tickers["PF_SOLUSD"].fields["last"], serde_json::json!(1.0));
        });
    }

    #[test]
    fn tape_holds_trades_six_to_fifteen() {
        let s = store();
        for i in 1..=15 {
            let t = NOW + i as f64;
            s.apply_at(&trade(100.0 + i as f64, 1.0, Side::Buy, t), t);
        }
        let prices: Vec<f64> = s.read(|a| a.tape.snapshot()).iter().map(|t| t.price).collect();
        assert_eq!(prices, (6..=15).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
    }
}
