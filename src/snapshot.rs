// =============================================================================
// Snapshot Reader — immutable copies of every aggregate
// =============================================================================
//
// Each accessor takes the store's read lock only long enough to copy the
// target aggregate; rates, ratios and divergence are computed afterwards on
// the copy. Accessors never fail: during an outage they return the last known
// state and the connection flag tells the caller the data is stale.
// =============================================================================

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::aggregation::{
    divergence, AggregationStore, CvdPoint, Divergence, FlashState, HourBucket, HourlyOhlc,
    MomentumSample, PriceLevel, ProfileSnapshot, SessionReport, VelocityRates,
    DEFAULT_DIVERGENCE_LOOKBACK,
};
use crate::market_data::{FeedHealth, HealthSnapshot};
use crate::types::{now_secs, TickerSnapshot, Trade};

/// Window used by [`SnapshotReader::velocity`].
pub const DEFAULT_VELOCITY_WINDOW_SECS: f64 = 1.0;

/// Buckets on each side of the last price in [`SnapshotReader::profile_window`].
pub const DEFAULT_PROFILE_HALF_WIDTH: usize = 10;

/// Read handle over the store and feed health. Cheap to clone.
#[derive(Clone)]
pub struct SnapshotReader {
    store: Arc<AggregationStore>,
    health: Arc<FeedHealth>,
    divergence_lookback: usize,
}

impl SnapshotReader {
    pub fn new(store: Arc<AggregationStore>, health: Arc<FeedHealth>) -> Self {
        Self::with_divergence_lookback(store, health, DEFAULT_DIVERGENCE_LOOKBACK)
    }

    pub fn with_divergence_lookback(
        store: Arc<AggregationStore>,
        health: Arc<FeedHealth>,
        divergence_lookback: usize,
    ) -> Self {
        Self {
            store,
            health,
            divergence_lookback,
        }
    }

    // ---------------------------------------------------------------------------
    // Hourly metrics & flow
    // ---------------------------------------------------------------------------

    /// Buy/sell totals per hour, ascending by hour.
    pub fn hourly_metrics(&self) -> BTreeMap<i64, HourBucket> {
        self.store.read(|a| a.hourly.snapshot())
    }

    /// OHLC and per-side volume per hour, ascending by hour.
    pub fn hourly_flow(&self) -> BTreeMap<i64, HourlyOhlc> {
        self.store.read(|a| a.flow.snapshot())
    }

    // ---------------------------------------------------------------------------
    // Price profile
    // ---------------------------------------------------------------------------

    /// Every price bucket plus the flash state and last trade price.
    pub fn price_profile(&self) -> ProfileSnapshot {
        self.store.read(|a| a.profile.snapshot())
    }

    /// Buckets within `half_width` levels of the last trade price. Empty
    /// before the first trade.
    pub fn profile_window(&self, half_width: usize) -> Vec<PriceLevel> {
        let profile = self.price_profile();
        match profile.last_price {
            Some(last) => profile.window_around(last, half_width),
            None => Vec::new(),
        }
    }

    pub fn flash(&self) -> FlashState {
        self.store.read(|a| a.profile.flash())
    }

    pub fn last_price(&self) -> Option<f64> {
        self.store.read(|a| a.profile.last_price())
    }

    // ---------------------------------------------------------------------------
    // Order flow
    // ---------------------------------------------------------------------------

    pub fn cvd(&self) -> f64 {
        self.store.read(|a| a.cvd.value())
    }

    /// Bounded per-trade CVD history, oldest first.
    pub fn cvd_history(&self) -> Vec<CvdPoint> {
        self.store.read(|a| a.cvd.history())
    }

    pub fn cvd_divergence(&self) -> Divergence {
        divergence(&self.cvd_history(), self.divergence_lookback)
    }

    /// The last trades, oldest first. Callers reverse for newest-first display.
    pub fn tape(&self) -> Vec<Trade> {
        self.store.read(|a| a.tape.snapshot())
    }

    /// Rates over the last second of wall-clock time.
    pub fn velocity(&self) -> VelocityRates {
        self.velocity_at(now_secs(), DEFAULT_VELOCITY_WINDOW_SECS)
    }

    /// Rates over `window_secs` ending at `now` (epoch seconds). Only the
    /// samples inside the window are copied, whatever their arrival order.
    pub fn velocity_at(&self, now: f64, window_secs: f64) -> VelocityRates {
        let samples = self.store.read(|a| a.velocity.samples_since(now - window_secs));
        samples.rates(now, window_secs)
    }

    pub fn micro_momentum(&self) -> Vec<MomentumSample> {
        self.store.read(|a| a.momentum.snapshot())
    }

    pub fn session_stats(&self) -> SessionReport {
        self.store.read(|a| a.session.snapshot()).report()
    }

    // ---------------------------------------------------------------------------
    // Tickers & health
    // ---------------------------------------------------------------------------

    /// Last ticker received for `product_id`.
    pub fn ticker(&self, product_id: &str) -> Option<TickerSnapshot> {
        self.store.read(|a| a.tickers.get(product_id).cloned())
    }

    pub fn tickers(&self) -> HashMap<String, TickerSnapshot> {
        self.store.read(|a| a.tickers.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.health.is_connected()
    }

    pub fn health(&self) -> HealthSnapshot {
        self.health.snapshot()
    }

    pub fn events_applied(&self) -> u64 {
        self.store.events_applied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{hour_key, Direction};
    use crate::runtime_config::EngineConfig;
    use crate::types::{FeedEvent, Side};

    const NOW: f64 = 1_700_000_000.0;

    fn reader() -> (Arc<AggregationStore>, SnapshotReader) {
        let store = Arc::new(AggregationStore::new(&EngineConfig::default()));
        let reader = SnapshotReader::new(store.clone(), Arc::new(FeedHealth::new()));
        (store, reader)
    }

    fn apply(store: &AggregationStore, price: f64, volume: f64, side: Side, t: f64) {
        assert!(store.apply_at(&FeedEvent::Trade(Trade::new(price, volume, side, t)), t));
    }

    #[test]
    fn empty_store_reads_defaults() {
        let (_, r) = reader();
        assert!(r.hourly_metrics().is_empty());
        assert!(r.price_profile().levels.is_empty());
        assert_eq!(r.flash(), FlashState::default());
        assert_eq!(r.last_price(), None);
        assert_eq!(r.cvd(), 0.0);
        assert!(r.tape().is_empty());
        assert!(r.micro_momentum().is_empty());
        assert!(r.hourly_flow().is_empty());
        assert!(r.profile_window(DEFAULT_PROFILE_HALF_WIDTH).is_empty());
        assert_eq!(r.cvd_divergence(), Divergence::None);
        assert!(r.ticker("PF_SOLUSD").is_none());
        assert!(!r.is_connected());
        assert_eq!(r.velocity_at(NOW, 1.0).trades_per_sec, 0.0);
    }

    #[test]
    fn copies_do_not_track_later_writes() {
        let (store, r) = reader();
        apply(&store, 100.0, 1.0, Side::Buy, NOW);
        let tape = r.tape();
        let hourly = r.hourly_metrics();

        apply(&store, 101.0, 2.0, Side::Sell, NOW + 1.0);
        assert_eq!(tape.len(), 1);
        assert_eq!(hourly[&hour_key(NOW)].buy_volume, 1.0);
        assert_eq!(r.tape().len(), 2);
        assert!((r.cvd() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn profile_and_flow_reflect_trades() {
        let (store, r) = reader();
        apply(&store, 100.30, 2.0, Side::Buy, NOW);
        apply(&store, 99.10, 1.0, Side::Sell, NOW + 1.0);

        let profile = r.price_profile();
        assert_eq!(profile.level(100.30).map(|l| l.price), Some(100.5));
        assert_eq!(profile.last_price, Some(99.10));
        assert_eq!(r.flash().active_bucket, Some(99.0));
        assert_eq!(r.profile_window(2).len(), 1);

        let flow = r.hourly_flow();
        let candle = flow[&hour_key(NOW)];
        assert_eq!(candle.open, 100.30);
        assert_eq!(candle.close, 99.10);
        assert_eq!(candle.direction(), Direction::Down);

        let momentum = r.micro_momentum();
        assert_eq!(momentum.len(), 1);
        assert!((momentum[0].displacement + 1.2).abs() < 1e-9);
    }

    #[test]
    fn velocity_is_computed_at_read_time() {
        let (store, r) = reader();
        apply(&store, 10.0, 2.0, Side::Buy, NOW - 0.5);
        apply(&store, 10.0, 1.0, Side::Sell, NOW - 0.2);
        apply(&store, 10.0, 4.0, Side::Buy, NOW - 5.0);

        // The late trade at NOW - 5 falls outside the last second only.
        let rates = r.velocity_at(NOW, 1.0);
        assert_eq!(rates.trades_per_sec, 2.0);
        assert_eq!(rates.buy_volume_per_sec, 2.0);
        assert_eq!(rates.sell_volume_per_sec, 1.0);

        let rates = r.velocity_at(NOW, 10.0);
        assert!((rates.trades_per_sec - 0.3).abs() < 1e-12);
        assert!((rates.buy_volume_per_sec - 0.6).abs() < 1e-12);
        assert!((rates.sell_volume_per_sec - 0.1).abs() < 1e-12);
    }

    #[test]
    fn session_stats_and_tickers() {
        let (store, r) = reader();
        apply(&store, 10.0, 3.0, Side::Buy, NOW);
        apply(&store, 20.0, 1.0, Side::Sell, NOW + 1.0);
        let mut fields = serde_json::Map::new();
        fields.insert("last".into(), serde_json::json!(20.0));
        store.apply_at(
            &FeedEvent::Ticker(TickerSnapshot {
                product_id: "PF_SOLUSD".into(),
                fields,
            }),
            NOW + 2.0,
        );

        let report = r.session_stats();
        assert_eq!(report.trade_count, 2);
        assert!((report.buy_ratio_pct - 75.0).abs() < 1e-9);

        assert_eq!(r.ticker("PF_SOLUSD").map(|t| t.fields["last"].clone()), Some(serde_json::json!(20.0)));
        assert_eq!(r.tickers().len(), 1);
        assert_eq!(r.events_applied(), 3);
    }

    #[test]
    fn divergence_uses_configured_lookback() {
        let store = Arc::new(AggregationStore::new(&EngineConfig::default()));
        let r = SnapshotReader::with_divergence_lookback(store.clone(), Arc::new(FeedHealth::new()), 3);
        // Price falls while buyers keep lifting.
        for (i, price) in [10.0, 9.8, 9.6, 9.4].iter().enumerate() {
            apply(&store, *price, 1.0, Side::Buy, NOW + i as f64);
        }
        assert_eq!(r.cvd_divergence(), Divergence::Bullish);
    }
}
