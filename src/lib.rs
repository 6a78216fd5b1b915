//! Flowscope: market-trade ingestion engine.
//!
//! Keeps one streaming subscription to a derivatives venue alive, normalizes
//! trade and ticker messages, and folds every trade into a set of rolling
//! aggregates that readers copy out at their own cadence.
//!
//! # Architecture
//!
//! ```text
//!   venue WebSocket
//!          │
//!   ┌──────▼───────┐
//!   │FeedConnector │  ← subscribe, keepalive, reconnect, shutdown
//!   └──────┬───────┘
//!          │ text frames
//!   ┌──────▼───────┐
//!   │ Normalizer   │  ← FeedEvent::Trade / FeedEvent::Ticker
//!   └──────┬───────┘
//!          │ one writer
//!   ┌──────▼───────────────────────────────────────┐
//!   │ AggregationStore (single RwLock)             │
//!   │  hourly · profile+flash · cvd · tape         │
//!   │  velocity · momentum · hourly OHLC · session │
//!   └──────┬───────────────────────────────────────┘
//!          │ copies
//!   ┌──────▼───────┐
//!   │SnapshotReader│  ← many readers
//!   └──────────────┘
//! ```

pub mod aggregation;
pub mod engine;
pub mod error;
pub mod market_data;
pub mod runtime_config;
pub mod snapshot;
pub mod types;

pub use aggregation::AggregationStore;
pub use engine::Engine;
pub use error::FeedError;
pub use market_data::{ConnectionState, FeedConnector, FeedHealth, HealthSnapshot, Normalizer};
pub use runtime_config::EngineConfig;
pub use snapshot::SnapshotReader;
pub use types::{FeedEvent, Side, SidePolicy, TickerSnapshot, Trade};
