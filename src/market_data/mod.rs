pub mod feed;
pub mod normalizer;

pub use feed::{ConnectionState, FeedConnector, FeedHealth, HealthSnapshot};
pub use normalizer::{Normalized, Normalizer};
