// =============================================================================
// Shared types used across the flowscope engine
// =============================================================================

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Parse a venue side string. Anything other than `buy`/`sell` is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            _ => None,
        }
    }

    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// What the normalizer does with a record whose side is missing or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SidePolicy {
    /// Reject the record.
    Drop,
    /// Treat it as a buy. This biases CVD and the price profile toward buys.
    DefaultBuy,
    /// Treat it as a sell.
    DefaultSell,
}

impl Default for SidePolicy {
    fn default() -> Self {
        Self::DefaultBuy
    }
}

impl std::fmt::Display for SidePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Drop => write!(f, "drop"),
            Self::DefaultBuy => write!(f, "default_buy"),
            Self::DefaultSell => write!(f, "default_sell"),
        }
    }
}

impl std::str::FromStr for SidePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "default_buy" | "buy" => Ok(Self::DefaultBuy),
            "default_sell" | "sell" => Ok(Self::DefaultSell),
            other => anyhow::bail!("unknown side policy: {other}"),
        }
    }
}

/// A single normalized trade. Event time is in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub price: f64,
    pub volume: f64,
    pub side: Side,
    pub event_time: f64,
}

impl Trade {
    pub fn new(price: f64, volume: f64, side: Side, event_time: f64) -> Self {
        Self {
            price,
            volume,
            side,
            event_time,
        }
    }

    /// Quote value of the trade (price * volume).
    pub fn cost(&self) -> f64 {
        self.price * self.volume
    }

    /// Volume signed by aggressor side.
    pub fn signed_volume(&self) -> f64 {
        self.side.sign() * self.volume
    }
}

/// Latest ticker payload for one product, kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub product_id: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// A normalized event handed to the aggregation store.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Trade(Trade),
    Ticker(TickerSnapshot),
}

/// Current wall-clock time in epoch seconds.
pub fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_parse_is_case_insensitive() {
        assert_eq!(Side::parse("BUY"), Some(Side::Buy));
        assert_eq!(Side::parse(" sell "), Some(Side::Sell));
        assert_eq!(Side::parse("bid"), None);
    }

    #[test]
    fn signed_volume_follows_side() {
        assert_eq!(Trade::new(10.0, 2.0, Side::Buy, 0.0).signed_volume(), 2.0);
        assert_eq!(Trade::new(10.0, 2.0, Side::Sell, 0.0).signed_volume(), -2.0);
    }

    #[test]
    fn side_policy_from_str_and_serde() {
        assert_eq!("drop".parse::<SidePolicy>().unwrap(), SidePolicy::Drop);
        assert_eq!("Default_Sell".parse::<SidePolicy>().unwrap(), SidePolicy::DefaultSell);
        assert!("maybe".parse::<SidePolicy>().is_err());

        let p: SidePolicy = serde_json::from_str("\"default_buy\"").unwrap();
        assert_eq!(p, SidePolicy::DefaultBuy);
    }
}
