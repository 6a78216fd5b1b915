// =============================================================================
// Trade Normalizer — raw feed envelopes to canonical events
// =============================================================================
//
// Envelope-level failures (undecodable JSON, unknown feed tag) reject the
// whole message. Record-level failures reject only that record; the rest of a
// batch still goes through.
// =============================================================================

use serde_json::Value;

use crate::error::FeedError;
use crate::types::{FeedEvent, Side, SidePolicy, TickerSnapshot, Trade};

/// Outcome of normalizing one envelope.
#[derive(Debug, Default)]
pub struct Normalized {
    /// Accepted events, in feed order.
    pub events: Vec<FeedEvent>,
    /// One entry per record that was dropped.
    pub rejected: Vec<FeedError>,
}

/// Where a trade record keeps its timestamp.
#[derive(Debug, Clone, Copy)]
enum TimeField {
    /// Inline trade: `time` in epoch milliseconds.
    Millis,
    /// Batch element: `timestamp` in epoch seconds, `time` (ms) accepted too.
    Batch,
}

/// Converts decoded venue messages into [`FeedEvent`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    side_policy: SidePolicy,
}

impl Normalizer {
    pub fn new(side_policy: SidePolicy) -> Self {
        Self { side_policy }
    }

    /// Decode a text frame and normalize it. `now` is the wall-clock fallback
    /// for records without a timestamp.
    pub fn normalize_text(&self, text: &str, now: f64) -> Result<Normalized, FeedError> {
        let root: Value =
            serde_json::from_str(text).map_err(|e| FeedError::parse("json", e.to_string()))?;
        self.normalize(&root, now)
    }

    /// Normalize an already decoded envelope.
    pub fn normalize(&self, root: &Value, now: f64) -> Result<Normalized, FeedError> {
        let obj = root
            .as_object()
            .ok_or_else(|| FeedError::UnknownMessageShape("envelope is not an object".into()))?;

        // Subscription acks, info and alert frames carry `event`, sometimes
        // alongside the feed they refer to.
        if let Some(event) = obj.get("event").and_then(Value::as_str) {
            return Err(FeedError::UnknownMessageShape(format!("event {event}")));
        }

        let mut out = Normalized::default();

        match obj.get("feed").and_then(Value::as_str) {
            Some("ticker") => match parse_ticker(obj) {
                Ok(snapshot) => out.events.push(FeedEvent::Ticker(snapshot)),
                Err(e) => out.rejected.push(e),
            },
            Some("trade") | Some("trade_snapshot") => {
                if let Some(records) = obj.get("trades").and_then(Value::as_array) {
                    for record in records {
                        self.push_trade(&mut out, record, TimeField::Batch, now);
                    }
                } else {
                    self.push_trade(&mut out, root, TimeField::Millis, now);
                }
            }
            Some(other) => {
                return Err(FeedError::UnknownMessageShape(format!("feed {other}")));
            }
            None => {
                return Err(FeedError::UnknownMessageShape("missing feed tag".into()));
            }
        }

        Ok(out)
    }

    fn push_trade(&self, out: &mut Normalized, record: &Value, time: TimeField, now: f64) {
        match self.parse_trade(record, time, now) {
            Ok(trade) => out.events.push(FeedEvent::Trade(trade)),
            Err(e) => out.rejected.push(e),
        }
    }

    fn parse_trade(&self, record: &Value, time: TimeField, now: f64) -> Result<Trade, FeedError> {
        if !record.is_object() {
            return Err(FeedError::parse("trade", "record is not an object"));
        }

        let price = parse_number(&record["price"], "price")?.ok_or_else(|| FeedError::missing("price"))?;
        let volume = match parse_number(&record["qty"], "qty")? {
            Some(v) => v,
            None => parse_number(&record["volume"], "volume")?
                .ok_or_else(|| FeedError::missing("volume"))?,
        };

        if !(price.is_finite() && price > 0.0) {
            return Err(FeedError::Rejected(format!("non-positive price {price}")));
        }
        if !(volume.is_finite() && volume > 0.0) {
            return Err(FeedError::Rejected(format!("non-positive volume {volume}")));
        }

        let side = match record["side"].as_str().and_then(Side::parse) {
            Some(side) => side,
            None => match self.side_policy {
                SidePolicy::DefaultBuy => Side::Buy,
                SidePolicy::DefaultSell => Side::Sell,
                SidePolicy::Drop => {
                    return Err(FeedError::Rejected(format!(
                        "missing or unknown side {}",
                        record["side"]
                    )));
                }
            },
        };

        let event_time = match time {
            TimeField::Millis => parse_number(&record["time"], "time")?.map(|ms| ms / 1000.0),
            TimeField::Batch => match parse_number(&record["timestamp"], "timestamp")? {
                Some(secs) => Some(secs),
                None => parse_number(&record["time"], "time")?.map(|ms| ms / 1000.0),
            },
        }
        .unwrap_or(now);

        if !event_time.is_finite() {
            return Err(FeedError::parse("time", "non-finite timestamp"));
        }

        Ok(Trade::new(price, volume, side, event_time))
    }
}

fn parse_ticker(obj: &serde_json::Map<String, Value>) -> Result<TickerSnapshot, FeedError> {
    let product_id = obj
        .get("product_id")
        .and_then(Value::as_str)
        .ok_or_else(|| FeedError::missing("product_id"))?
        .to_string();

    Ok(TickerSnapshot {
        product_id,
        fields: obj.clone(),
    })
}

/// Venues send numbers either as JSON numbers or as numeric strings.
/// Absent and `null` fields yield `None`.
fn parse_number(val: &Value, name: &'static str) -> Result<Option<f64>, FeedError> {
    match val {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| FeedError::parse(name, format!("not a valid f64: {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|e| FeedError::parse(name, format!("{e}: {s}"))),
        other => Err(FeedError::parse(name, format!("unexpected JSON type: {other}"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
