// =============================================================================
// Feed Connector — subscribe, receive, keepalive, reconnect
// =============================================================================
//
// One long-lived task owns the venue connection. A session is one connect
// plus subscribe plus receive loop; any transport failure ends the session
// and the outer loop reconnects after a fixed delay, forever, until the
// shutdown signal fires.
// =============================================================================

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use futures_util::{Sink, SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::normalizer::Normalizer;
use crate::aggregation::AggregationStore;
use crate::error::FeedError;
use crate::runtime_config::EngineConfig;
use crate::types::now_secs;

/// Channels subscribed on every connect.
const CHANNELS: [&str; 2] = ["ticker", "trade"];

/// Upper bound on delivering the close frame during shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Connection health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
    Streaming,
    Reconnecting,
    /// Only entered after an explicit shutdown.
    Stopped,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Subscribed => write!(f, "Subscribed"),
            Self::Streaming => write!(f, "Streaming"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Point-in-time copy of [`FeedHealth`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub connected: bool,
    pub state: ConnectionState,
    pub sessions: u64,
    pub reconnects: u64,
    pub messages: u64,
    pub rejected: u64,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Connection health shared between the connector and readers.
pub struct FeedHealth {
    connected: AtomicBool,
    state: RwLock<ConnectionState>,
    sessions: AtomicU64,
    reconnects: AtomicU64,
    messages: AtomicU64,
    rejected: AtomicU64,
    /// Epoch milliseconds of the last received frame, 0 before the first.
    last_message_ms: AtomicI64,
}

impl FeedHealth {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            state: RwLock::new(ConnectionState::Disconnected),
            sessions: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            messages: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            last_message_ms: AtomicI64::new(0),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        self.connected.store(
            matches!(state, ConnectionState::Subscribed | ConnectionState::Streaming),
            Ordering::Release,
        );
    }

    fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        self.last_message_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let last_ms = self.last_message_ms.load(Ordering::Relaxed);
        HealthSnapshot {
            connected: self.is_connected(),
            state: self.state(),
            sessions: self.sessions.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            messages: self.messages.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            last_message_at: (last_ms > 0)
                .then(|| Utc.timestamp_millis_opt(last_ms).single())
                .flatten(),
        }
    }
}

impl Default for FeedHealth {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// How a session ended without a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
}

/// Owns the venue connection and drives normalizer + store.
pub struct FeedConnector {
    config: EngineConfig,
    normalizer: Normalizer,
    store: Arc<AggregationStore>,
    health: Arc<FeedHealth>,
}

impl FeedConnector {
    pub fn new(config: EngineConfig, store: Arc<AggregationStore>, health: Arc<FeedHealth>) -> Self {
        Self {
            normalizer: Normalizer::new(config.side_policy),
            config,
            store,
            health,
        }
    }

    /// One subscribe request per channel, sent right after connecting.
    ///
    /// ```json
    /// {"event":"subscribe","feed":"trade","product_ids":["PF_SOLUSD"]}
    /// ```
    pub fn subscribe_messages(&self) -> Vec<String> {
        CHANNELS
            .iter()
            .map(|feed| {
                serde_json::json!({
                    "event": "subscribe",
                    "feed": feed,
                    "product_ids": self.config.product_ids,
                })
                .to_string()
            })
            .collect()
    }

    /// Run sessions back to back until `shutdown` turns true (or its sender
    /// is dropped). Transport failures never escape this loop.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let delay = self.config.reconnect_delay();

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.health.set_state(ConnectionState::Connecting);
            match self.run_session(&mut shutdown).await {
                Ok(SessionEnd::Shutdown) => break,
                Err(e) => {
                    error!(url = %self.config.ws_url, error = ?e, "feed session failed");
                }
            }

            self.health.set_state(ConnectionState::Reconnecting);
            self.health.reconnects.fetch_add(1, Ordering::Relaxed);
            warn!(delay_secs = delay.as_secs(), "feed disconnected, reconnecting");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        self.health.set_state(ConnectionState::Stopped);
        info!("feed connector stopped");
    }

    async fn run_session(&self, shutdown: &mut watch::Receiver<bool>) -> Result<SessionEnd> {
        let url = self.config.ws_url.as_str();
        info!(url = %url, products = ?self.config.product_ids, "connecting to feed WebSocket");

        let (ws_stream, _response) = tokio::select! {
            res = connect_async(url) => res.context("failed to connect to feed WebSocket")?,
            _ = wait_for_shutdown(shutdown) => return Ok(SessionEnd::Shutdown),
        };
        let (mut write, mut read) = ws_stream.split();

        for request in self.subscribe_messages() {
            write
                .send(Message::Text(request))
                .await
                .context("failed to send subscribe request")?;
        }

        self.health.sessions.fetch_add(1, Ordering::Relaxed);
        self.health.set_state(ConnectionState::Subscribed);
        info!(url = %url, "feed WebSocket subscribed");

        let recv_timeout = self.config.recv_timeout();
        loop {
            let next = tokio::select! {
                biased;
                _ = wait_for_shutdown(shutdown) => {
                    send_close(&mut write, CLOSE_TIMEOUT).await;
                    return Ok(SessionEnd::Shutdown);
                }
                next = tokio::time::timeout(recv_timeout, read.next()) => next,
            };

            match next {
                Err(_elapsed) => {
                    debug!("no feed message within timeout, sending keepalive ping");
                    write
                        .send(Message::Ping(Vec::new()))
                        .await
                        .context("failed to send keepalive ping")?;
                }
                Ok(Some(Ok(Message::Text(text)))) => {
                    if self.health.state() != ConnectionState::Streaming {
                        self.health.set_state(ConnectionState::Streaming);
                    }
                    self.handle_text(&text);
                }
                Ok(Some(Ok(Message::Close(frame)))) => {
                    return Err(FeedError::Connection(format!("closed by peer: {frame:?}")).into());
                }
                // Pong replies to pings are queued by tungstenite itself.
                Ok(Some(Ok(_))) => {}
                Ok(Some(Err(e))) => {
                    return Err(anyhow::Error::new(FeedError::from(e)).context("feed WebSocket read error"));
                }
                Ok(None) => {
                    return Err(FeedError::Connection("stream ended".into()).into());
                }
            }
        }
    }

    /// Normalize one text frame and apply the resulting events. Parsing and
    /// logging happen outside the store lock.
    pub(crate) fn handle_text(&self, text: &str) {
        self.health.record_message();

        match self.normalizer.normalize_text(text, now_secs()) {
            Ok(normalized) => {
                for e in &normalized.rejected {
                    self.health.record_rejected();
                    warn!(error = %e, "dropping malformed feed record");
                }
                for event in &normalized.events {
                    self.store.apply(event);
                }
            }
            Err(FeedError::UnknownMessageShape(shape)) => {
                debug!(shape = %shape, "ignoring feed message");
            }
            Err(e) => {
                self.health.record_rejected();
                warn!(error = %e, "failed to parse feed message");
            }
        }
    }
}

/// Best-effort close frame. A peer that stopped reading cannot hold up
/// shutdown past `limit`.
async fn send_close<S>(write: &mut S, limit: Duration)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    match tokio::time::timeout(limit, write.send(Message::Close(None))).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "close frame not delivered"),
        Err(_) => warn!(timeout_ms = limit.as_millis() as u64, "close frame timed out"),
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
