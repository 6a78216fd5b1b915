// =============================================================================
// Feed error taxonomy
// =============================================================================
//
// Nothing in here is fatal to the process. Connection errors send the
// connector into its reconnect path; everything else drops one record or one
// message and processing continues.
// =============================================================================

/// Errors raised along the ingestion path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeedError {
    /// Socket or protocol failure. Triggers a reconnect.
    #[error("connection error: {0}")]
    Connection(String),

    /// A record is missing a required field or carries an unparsable value.
    #[error("parse error on field {field}: {reason}")]
    Parse { field: &'static str, reason: String },

    /// The envelope carries no recognised channel/feed tag.
    #[error("unknown message shape: {0}")]
    UnknownMessageShape(String),

    /// The record parsed but violates an invariant (non-finite price,
    /// non-positive volume, side dropped by policy).
    #[error("record rejected: {0}")]
    Rejected(String),
}

impl FeedError {
    pub fn parse(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Parse {
            field,
            reason: reason.into(),
        }
    }

    pub fn missing(field: &'static str) -> Self {
        Self::parse(field, "missing field")
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Connection(e.to_string())
    }
}
