// =============================================================================
// Runtime Configuration — feed endpoint, aggregation bounds, policies
// =============================================================================
//
// Every tunable of the engine lives here. All fields carry a serde default so
// that a partial (or empty) JSON file still loads. Environment overrides are
// applied by the host binary after loading.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregation::DEFAULT_DIVERGENCE_LOOKBACK;
use crate::types::SidePolicy;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_ws_url() -> String {
    "wss://futures.kraken.com/ws/v1".to_string()
}

fn default_product_ids() -> Vec<String> {
    vec!["PF_SOLUSD".to_string()]
}

fn default_recv_timeout_secs() -> u64 {
    5
}

fn default_reconnect_delay_secs() -> u64 {
    3
}

fn default_bucket_size() -> f64 {
    0.5
}

fn default_flash_decay() -> f64 {
    0.85
}

fn default_flash_min_strength() -> f64 {
    0.05
}

fn default_tape_len() -> usize {
    10
}

fn default_momentum_len() -> usize {
    300
}

fn default_hourly_retention_hours() -> u32 {
    24
}

fn default_ohlc_keep_hours() -> usize {
    24
}

fn default_ohlc_trim_threshold() -> usize {
    48
}

fn default_velocity_horizon_secs() -> f64 {
    60.0
}

fn default_velocity_max_samples() -> usize {
    50_000
}

fn default_session_window() -> usize {
    1000
}

fn default_cvd_history_len() -> usize {
    400
}

fn default_divergence_lookback() -> usize {
    DEFAULT_DIVERGENCE_LOOKBACK
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Top-level configuration for the ingestion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- Feed ---------------------------------------------------------------

    /// WebSocket endpoint of the venue.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Products subscribed on both the ticker and trade channels.
    #[serde(default = "default_product_ids")]
    pub product_ids: Vec<String>,

    /// Bounded wait for the next message before a keepalive ping is sent.
    #[serde(default = "default_recv_timeout_secs")]
    pub recv_timeout_secs: u64,

    /// Fixed delay between a connection failure and the next attempt.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Handling of trades with a missing or unknown side.
    #[serde(default)]
    pub side_policy: SidePolicy,

    // --- Aggregation bounds -------------------------------------------------

    /// Price-profile bucket width in quote currency.
    #[serde(default = "default_bucket_size")]
    pub bucket_size: f64,

    /// Multiplier applied to the flash strength on every processed event.
    #[serde(default = "default_flash_decay")]
    pub flash_decay: f64,

    /// Flash is cleared once its strength drops below this value.
    #[serde(default = "default_flash_min_strength")]
    pub flash_min_strength: f64,

    #[serde(default = "default_tape_len")]
    pub tape_len: usize,

    #[serde(default = "default_momentum_len")]
    pub momentum_len: usize,

    /// Hourly buy/sell buckets older than this are evicted on every write.
    #[serde(default = "default_hourly_retention_hours")]
    pub hourly_retention_hours: u32,

    /// Hours of OHLC flow kept after a trim.
    #[serde(default = "default_ohlc_keep_hours")]
    pub ohlc_keep_hours: usize,

    /// The OHLC map is trimmed only once it grows past this many hours.
    #[serde(default = "default_ohlc_trim_threshold")]
    pub ohlc_trim_threshold: usize,

    /// Velocity samples older than this (relative to now) are pruned.
    #[serde(default = "default_velocity_horizon_secs")]
    pub velocity_horizon_secs: f64,

    /// Hard cap on each velocity window.
    #[serde(default = "default_velocity_max_samples")]
    pub velocity_max_samples: usize,

    /// Trades retained for rolling session ratios.
    #[serde(default = "default_session_window")]
    pub session_window: usize,

    #[serde(default = "default_cvd_history_len")]
    pub cvd_history_len: usize,

    /// Number of CVD samples compared for divergence.
    #[serde(default = "default_divergence_lookback")]
    pub divergence_lookback: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            product_ids: default_product_ids(),
            recv_timeout_secs: default_recv_timeout_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            side_policy: SidePolicy::default(),
            bucket_size: default_bucket_size(),
            flash_decay: default_flash_decay(),
            flash_min_strength: default_flash_min_strength(),
            tape_len: default_tape_len(),
            momentum_len: default_momentum_len(),
            hourly_retention_hours: default_hourly_retention_hours(),
            ohlc_keep_hours: default_ohlc_keep_hours(),
            ohlc_trim_threshold: default_ohlc_trim_threshold(),
            velocity_horizon_secs: default_velocity_horizon_secs(),
            velocity_max_samples: default_velocity_max_samples(),
            session_window: default_session_window(),
            cvd_history_len: default_cvd_history_len(),
            divergence_lookback: default_divergence_lookback(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            ws_url = %config.ws_url,
            products = ?config.product_ids,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Check the bounds every aggregate relies on.
    pub fn validate(&self) -> Result<()> {
        if self.product_ids.is_empty() {
            anyhow::bail!("product_ids must not be empty");
        }
        if !(self.bucket_size.is_finite() && self.bucket_size > 0.0) {
            anyhow::bail!("bucket_size must be positive, got {}", self.bucket_size);
        }
        if !(self.flash_decay > 0.0 && self.flash_decay < 1.0) {
            anyhow::bail!("flash_decay must be in (0, 1), got {}", self.flash_decay);
        }
        if !(self.flash_min_strength > 0.0 && self.flash_min_strength < 1.0) {
            anyhow::bail!(
                "flash_min_strength must be in (0, 1), got {}",
                self.flash_min_strength
            );
        }
        if self.tape_len == 0 || self.momentum_len == 0 || self.session_window == 0 {
            anyhow::bail!("tape_len, momentum_len and session_window must be non-zero");
        }
        if self.ohlc_keep_hours == 0 || self.ohlc_trim_threshold < self.ohlc_keep_hours {
            anyhow::bail!(
                "ohlc_trim_threshold ({}) must be >= ohlc_keep_hours ({}) > 0",
                self.ohlc_trim_threshold,
                self.ohlc_keep_hours
            );
        }
        if !(self.velocity_horizon_secs.is_finite() && self.velocity_horizon_secs >= 1.0) {
            anyhow::bail!("velocity_horizon_secs must be at least 1 second");
        }
        if self.velocity_max_samples == 0 {
            anyhow::bail!("velocity_max_samples must be non-zero");
        }
        if self.divergence_lookback < 2 || self.cvd_history_len <= self.divergence_lookback {
            anyhow::bail!(
                "cvd_history_len ({}) must exceed divergence_lookback ({}) >= 2",
                self.cvd_history_len,
                self.divergence_lookback
            );
        }
        Ok(())
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_secs(self.recv_timeout_secs.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    /// Hourly retention expressed in seconds.
    pub fn hourly_retention_secs(&self) -> f64 {
        f64::from(self.hourly_retention_hours) * 3600.0
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.ws_url, "wss://futures.kraken.com/ws/v1");
        assert_eq!(cfg.product_ids, vec!["PF_SOLUSD"]);
        assert_eq!(cfg.side_policy, SidePolicy::DefaultBuy);
        assert!((cfg.bucket_size - 0.5).abs() < f64::EPSILON);
        assert!((cfg.flash_decay - 0.85).abs() < f64::EPSILON);
        assert_eq!(cfg.tape_len, 10);
        assert_eq!(cfg.momentum_len, 300);
        assert_eq!(cfg.ohlc_trim_threshold, 48);
        assert_eq!(cfg.recv_timeout(), Duration::from_secs(5));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.reconnect_delay_secs, 3);
        assert_eq!(cfg.hourly_retention_hours, 24);
        assert_eq!(cfg.session_window, 1000);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "product_ids": ["PF_XBTUSD"], "side_policy": "drop", "bucket_size": 5.0 }"#;
        let cfg: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.product_ids, vec!["PF_XBTUSD"]);
        assert_eq!(cfg.side_policy, SidePolicy::Drop);
        assert!((cfg.bucket_size - 5.0).abs() < f64::EPSILON);
        assert_eq!(cfg.tape_len, 10);
    }

    #[test]
    fn validate_rejects_bad_bounds() {
        let mut cfg = EngineConfig::default();
        cfg.bucket_size = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.flash_decay = 1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.ohlc_trim_threshold = 10;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.product_ids.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_missing_file_is_an_error() {
        assert!(EngineConfig::load("/nonexistent/flowscope.json").is_err());
    }
}
