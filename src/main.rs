// =============================================================================
// Flowscope — standalone host process
// =============================================================================
//
// Runs the ingestion engine on its own and logs a periodic summary of the
// aggregates. Embedding applications use the library and `Engine` directly.
// =============================================================================

use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flowscope::runtime_config::EngineConfig;
use flowscope::snapshot::{SnapshotReader, DEFAULT_PROFILE_HALF_WIDTH};
use flowscope::types::SidePolicy;
use flowscope::Engine;

const CONFIG_PATH: &str = "flowscope.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = EngineConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        EngineConfig::default()
    });
    apply_env_overrides(&mut config)?;

    info!(
        url = %config.ws_url,
        products = ?config.product_ids,
        side_policy = %config.side_policy,
        bucket_size = config.bucket_size,
        "Configured feed"
    );

    // ── 2. Start the engine ──────────────────────────────────────────────
    let engine = Engine::start(config)?;

    // ── 3. Periodic summary (every 10 seconds) ───────────────────────────
    let reader = engine.reader();
    let summary = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        loop {
            interval.tick().await;
            log_summary(&reader);
        }
    });

    info!("Engine running. Press Ctrl+C to stop.");

    // ── 4. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received, stopping");

    summary.abort();
    engine.shutdown().await?;

    info!("Flowscope shut down complete.");
    Ok(())
}

/// `FLOWSCOPE_WS_URL`, `FLOWSCOPE_PRODUCTS` and `FLOWSCOPE_SIDE_POLICY` take
/// precedence over the config file.
fn apply_env_overrides(config: &mut EngineConfig) -> anyhow::Result<()> {
    if let Ok(url) = std::env::var("FLOWSCOPE_WS_URL") {
        config.ws_url = url;
    }
    if let Ok(products) = std::env::var("FLOWSCOPE_PRODUCTS") {
        let products: Vec<String> = products
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if !products.is_empty() {
            config.product_ids = products;
        }
    }
    if let Ok(policy) = std::env::var("FLOWSCOPE_SIDE_POLICY") {
        config.side_policy = policy.parse::<SidePolicy>()?;
    }
    Ok(())
}

fn log_summary(reader: &SnapshotReader) {
    let health = reader.health();
    let velocity = reader.velocity();
    let flash = reader.flash();
    let session = reader.session_stats();
    let window = reader.profile_window(DEFAULT_PROFILE_HALF_WIDTH);

    info!(
        state = %health.state,
        messages = health.messages,
        rejected = health.rejected,
        reconnects = health.reconnects,
        last_price = ?reader.last_price(),
        cvd = reader.cvd(),
        divergence = ?reader.cvd_divergence(),
        trades_per_sec = velocity.trades_per_sec,
        buy_ratio_pct = session.buy_ratio_pct,
        flash_bucket = ?flash.active_bucket,
        profile_levels = window.len(),
        hours = reader.hourly_metrics().len(),
        "feed summary"
    );
}
