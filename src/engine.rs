// =============================================================================
// Engine — store construction, connector task, explicit shutdown
// =============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::aggregation::AggregationStore;
use crate::market_data::{FeedConnector, FeedHealth};
use crate::runtime_config::EngineConfig;
use crate::snapshot::SnapshotReader;

/// Running ingestion engine. Dropping the handle also stops the connector,
/// since its shutdown receiver then resolves; [`Engine::shutdown`] additionally
/// waits for the task to finish.
pub struct Engine {
    reader: SnapshotReader,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Engine {
    /// Validate `config`, build the store and spawn the connector on the
    /// current tokio runtime.
    pub fn start(config: EngineConfig) -> Result<Self> {
        config.validate().context("invalid engine config")?;

        let store = Arc::new(AggregationStore::new(&config));
        let health = Arc::new(FeedHealth::new());
        let reader =
            SnapshotReader::with_divergence_lookback(store.clone(), health.clone(), config.divergence_lookback);

        info!(
            url = %config.ws_url,
            products = ?config.product_ids,
            side_policy = %config.side_policy,
            "starting ingestion engine"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let connector = FeedConnector::new(config, store, health);
        let task = tokio::spawn(async move { connector.run(shutdown_rx).await });

        Ok(Self {
            reader,
            shutdown_tx,
            task,
        })
    }

    pub fn reader(&self) -> SnapshotReader {
        self.reader.clone()
    }

    /// Signal the connector, close the socket and wait for the task to end.
    pub async fn shutdown(self) -> Result<()> {
        // The receiver lives inside the task; if it is already gone the task
        // has finished and the join below returns immediately.
        let _ = self.shutdown_tx.send(true);
        self.task.await.context("feed connector task panicked")?;
        info!("ingestion engine stopped");
        Ok(())
    }
}
