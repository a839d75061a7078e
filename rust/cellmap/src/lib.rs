pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod geo;
pub mod ingest;
pub mod locator;
pub mod models;
pub mod reconcile;
pub mod schema;
pub mod sector;
pub mod server;
pub mod state;
pub mod store;
pub mod telemetry;

use crate::{
    config::{AppConfig, SyncConfig},
    reconcile::{ReconcileSummary, ReconciliationJob},
    server::Server,
    store::PgStore,
};
use std::sync::Arc;

/// Bootstraps the HTTP service using environment configuration.
pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    Server::new(config).await?.run().await
}

/// Replays new rows from the source store into the local store once.
pub async fn sync() -> anyhow::Result<ReconcileSummary> {
    let config = SyncConfig::from_env()?;
    let source = db::connect_pool(&config.source, "source").await?;
    let destination = db::connect_pool(&config.destination, "destination").await?;

    let job = ReconciliationJob::new(
        Arc::new(PgStore::new(source)),
        Arc::new(PgStore::new(destination)),
    );
    Ok(job.run().await?)
}
