//! Runs the category and product consumer groups until Ctrl-C/SIGTERM.

use anyhow::{Context, bail};
use tracing::info;

use catalog_api::app::services;
use catalog_api::shutdown;
use catalog_infra::CatalogConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    catalog_observability::init();

    let config = CatalogConfig::from_env().context("invalid configuration")?;
    let backends = services::connect_backends(&config)
        .await
        .context("failed to connect backends")?;

    if backends.in_process {
        bail!("catalog-consumer needs a shared broker; set REDIS_URL and build with the `redis` feature");
    }

    let workers = services::spawn_consumers(&backends, &config)
        .await
        .context("failed to start consumers")?;
    info!(groups = workers.len(), "consumers running");

    shutdown::signal().await;
    info!("shutdown requested");

    for worker in workers {
        worker.shutdown().await;
    }
    info!("shut down");
    Ok(())
}
