use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use catalog_api::app::{self, AppServices, services};
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

    // An in-memory broker is only reachable from this process.
    let workers = if backends.in_process {
        info!("running consumers in-process");
        services::spawn_consumers(&backends, &config)
            .await
            .context("failed to start consumers")?
    } else {
        Vec::new()
    };

    let state = Arc::new(AppServices::from_backends(&backends, &config));
    let app = app::build_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::signal())
        .await
        .context("server error")?;

    for worker in workers {
        worker.shutdown().await;
    }
    info!("shut down");
    Ok(())
}
