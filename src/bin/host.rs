//! ResearchTwin host: loads configuration, opens storage and serves the API.
//!
//! Logging goes to stderr; set `RUST_LOG` to adjust (default `info`).

use std::sync::Arc;

use researchtwin::api::ApiServer;
use researchtwin::{ServiceConfig, TwinService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "researchtwin-host starting");

    let config = ServiceConfig::load()?;
    config.validate()?;
    let addr = config.bind_addr()?;

    let service = Arc::new(TwinService::from_config(&config).await.map_err(|e| {
        tracing::error!(error = %e, "service startup failed");
        anyhow::anyhow!("researchtwin-host failed: {e}")
    })?);

    let server = ApiServer::start(service, addr).await?;
    tracing::info!(addr = %server.addr(), "serving");

    tokio::signal::ctrl_c().await?;
    server.shutdown();

    tracing::info!("researchtwin-host shut down cleanly");
    Ok(())
}
