mod config;

use anyhow::Result;
use clap::Parser;
use grid_blob::{GridAdapter, MongoGridStore};
use tracing::info;

use crate::config::{Args, Settings};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = Args::parse().into_settings()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        workers = settings.workers,
        "grid-serve starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(settings.workers)
        .enable_all()
        .build()?;

    runtime.block_on(run(settings))
}

async fn run(settings: Settings) -> Result<()> {
    let store = MongoGridStore::connect(settings.mongo).await?;
    if settings.ensure_indexes {
        store.ensure_indexes().await?;
    }

    let blobs = GridAdapter::new(store, settings.grid);
    let ax = grid_axum::axum(blobs).with_header_timeout(settings.header_timeout);

    ax.listen(settings.listen).await
}
