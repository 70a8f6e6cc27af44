//! photovault server
//!
//! HTTP service of the photo archive: batch uploads are deduplicated and
//! stored under the data directory, previews are served from the content
//! cache.

mod config;
mod dto;
mod handlers;
mod routes;
mod source;

use std::sync::Arc;

use anyhow::{Context, Result};
use photovault_catalog::SqliteCatalog;
use photovault_domain::photo::PhotoService;
use photovault_domain::BatchIngestionService;
use photovault_fs::{ImageCache, LocalImageStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ingestion: Arc<BatchIngestionService<LocalImageStore, SqliteCatalog>>,
    pub photos: Arc<PhotoService<LocalImageStore, SqliteCatalog>>,
    pub store: Arc<LocalImageStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting photovault server");

    let config = ServerConfig::from_env()?;
    config.log_summary();

    let files_dir = config.files_dir();
    tokio::fs::create_dir_all(&files_dir)
        .await
        .with_context(|| format!("creating {}", files_dir.display()))?;

    let cache = Arc::new(ImageCache::new(config.cache_config()));
    let store = Arc::new(LocalImageStore::new(files_dir, cache));
    let catalog = Arc::new(
        SqliteCatalog::open(config.catalog_path())
            .await
            .context("opening the photo catalog")?,
    );

    let state = AppState {
        ingestion: Arc::new(BatchIngestionService::new(
            store.clone(),
            catalog.clone(),
            config.batch_config(),
        )),
        photos: Arc::new(PhotoService::new(store.clone(), catalog.clone())),
        store: store.clone(),
    };

    let app = routes::create_router(state);

    let addr = config.bind_addr();
    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close();
    catalog.close().await;
    info!("photovault server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
