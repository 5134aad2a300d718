//! wayback-proxy entry point.
//!
//! Boots an HTTP proxy that answers every request with the archived copy of
//! the requested URL at the active timestamp. Logs go to stderr as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use waybackproxy_client::{ArchiveClient, Coordinator, FetchConfig};
use waybackproxy_core::{AppConfig, CacheDb, RecordStore, TimestampCell};

mod admin;
mod error;
mod history;
mod proxy;
mod router;
mod state;

use history::UrlHistory;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache at {}", config.db_path.display()))?;
    let store: Arc<dyn RecordStore> = Arc::new(db);

    let fetcher = ArchiveClient::new(FetchConfig::from(&config))?;
    let timestamp = TimestampCell::new(config.initial_timestamp());
    let coordinator =
        Coordinator::new(Arc::clone(&store), Arc::new(fetcher), timestamp.clone(), config.max_concurrent_fetches);

    let state = AppState::new(coordinator, store, UrlHistory::new(config.history_len), config.admin_path.clone());
    let app = router::build(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(
        %addr,
        timestamp = %timestamp.load(),
        archive = %config.archive_base_url,
        admin = config.admin_path.as_deref().unwrap_or("disabled"),
        "wayback-proxy listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("wayback-proxy stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
