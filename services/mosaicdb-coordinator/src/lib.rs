//! HTTP coordinator service: wires the MosaicDB library crates into a
//! runnable `axum` server.

pub mod bootstrap;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod rest;
pub mod state;

pub use rest::build_router;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

use mosaicdb_core::{Embedder, MosaicConfig, MosaicError, MosaicResult, ZeroVectorEmbedder};
use tokio::net::TcpListener;
use tracing::info;

/// Boots the coordinator: loads configuration, wires every collaborator,
/// and serves the REST surface until shutdown.
pub async fn run_server() -> MosaicResult<()> {
    let config = MosaicConfig::load().map_err(|e| MosaicError::internal(format!("config error: {e}")))?;

    let storage_root = std::env::var("MOSAICDB_STORAGE_ROOT").unwrap_or_else(|_| "./data".to_string());
    let storage_root = std::path::PathBuf::from(storage_root);
    std::fs::create_dir_all(&storage_root)
        .map_err(|e| MosaicError::internal(format!("failed to create storage root: {e}")))?;

    let embedder: Arc<dyn Embedder> = Arc::new(ZeroVectorEmbedder::new(config.routing.dimension));

    let state = bootstrap::bootstrap(config, &storage_root, embedder)?;
    let app = rest::build_router(state);

    let bind_address = std::env::var("MOSAICDB_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|e| MosaicError::invalid_input(format!("invalid bind address '{bind_address}': {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| MosaicError::internal(format!("failed to bind to {addr}: {e}")))?;

    info!(%addr, "mosaicdb coordinator listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| MosaicError::internal(format!("server error: {e}")))?;

    info!("mosaicdb coordinator shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

