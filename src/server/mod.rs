// HTTP server module
// Chat, search and status endpoints over the retrieval pipeline

pub mod errors;
pub mod handlers;


use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::database::DocumentIndex;
use crate::generation::TextGenerator;
use crate::retrieval::Retriever;

pub use errors::ApiError;

/// Services shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub retriever: Retriever,
    pub index: Arc<dyn DocumentIndex>,
    pub generator: Arc<dyn TextGenerator>,
    /// Documents retrieved per chat question, and the default search limit
    pub limit: usize,
}

impl AppState {
    #[inline]
    pub fn new(
        retriever: Retriever,
        index: Arc<dyn DocumentIndex>,
        generator: Arc<dyn TextGenerator>,
        limit: usize,
    ) -> Self {
        Self {
            retriever,
            index,
            generator,
            limit,
        }
    }
}

#[inline]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/chat", post(handlers::chat))
        .route("/api/search", post(handlers::search))
        .route("/api/status", get(handlers::status))
        .with_state(state)
}

/// Serve the API on `address` until Ctrl-C
#[inline]
pub async fn serve(state: AppState, address: &str) -> Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    let local = listener
        .local_addr()
        .context("Failed to read listener address")?;

    info!("F1 RAG server listening on http://{}", local);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
