// src/lib.rs
//! mcp-clickhouse: an MCP server exposing read-only ClickHouse and chDB tools.

pub mod chdb;
pub mod clickhouse;
pub mod config;
pub mod error;
pub mod health;
pub mod mcp;
pub mod models;
pub mod prompts;
pub mod state;
pub mod tools;

use axum::routing::{get, post};
use axum::Router;

use state::AppState;

/// Build the HTTP transport router with the given state.
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a network port.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/mcp", post(mcp::http::mcp_handler))
        .route("/health", get(health::health))
        .with_state(state)
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
