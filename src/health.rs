// src/health.rs
//! Health endpoint
//!
//! GET /health: plain text, 200 when ClickHouse answers, 503 otherwise.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;

use crate::state::AppState;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn health(State(state): State<AppState>) -> (StatusCode, String) {
    let Some(client) = state.clickhouse.as_ref() else {
        return if state.config.chdb.enabled {
            (StatusCode::OK, "OK - MCP server running with chDB enabled".to_string())
        } else {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "ERROR - Both ClickHouse and chDB are disabled".to_string(),
            )
        };
    };

    match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, client.server_version()).await {
        Ok(Ok(version)) => (StatusCode::OK, format!("OK - Connected to ClickHouse {}", version)),
        Ok(Err(e)) => {
            tracing::warn!("health: ClickHouse unreachable: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("ERROR - Cannot connect to ClickHouse: {}", e),
            )
        }
        Err(_) => {
            tracing::warn!("health: timed out after {}s", HEALTH_CHECK_TIMEOUT.as_secs());
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "ERROR - Health check timed out".to_string(),
            )
        }
    }
}
