// src/mcp/http.rs
//! HTTP transport: `POST /mcp` carries one JSON-RPC message (or batch) per request.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use super::server;
use crate::state::AppState;

pub const SESSION_HEADER: &str = "mcp-session-id";

pub async fn mcp_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let message: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            let text = String::from_utf8_lossy(&body);
            tracing::warn!("MCP http: rejected body ({} bytes): {}", text.len(), e);
            let error = server::handle_text(&state, &text).await;
            return (StatusCode::BAD_REQUEST, Json(error)).into_response();
        }
    };

    let initializing = is_initialize(&message);

    match server::handle_message(&state, message).await {
        // Notifications and client responses only.
        None => StatusCode::ACCEPTED.into_response(),
        Some(reply) => {
            let mut response = (StatusCode::OK, Json(reply)).into_response();
            if initializing {
                let session_id = uuid::Uuid::new_v4().to_string();
                if let Ok(value) = HeaderValue::from_str(&session_id) {
                    response.headers_mut().insert(SESSION_HEADER, value);
                }
            }
            response
        }
    }
}

fn is_initialize(message: &Value) -> bool {
    let single = |m: &Value| m.get("method").and_then(|v| v.as_str()) == Some("initialize");
    match message {
        Value::Array(items) => items.iter().any(single),
        other => single(other),
    }
}
