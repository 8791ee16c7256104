// src/mcp/server.rs
//! MCP server: JSON-RPC 2.0 dispatch shared by the stdio and HTTP transports.
//!
//! Supported methods:
//! - `initialize`: server info, capabilities, protocol version negotiation
//! - `notifications/*`: client notifications (no response)
//! - `ping`: liveness
//! - `tools/list` / `tools/call`: ClickHouse and chDB tools
//! - `prompts/list` / `prompts/get`: chDB guidance prompt
//! - `resources/list`: always empty
//!
//! Batches (JSON arrays) are answered with an array of the non-notification
//! responses.

use serde_json::{json, Value};

use crate::error::ToolError;
use crate::prompts;
use crate::state::AppState;
use crate::tools;

pub const SERVER_NAME: &str = "mcp-clickhouse";

/// Newest first; the first entry is offered when the client asks for an
/// unsupported version.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Handle one raw message (a line on stdio, a body over HTTP).
/// Returns `None` when nothing should be sent back.
pub async fn handle_text(state: &AppState, text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(message) => handle_message(state, message).await,
        Err(e) => {
            tracing::warn!("MCP: unparseable message: {}", e);
            Some(json_rpc_error(Value::Null, PARSE_ERROR, &format!("Parse error: {}", e)))
        }
    }
}

/// Handle a parsed message: a single request/notification or a batch.
pub async fn handle_message(state: &AppState, message: Value) -> Option<Value> {
    match message {
        Value::Array(items) => {
            if items.is_empty() {
                return Some(json_rpc_error(Value::Null, INVALID_REQUEST, "Empty batch"));
            }
            let mut responses = Vec::with_capacity(items.len());
            for item in items {
                if let Some(response) = handle_single(state, item).await {
                    responses.push(response);
                }
            }
            (!responses.is_empty()).then_some(Value::Array(responses))
        }
        single => handle_single(state, single).await,
    }
}

async fn handle_single(state: &AppState, request: Value) -> Option<Value> {
    let Some(obj) = request.as_object() else {
        return Some(json_rpc_error(Value::Null, INVALID_REQUEST, "Request must be an object"));
    };

    let id = obj.get("id").cloned();
    let Some(method) = obj.get("method").and_then(|m| m.as_str()) else {
        // Responses to server-initiated requests carry no method; nothing to answer.
        if obj.contains_key("result") || obj.contains_key("error") {
            return None;
        }
        return Some(json_rpc_error(id.unwrap_or(Value::Null), INVALID_REQUEST, "Missing 'method'"));
    };

    if obj.get("jsonrpc").and_then(|v| v.as_str()) != Some("2.0") {
        return id.map(|id| json_rpc_error(id, INVALID_REQUEST, "Expected jsonrpc \"2.0\""));
    }

    let params = obj.get("params").cloned().unwrap_or_else(|| json!({}));

    let Some(id) = id else {
        tracing::debug!(method = %method, "MCP server: notification");
        return None;
    };

    tracing::debug!(method = %method, "MCP server: incoming request");

    let outcome = match method {
        "initialize" => Ok(handle_initialize(state, &params)),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": tools::tool_definitions(state) })),
        "tools/call" => handle_tools_call(state, &params).await,
        "prompts/list" => Ok(json!({ "prompts": prompts::prompt_definitions(state) })),
        "prompts/get" => handle_prompts_get(state, &params),
        "resources/list" => Ok(json!({ "resources": [] })),
        "resources/templates/list" => Ok(json!({ "resourceTemplates": [] })),
        _ => Err(RpcError::new(METHOD_NOT_FOUND, format!("Method not found: {}", method))),
    };

    Some(match outcome {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err(e) => json_rpc_error(id, e.code, &e.message),
    })
}

// ── initialize ──────────────────────────────────────────────────────────────

fn handle_initialize(state: &AppState, params: &Value) -> Value {
    let requested = params.get("protocolVersion").and_then(|v| v.as_str());
    let version = negotiate_protocol_version(requested);

    let mut capabilities = json!({ "tools": { "listChanged": false } });
    if state.config.chdb.enabled {
        capabilities["prompts"] = json!({ "listChanged": false });
    }

    tracing::info!(
        client = params.pointer("/clientInfo/name").and_then(|v| v.as_str()).unwrap_or("unknown"),
        "MCP server: initialize (protocol {})",
        version
    );

    json!({
        "protocolVersion": version,
        "capabilities": capabilities,
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        },
        "instructions": "Read-only access to ClickHouse: list databases and tables, inspect schemas, and run SELECT queries."
    })
}

pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|r| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|v| **v == r))
        .copied()
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0])
}

// ── tools/call ──────────────────────────────────────────────────────────────

async fn handle_tools_call(state: &AppState, params: &Value) -> Result<Value, RpcError> {
    let tool_name = params
        .get("name")
        .and_then(|n| n.as_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| RpcError::new(INVALID_PARAMS, "Missing 'name' in params"))?;
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    tracing::info!(tool = %tool_name, "MCP server: tools/call");

    match tools::execute_tool(tool_name, &arguments, state).await {
        Ok(output) => Ok(tool_result(output)),
        Err(ToolError::UnknownTool(name)) => {
            Err(RpcError::new(INVALID_PARAMS, format!("Unknown tool: {}", name)))
        }
        Err(e) => {
            tracing::warn!(tool = %tool_name, "tool error: {}", e);
            Ok(json!({
                "content": [{ "type": "text", "text": e.to_string() }],
                "isError": true
            }))
        }
    }
}

/// Successful tool result: JSON text for every client, plus
/// `structuredContent` (an object, so non-object values are wrapped).
fn tool_result(output: Value) -> Value {
    let text = serde_json::to_string(&output).unwrap_or_else(|_| "null".to_string());
    let structured = if output.is_object() {
        output
    } else {
        json!({ "result": output })
    };
    json!({
        "content": [{ "type": "text", "text": text }],
        "structuredContent": structured,
        "isError": false
    })
}

// ── prompts/get ─────────────────────────────────────────────────────────────

fn handle_prompts_get(state: &AppState, params: &Value) -> Result<Value, RpcError> {
    let name = params
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| RpcError::new(INVALID_PARAMS, "Missing 'name' in params"))?;
    prompts::get_prompt(name, state)
        .ok_or_else(|| RpcError::new(INVALID_PARAMS, format!("Unknown prompt: {}", name)))
}

// ── JSON-RPC error helper ───────────────────────────────────────────────────

fn json_rpc_error(id: Value, code: i32, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
}
