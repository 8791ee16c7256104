// tests/common/mod.rs
//! Shared helpers: an in-process stand-in for the ClickHouse HTTP interface
//! and router plumbing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use mcp_clickhouse::config::Config;
use mcp_clickhouse::state::AppState;

pub const MOCK_VERSION: &str = "24.8.4.13";

/// One request as seen by the mock server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub params: HashMap<String, String>,
    pub user: Option<String>,
    pub key: Option<String>,
    pub sql: String,
}

#[derive(Clone)]
struct MockState {
    server_readonly: Option<String>,
    log: Arc<Mutex<Vec<Recorded>>>,
}

pub struct MockClickHouse {
    pub addr: SocketAddr,
    log: Arc<Mutex<Vec<Recorded>>>,
}

impl MockClickHouse {
    /// Start a mock server. `server_readonly` is what `system.settings`
    /// reports for `readonly` (`None` = setting absent).
    pub async fn start(server_readonly: Option<&str>) -> Self {
        let log = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            server_readonly: server_readonly.map(String::from),
            log: log.clone(),
        };
        let app = axum::Router::new()
            .route("/", post(mock_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, log }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    /// App state wired to this mock, with extra environment overrides.
    pub fn state(&self, overrides: &[(&str, &str)]) -> AppState {
        state_for_port(self.addr.port(), overrides)
    }
}

pub fn state_for_port(port: u16, overrides: &[(&str, &str)]) -> AppState {
    let mut env: HashMap<String, String> = [
        ("CLICKHOUSE_HOST", "127.0.0.1".to_string()),
        ("CLICKHOUSE_PORT", port.to_string()),
        ("CLICKHOUSE_USER", "default".to_string()),
        ("CLICKHOUSE_PASSWORD", "secret".to_string()),
        ("CLICKHOUSE_SECURE", "false".to_string()),
        ("CLICKHOUSE_CONNECT_TIMEOUT", "2".to_string()),
        ("CLICKHOUSE_SEND_RECEIVE_TIMEOUT", "10".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    for (k, v) in overrides {
        env.insert(k.to_string(), v.to_string());
    }
    let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();
    AppState::new(config).unwrap()
}

fn compact(columns: &[&str], data: Value) -> String {
    let meta: Vec<Value> = columns
        .iter()
        .map(|c| json!({ "name": c, "type": "String" }))
        .collect();
    let rows = data.as_array().map(|a| a.len()).unwrap_or(0);
    json!({ "meta": meta, "data": data, "rows": rows }).to_string()
}

fn exception(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        [("X-ClickHouse-Exception-Code", code.to_string())],
        format!("Code: {}. DB::Exception: {}\n", code, message),
    )
        .into_response()
}

async fn mock_handler(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    sql: String,
) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(String::from);
    let recorded = Recorded {
        params: params.clone(),
        user: header("x-clickhouse-user"),
        key: header("x-clickhouse-key"),
        sql: sql.clone(),
    };
    state.log.lock().unwrap().push(recorded.clone());

    if recorded.user.as_deref() != Some("default") || recorded.key.as_deref() != Some("secret") {
        return exception(StatusCode::FORBIDDEN, "516", "default: Authentication failed");
    }

    // A readonly=1 profile refuses to change any setting, output format included.
    if state.server_readonly.as_deref() == Some("1") {
        if let Some(name) = params.keys().find(|k| !CONNECTION_PARAMS.contains(&k.as_str())) {
            return exception(
                StatusCode::INTERNAL_SERVER_ERROR,
                "164",
                &format!("Cannot modify '{}' setting in readonly mode. (READONLY)", name),
            );
        }
    }

    if sql.contains("version()") {
        return compact(&["version()"], json!([[MOCK_VERSION]])).into_response();
    }
    if sql.contains("SHOW DATABASES") {
        return "default\nsystem\n".into_response();
    }
    if sql.contains("FROM system.settings") {
        let data = match &state.server_readonly {
            Some(v) => json!([[v]]),
            None => json!([]),
        };
        return compact(&["value"], data).into_response();
    }
    if sql.contains("FROM system.tables") {
        if sql.contains("'slow_db'") {
            tokio::time::sleep(Duration::from_secs(3)).await;
            return compact(&TABLE_COLUMNS, json!([])).into_response();
        }
        if sql.contains("'empty_db'") {
            return compact(&TABLE_COLUMNS, json!([])).into_response();
        }
        return compact(
            &TABLE_COLUMNS,
            json!([
                ["analytics", "events", "MergeTree", "CREATE TABLE analytics.events (id UInt64, ts DateTime) ENGINE = MergeTree ORDER BY id",
                 [], [], "MergeTree ORDER BY id", "id", "id", "1000", "52000", "raw events"],
                ["analytics", "users_view", "View", "CREATE VIEW analytics.users_view AS SELECT 1 AS id",
                 [], [], "View", "", "", null, null, ""]
            ]),
        )
        .into_response();
    }
    if sql.contains("FROM system.columns") {
        return compact(
            &["database", "table", "name", "column_type", "default_kind", "default_expression", "comment"],
            json!([
                ["analytics", "events", "id", "UInt64", "", "", "primary id"],
                ["analytics", "events", "ts", "DateTime", "DEFAULT", "now()", ""],
                ["analytics", "users_view", "id", "UInt8", "", "", ""]
            ]),
        )
        .into_response();
    }
    if sql.contains("sleep") {
        tokio::time::sleep(Duration::from_secs(3)).await;
        return compact(&["slept"], json!([["1"]])).into_response();
    }
    if sql.contains("missing_table") {
        return exception(
            StatusCode::NOT_FOUND,
            "60",
            "Unknown table expression identifier 'missing_table'. (UNKNOWN_TABLE)",
        );
    }

    // Anything else echoes the readonly level it was run with.
    let readonly = params.get("readonly").cloned().unwrap_or_default();
    compact(&["readonly"], json!([[readonly]])).into_response()
}

/// URL parameters that are not settings.
const CONNECTION_PARAMS: [&str; 2] = ["database", "role"];

const TABLE_COLUMNS: [&str; 12] = [
    "database",
    "name",
    "engine",
    "create_table_query",
    "dependencies_database",
    "dependencies_table",
    "engine_full",
    "sorting_key",
    "primary_key",
    "total_rows",
    "total_bytes",
    "comment",
];

// ── Router helpers ──────────────────────────────────────────────────────────

pub async fn post_mcp(app: axum::Router, body: Value) -> Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn get(app: axum::Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `tools/call` through the HTTP router; returns the JSON-RPC `result`.
pub async fn call_tool(state: &AppState, name: &str, arguments: Value) -> Value {
    let response = post_mcp(
        mcp_clickhouse::create_router(state.clone()),
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["result"].clone()
}
