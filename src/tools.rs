// src/tools.rs
//! MCP tools exposed by the server.
//!
//! ClickHouse tools (registered when `CLICKHOUSE_ENABLED`):
//! - `list_databases`: all databases visible to the configured user
//! - `list_tables`: tables of a database with schema, row/byte counts and columns
//! - `run_select_query`: read-only SQL, returns `{columns, rows}`
//!
//! chDB tool (registered when `CHDB_ENABLED`):
//! - `run_chdb_select_query`: SQL on the embedded engine; failures are
//!   reported in-band as `{"status": "error", "message": ...}`
//!
//! Every operation holds a query slot for its whole run and is bounded by a
//! timeout that includes the wait for a slot.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use serde_json::{json, Value};

use crate::clickhouse::{format_query_value, format_value_list, select_settings, ClickHouseClient};
use crate::error::ToolError;
use crate::models::{Column, StatusError, Table};
use crate::state::AppState;

pub const LIST_DATABASES: &str = "list_databases";
pub const LIST_TABLES: &str = "list_tables";
pub const RUN_SELECT_QUERY: &str = "run_select_query";
pub const RUN_CHDB_SELECT_QUERY: &str = "run_chdb_select_query";

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// MCP `Tool` objects for every tool enabled by the current configuration.
pub fn tool_definitions(state: &AppState) -> Vec<Value> {
    let mut tools = Vec::new();

    if state.config.clickhouse.enabled {
        tools.push(mcp_tool(
            LIST_DATABASES,
            "List available ClickHouse databases",
            json!({ "type": "object", "properties": {} }),
        ));
        tools.push(mcp_tool(
            LIST_TABLES,
            "List available ClickHouse tables in a database, including schema, comment, row count, and column count.",
            json!({
                "type": "object",
                "properties": {
                    "database": { "type": "string", "description": "Database to list tables from" },
                    "like": { "type": "string", "description": "Only tables whose name matches this LIKE pattern" },
                    "not_like": { "type": "string", "description": "Exclude tables whose name matches this LIKE pattern" }
                },
                "required": ["database"]
            }),
        ));
        tools.push(mcp_tool(
            RUN_SELECT_QUERY,
            "Run a SELECT query in a ClickHouse database. Queries run with readonly enforced.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "SQL query to execute" }
                },
                "required": ["query"]
            }),
        ));
    }

    if state.config.chdb.enabled {
        tools.push(mcp_tool(
            RUN_CHDB_SELECT_QUERY,
            "Run SQL in chDB, an in-process ClickHouse engine. Can query local files, URLs and S3 with table functions.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "SQL query to execute" }
                },
                "required": ["query"]
            }),
        ));
    }

    tools
}

fn mcp_tool(name: &str, description: &str, input_schema: Value) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": input_schema,
        "annotations": { "readOnlyHint": true }
    })
}

/// Central dispatcher. Tools disabled by configuration are unknown.
pub async fn execute_tool(name: &str, args: &Value, state: &AppState) -> Result<Value, ToolError> {
    match name {
        LIST_DATABASES if state.config.clickhouse.enabled => list_databases(state).await,
        LIST_TABLES if state.config.clickhouse.enabled => {
            let database = required_str(args, "database")?;
            let like = optional_str(args, "like")?;
            let not_like = optional_str(args, "not_like")?;
            list_tables(state, database, like, not_like).await
        }
        RUN_SELECT_QUERY if state.config.clickhouse.enabled => {
            let query = required_str(args, "query")?;
            run_select_query(state, query).await
        }
        RUN_CHDB_SELECT_QUERY if state.config.chdb.enabled => {
            let query = required_str(args, "query")?;
            Ok(run_chdb_select_query(state, query).await)
        }
        _ => Err(ToolError::UnknownTool(name.to_string())),
    }
}

fn required_str<'a>(args: &'a Value, name: &'static str) -> Result<&'a str, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Err(ToolError::MissingArgument(name)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ToolError::InvalidArgument {
            name,
            reason: "expected a string".to_string(),
        }),
    }
}

/// Optional string argument; empty strings count as absent.
fn optional_str<'a>(args: &'a Value, name: &'static str) -> Result<Option<&'a str>, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ToolError::InvalidArgument {
            name,
            reason: "expected a string".to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Execution bounds
// ---------------------------------------------------------------------------

/// Run `work` inside a query slot, giving up after `limit`.
/// Dropping the future on timeout cancels the in-flight request.
async fn bounded<T, F>(
    state: &AppState,
    limit: Duration,
    operation: &'static str,
    work: F,
) -> Result<T, ToolError>
where
    F: Future<Output = Result<T, ToolError>>,
{
    let run = async {
        let _permit = state
            .query_slots
            .acquire()
            .await
            .map_err(|_| ToolError::Internal("query pool is shut down".to_string()))?;
        work.await
    };

    match tokio::time::timeout(limit, run).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} timed out after {} seconds", operation, limit.as_secs());
            Err(ToolError::Timeout {
                operation,
                seconds: limit.as_secs(),
            })
        }
    }
}

fn clickhouse(state: &AppState) -> Result<&ClickHouseClient, ToolError> {
    state
        .clickhouse
        .as_ref()
        .ok_or_else(|| ToolError::Internal("ClickHouse is not enabled. Set CLICKHOUSE_ENABLED=true to enable it.".to_string()))
}

// ---------------------------------------------------------------------------
// list_databases
// ---------------------------------------------------------------------------

pub async fn list_databases(state: &AppState) -> Result<Value, ToolError> {
    let client = clickhouse(state)?;
    tracing::info!("Listing all databases");

    bounded(state, state.config.server.query_timeout, "List databases operation", async {
        let raw = client
            .command("SHOW DATABASES")
            .await
            .map_err(ToolError::clickhouse("Failed to list databases"))?;
        let databases = parse_database_list(&raw);
        tracing::info!("Found {} databases", databases.len());
        Ok::<_, ToolError>(json!(databases))
    })
    .await
}

fn parse_database_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// list_tables
// ---------------------------------------------------------------------------

pub async fn list_tables(
    state: &AppState,
    database: &str,
    like: Option<&str>,
    not_like: Option<&str>,
) -> Result<Value, ToolError> {
    let client = clickhouse(state)?;
    tracing::info!("Listing tables in database '{}'", database);

    bounded(state, state.config.server.list_tables_timeout, "List tables operation", async {
        let context = "Failed to list tables";

        let tables: Vec<Table> = client
            .query(&tables_query(database, like, not_like), &[])
            .await
            .and_then(|r| r.into_records())
            .map_err(ToolError::clickhouse(context))?;

        if tables.is_empty() {
            tracing::info!("No tables found");
            return Ok(json!([]));
        }

        tracing::info!("Found {} tables, fetching column information", tables.len());

        // One batch query for the columns of every table found.
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        let columns: Vec<Column> = client
            .query(&columns_query(database, &names), &[])
            .await
            .and_then(|r| r.into_records())
            .map_err(ToolError::clickhouse(context))?;

        let column_count = columns.len();
        let tables = attach_columns(tables, columns);
        tracing::info!(
            "Processed {} tables with {} total columns",
            tables.len(),
            column_count
        );

        serde_json::to_value(tables).map_err(|e| ToolError::Internal(e.to_string()))
    })
    .await
}

fn tables_query(database: &str, like: Option<&str>, not_like: Option<&str>) -> String {
    let mut query = format!(
        "SELECT database, name, engine, create_table_query, dependencies_database, \
         dependencies_table, engine_full, sorting_key, primary_key, total_rows, \
         total_bytes, comment FROM system.tables WHERE database = {}",
        format_query_value(database)
    );
    if let Some(pattern) = like {
        query.push_str(&format!(" AND name LIKE {}", format_query_value(pattern)));
    }
    if let Some(pattern) = not_like {
        query.push_str(&format!(" AND name NOT LIKE {}", format_query_value(pattern)));
    }
    query
}

fn columns_query(database: &str, tables: &[&str]) -> String {
    format!(
        "SELECT database, table, name, type AS column_type, default_kind, \
         default_expression, comment FROM system.columns \
         WHERE database = {} AND table IN ({}) \
         ORDER BY database, table, position",
        format_query_value(database),
        format_value_list(tables.iter().copied())
    )
}

/// Distribute columns onto their tables, preserving column order.
fn attach_columns(mut tables: Vec<Table>, columns: Vec<Column>) -> Vec<Table> {
    let mut by_table: HashMap<String, Vec<Column>> = HashMap::new();
    for column in columns {
        by_table.entry(column.table.clone()).or_default().push(column);
    }
    for table in &mut tables {
        table.columns = by_table.remove(&table.name).unwrap_or_default();
    }
    tables
}

// ---------------------------------------------------------------------------
// run_select_query
// ---------------------------------------------------------------------------

pub async fn run_select_query(state: &AppState, query: &str) -> Result<Value, ToolError> {
    let client = clickhouse(state)?;
    tracing::info!("Executing SELECT query: {}", query);

    bounded(state, state.config.server.query_timeout, "Query", async {
        let context = "Query execution failed";
        let server_readonly = client
            .server_setting("readonly")
            .await
            .map_err(ToolError::clickhouse(context))?;
        let settings = select_settings(server_readonly.as_deref());
        let settings: Vec<(&str, &str)> = settings.iter().map(|(k, v)| (*k, v.as_str())).collect();

        let result = client
            .query(query, &settings)
            .await
            .map_err(ToolError::clickhouse(context))?;
        tracing::info!("Query returned {} rows", result.rows.len());

        serde_json::to_value(result).map_err(|e| ToolError::Internal(e.to_string()))
    })
    .await
}

// ---------------------------------------------------------------------------
// run_chdb_select_query
// ---------------------------------------------------------------------------

/// Never fails: errors and timeouts come back as a [`StatusError`] payload.
pub async fn run_chdb_select_query(state: &AppState, query: &str) -> Value {
    tracing::info!("Executing chDB SELECT query: {}", query);

    if !state.config.chdb.enabled {
        return json!(StatusError::new(
            "chDB query failed: chDB is not enabled. Set CHDB_ENABLED=true to enable it."
        ));
    }

    let outcome = bounded(state, state.config.server.query_timeout, "chDB query", async {
        let session = state
            .chdb
            .as_ref()
            .ok_or(crate::chdb::ChDbError::Unavailable)?;
        Ok::<_, ToolError>(session.query(query).await?)
    })
    .await;

    match outcome {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!("{}", e);
            json!(StatusError::new(e.to_string()))
        }
    }
}
