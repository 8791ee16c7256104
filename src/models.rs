// src/models.rs
//! Row types decoded from ClickHouse system tables and the chDB error payload.

use serde::{Deserialize, Serialize};

use crate::clickhouse::client::de_opt_u64;

// ---------------------------------------------------------------------------
// Schema metadata (system.tables / system.columns)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub database: String,
    pub table: String,
    pub name: String,
    pub column_type: String,
    #[serde(default)]
    pub default_kind: Option<String>,
    #[serde(default)]
    pub default_expression: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub database: String,
    pub name: String,
    pub engine: String,
    pub create_table_query: String,
    #[serde(default)]
    pub dependencies_database: Vec<String>,
    #[serde(default)]
    pub dependencies_table: Vec<String>,
    pub engine_full: String,
    pub sorting_key: String,
    pub primary_key: String,
    /// `Nullable(UInt64)` in ClickHouse: views and some engines report NULL.
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub total_rows: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub total_bytes: Option<u64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

// ---------------------------------------------------------------------------
// Structured error payload
// ---------------------------------------------------------------------------

/// `{"status": "error", "message": ...}` returned as a normal tool result
/// by tools that report failures in-band instead of as MCP tool errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusError {
    pub status: String,
    pub message: String,
}

impl StatusError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}
