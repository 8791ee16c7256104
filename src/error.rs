// src/error.rs
//! Tool errors
//!
//! Display strings are what MCP clients see as the text of an `isError`
//! tool result, so every variant renders a complete sentence.

use crate::chdb::ChDbError;
use crate::clickhouse::ClickHouseError;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("{context}: {source}")]
    ClickHouse {
        context: &'static str,
        #[source]
        source: ClickHouseError,
    },

    #[error("chDB query failed: {0}")]
    ChDb(#[from] ChDbError),

    #[error("{operation} timed out after {seconds} seconds")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    #[error("Unexpected error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Wrap a ClickHouse failure with the operation-specific prefix.
    pub fn clickhouse(context: &'static str) -> impl FnOnce(ClickHouseError) -> ToolError {
        move |source| {
            tracing::error!("{}: {}", context, source);
            ToolError::ClickHouse { context, source }
        }
    }
}
