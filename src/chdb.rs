// src/chdb.rs
//! chDB (embedded ClickHouse engine)
//!
//! Queries run through `clickhouse local`, the standalone build of the same
//! engine chDB embeds. One short-lived process per query; `kill_on_drop`
//! guarantees a timed-out query does not outlive its future.

use std::path::Path;
use std::process::Stdio;

use serde_json::Value;
use tokio::process::Command;

use crate::config::ChDbConfig;

#[derive(Debug, thiserror::Error)]
pub enum ChDbError {
    #[error("failed to prepare chDB data path '{path}': {source}")]
    DataPath {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("chDB session is not available")]
    Unavailable,

    #[error("{0}")]
    Query(String),

    #[error("invalid chDB output: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct ChDbSession {
    binary: String,
    data_path: Option<String>,
}

impl ChDbSession {
    /// Prepare a session. Persistent data paths are created if missing.
    pub fn open(cfg: &ChDbConfig) -> Result<Self, ChDbError> {
        let data_path = if cfg.is_in_memory() {
            None
        } else {
            std::fs::create_dir_all(&cfg.data_path).map_err(|source| ChDbError::DataPath {
                path: cfg.data_path.clone(),
                source,
            })?;
            Some(cfg.data_path.clone())
        };

        tracing::info!(
            "chDB session ready (binary={}, data_path={})",
            cfg.binary_path,
            data_path.as_deref().unwrap_or(crate::config::CHDB_IN_MEMORY)
        );

        Ok(Self {
            binary: cfg.binary_path.clone(),
            data_path,
        })
    }

    /// Run a query and return the `data` rows of its JSON output.
    pub async fn query(&self, sql: &str) -> Result<Value, ChDbError> {
        let mut cmd = Command::new(&self.binary);
        if !is_standalone_local_binary(&self.binary) {
            cmd.arg("local");
        }
        if let Some(path) = &self.data_path {
            cmd.arg("--path").arg(path);
        }
        cmd.args(["--output-format", "JSON", "--query", sql])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = cmd.output().await.map_err(|source| ChDbError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("process exited with {}", output.status)
            } else {
                stderr
            };
            return Err(ChDbError::Query(message));
        }

        parse_json_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// `clickhouse-local` is a standalone entry point; the multi-tool `clickhouse`
/// binary needs the `local` subcommand.
fn is_standalone_local_binary(binary: &str) -> bool {
    Path::new(binary)
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s == "clickhouse-local")
}

/// Extract the `data` array from `FORMAT JSON` output. No output means no rows.
fn parse_json_output(stdout: &str) -> Result<Value, ChDbError> {
    if stdout.trim().is_empty() {
        return Ok(Value::Array(vec![]));
    }
    let parsed: Value = serde_json::from_str(stdout)?;
    Ok(parsed
        .get("data")
        .cloned()
        .unwrap_or_else(|| Value::Array(vec![])))
}
