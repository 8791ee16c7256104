// src/mcp/stdio.rs
//! stdio transport: one JSON-RPC message per line on stdin, one response per
//! line on stdout. Logs must never be written to stdout in this mode.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::server;
use crate::state::AppState;

/// Serve on the process's stdin/stdout until EOF or a shutdown signal.
pub async fn serve_stdio(state: AppState) -> std::io::Result<()> {
    tracing::info!("MCP server listening on stdio");
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();

    tokio::select! {
        result = serve_lines(&state, reader, writer) => result,
        _ = crate::shutdown_signal() => Ok(()),
    }
}

/// Line-oriented serve loop, generic so it can run over in-memory buffers.
pub async fn serve_lines<R, W>(state: &AppState, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = server::handle_text(state, &line).await {
            let mut out = serde_json::to_vec(&response)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
        }
    }
    tracing::info!("stdin closed, stopping MCP server");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::Value;

    fn state() -> AppState {
        let config = Config::from_lookup(|key| match key {
            "CLICKHOUSE_ENABLED" => Some("false".to_string()),
            "CHDB_ENABLED" => Some("true".to_string()),
            _ => None,
        })
        .unwrap();
        AppState::new(config).unwrap()
    }

    #[tokio::test]
    async fn answers_each_request_line() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let mut output = Vec::new();
        serve_lines(&state(), input.as_bytes(), &mut output).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(lines[1]["result"]["tools"][0]["name"], "run_chdb_select_query");
    }

    #[tokio::test]
    async fn malformed_line_gets_parse_error() {
        let mut output = Vec::new();
        serve_lines(&state(), "garbage\n".as_bytes(), &mut output).await.unwrap();
        let reply: Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(reply["error"]["code"], server::PARSE_ERROR);
    }
}
