// src/clickhouse/client.rs
//! Minimal ClickHouse client over the HTTP interface.
//!
//! Every call is a single `POST` with the SQL as the body. The output format
//! is a trailing `FORMAT` clause rather than the `default_format` setting,
//! which a `readonly=1` profile refuses to change.
//! Credentials travel in `X-ClickHouse-User` / `X-ClickHouse-Key` headers.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use super::sql::format_query_value;
use crate::config::ClickHouseConfig;

const EXCEPTION_CODE_HEADER: &str = "X-ClickHouse-Exception-Code";

#[derive(Debug, thiserror::Error)]
pub enum ClickHouseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Server {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Invalid ClickHouse URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

// ── Query result ────────────────────────────────────────────────────────────

/// Column names plus row values, as returned to MCP clients by `run_select_query`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct JsonCompactBody {
    meta: Vec<ColumnMeta>,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct ColumnMeta {
    name: String,
}

impl QueryResult {
    /// Decode a `JSONCompact` response body. An empty body is an empty result.
    pub fn from_json_compact(body: &str) -> Result<Self, ClickHouseError> {
        if body.trim().is_empty() {
            return Ok(Self::default());
        }
        let parsed: JsonCompactBody = serde_json::from_str(body)
            .map_err(|e| ClickHouseError::Decode(format!("invalid JSONCompact output: {}", e)))?;
        Ok(Self {
            columns: parsed.meta.into_iter().map(|m| m.name).collect(),
            rows: parsed.data,
        })
    }

    /// Deserialize each row into `T` by pairing values with column names.
    pub fn into_records<T: DeserializeOwned>(self) -> Result<Vec<T>, ClickHouseError> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| {
                let record: Map<String, Value> = columns.iter().cloned().zip(row).collect();
                serde_json::from_value(Value::Object(record))
                    .map_err(|e| ClickHouseError::Decode(format!("unexpected row shape: {}", e)))
            })
            .collect()
    }

    /// First cell of the first row, as a string.
    fn first_string(&self) -> Option<String> {
        match self.rows.first()?.first()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

// ── Client ──────────────────────────────────────────────────────────────────

/// Clone-friendly handle; reqwest's `Client` pools connections internally.
#[derive(Clone)]
pub struct ClickHouseClient {
    http: Client,
    base_url: Url,
    username: String,
    password: String,
    database: Option<String>,
    role: Option<String>,
}

impl std::fmt::Debug for ClickHouseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickHouseClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl ClickHouseClient {
    pub fn new(cfg: &ClickHouseConfig) -> Result<Self, ClickHouseError> {
        let base_url = Url::parse(&cfg.base_url())?;
        let http = Client::builder()
            .pool_max_idle_per_host(cfg.thread_pool_size)
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.send_receive_timeout)
            .danger_accept_invalid_certs(!cfg.verify)
            .build()?;

        tracing::info!(
            "ClickHouse client configured for {}:{} as {} (secure={}, verify={}, connect_timeout={}s, send_receive_timeout={}s)",
            cfg.host,
            cfg.port,
            cfg.username,
            cfg.secure,
            cfg.verify,
            cfg.connect_timeout.as_secs(),
            cfg.send_receive_timeout.as_secs(),
        );

        Ok(Self {
            http,
            base_url,
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            database: cfg.database.clone(),
            role: cfg.role.clone(),
        })
    }

    /// Run a statement and return its raw `TabSeparated` output.
    pub async fn command(&self, sql: &str) -> Result<String, ClickHouseError> {
        self.execute(sql, "TabSeparated", &[]).await
    }

    /// Run a query and decode its rows. `settings` are sent as URL parameters.
    pub async fn query(
        &self,
        sql: &str,
        settings: &[(&str, &str)],
    ) -> Result<QueryResult, ClickHouseError> {
        let body = self.execute(sql, "JSONCompact", settings).await?;
        QueryResult::from_json_compact(&body)
    }

    pub async fn server_version(&self) -> Result<String, ClickHouseError> {
        self.query("SELECT version()", &[])
            .await?
            .first_string()
            .ok_or_else(|| ClickHouseError::Decode("empty version() result".to_string()))
    }

    /// Current value of a server setting for this user, if the setting exists.
    pub async fn server_setting(&self, name: &str) -> Result<Option<String>, ClickHouseError> {
        let sql = format!(
            "SELECT value FROM system.settings WHERE name = {}",
            format_query_value(name)
        );
        Ok(self.query(&sql, &[]).await?.first_string())
    }

    fn request_url(&self, settings: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(db) = &self.database {
                pairs.append_pair("database", db);
            }
            if let Some(role) = &self.role {
                pairs.append_pair("role", role);
            }
            // Settings go last: ClickHouse applies them in order, and
            // `readonly` would block any setting that follows it.
            for (key, value) in settings {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    async fn execute(
        &self,
        sql: &str,
        format: &str,
        settings: &[(&str, &str)],
    ) -> Result<String, ClickHouseError> {
        let response = self
            .http
            .post(self.request_url(settings))
            .header("X-ClickHouse-User", &self.username)
            .header("X-ClickHouse-Key", &self.password)
            .body(with_format(sql, format))
            .send()
            .await?;

        let status = response.status();
        let code = response
            .headers()
            .get(EXCEPTION_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.text().await?;

        if !status.is_success() || code.is_some() {
            return Err(ClickHouseError::Server {
                status: status.as_u16(),
                code,
                message: body.trim().to_string(),
            });
        }
        Ok(body)
    }
}

/// Append `FORMAT <format>` to a statement. Trailing semicolons are dropped and
/// the clause starts on its own line so a trailing `--` comment cannot swallow it.
fn with_format(sql: &str, format: &str) -> String {
    let statement = sql.trim_end().trim_end_matches(';').trim_end();
    format!("{}\nFORMAT {}", statement, format)
}

/// Accepts a 64-bit integer that ClickHouse may emit as a JSON number or,
/// with `output_format_json_quote_64bit_integers`, as a quoted string.
pub fn de_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected unsigned integer, got {}", n))),
        Some(Value::String(s)) => s.parse::<u64>().map(Some).map_err(D::Error::custom),
        Some(other) => Err(D::Error::custom(format!("expected integer, got {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> ClickHouseConfig {
        ClickHouseConfig {
            enabled: true,
            host: "localhost".to_string(),
            port: 8123,
            username: "default".to_string(),
            password: "secret".to_string(),
            secure: false,
            verify: true,
            connect_timeout: Duration::from_secs(1),
            send_receive_timeout: Duration::from_secs(1),
            database: Some("analytics".to_string()),
            role: None,
            proxy_path: None,
            thread_pool_size: 2,
        }
    }

    #[test]
    fn decodes_json_compact() {
        let body = r#"{
            "meta": [{"name": "id", "type": "UInt64"}, {"name": "name", "type": "String"}],
            "data": [["1", "alpha"], ["2", "beta"]],
            "rows": 2,
            "statistics": {"elapsed": 0.001, "rows_read": 2, "bytes_read": 32}
        }"#;
        let result = QueryResult::from_json_compact(body).unwrap();
        assert_eq!(result.columns, vec!["id", "name"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[1][1], "beta");
    }

    #[test]
    fn empty_body_is_empty_result() {
        assert_eq!(QueryResult::from_json_compact("  \n").unwrap(), QueryResult::default());
    }

    #[test]
    fn garbage_body_is_decode_error() {
        assert!(matches!(
            QueryResult::from_json_compact("Ok."),
            Err(ClickHouseError::Decode(_))
        ));
    }

    #[derive(Deserialize)]
    struct TableSize {
        name: String,
        #[serde(deserialize_with = "de_opt_u64", default)]
        total: Option<u64>,
    }

    #[test]
    fn records_accept_quoted_and_null_integers() {
        let result = QueryResult {
            columns: vec!["name".to_string(), "total".to_string()],
            rows: vec![
                vec![Value::from("a"), Value::from("42")],
                vec![Value::from("b"), Value::from(7)],
                vec![Value::from("c"), Value::Null],
            ],
        };
        let records: Vec<TableSize> = result.into_records().unwrap();
        assert_eq!(records[0].name, "a");
        assert_eq!(records[0].total, Some(42));
        assert_eq!(records[1].total, Some(7));
        assert_eq!(records[2].total, None);
    }

    #[test]
    fn request_url_orders_settings_last() {
        let client = ClickHouseClient::new(&test_config()).unwrap();
        let url = client.request_url(&[
            ("output_format_json_quote_64bit_integers", "0"),
            ("readonly", "1"),
        ]);
        assert_eq!(
            url.as_str(),
            "http://localhost:8123/?database=analytics&output_format_json_quote_64bit_integers=0&readonly=1"
        );
    }

    #[test]
    fn request_url_without_settings_changes_nothing() {
        let client = ClickHouseClient::new(&test_config()).unwrap();
        let url = client.request_url(&[]);
        assert_eq!(url.as_str(), "http://localhost:8123/?database=analytics");
        assert!(!url.as_str().contains("default_format"));
    }

    #[test]
    fn format_clause_is_appended() {
        assert_eq!(with_format("SHOW DATABASES", "TabSeparated"), "SHOW DATABASES\nFORMAT TabSeparated");
        assert_eq!(with_format("SELECT 1;  \n", "JSONCompact"), "SELECT 1\nFORMAT JSONCompact");
        assert_eq!(
            with_format("SELECT 1 -- note", "JSONCompact"),
            "SELECT 1 -- note\nFORMAT JSONCompact"
        );
    }

    #[test]
    fn debug_output_hides_password() {
        let client = ClickHouseClient::new(&test_config()).unwrap();
        assert!(!format!("{:?}", client).contains("secret"));
    }
}
