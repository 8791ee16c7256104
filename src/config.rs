// src/config.rs
//! Environment configuration
//!
//! Read once at startup (after `.env` is loaded). `Config::from_lookup` takes
//! any key -> value function so tests never touch the process environment.

use std::time::Duration;

// ── Error ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

// ── Transport ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

impl Transport {
    fn parse(var: &'static str, raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" => Ok(Transport::Http),
            _ => Err(ConfigError::Invalid {
                var,
                value: raw.to_string(),
                reason: "supported transports: stdio, http".to_string(),
            }),
        }
    }
}

// ── ClickHouse ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ClickHouseConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub secure: bool,
    pub verify: bool,
    pub connect_timeout: Duration,
    pub send_receive_timeout: Duration,
    pub database: Option<String>,
    pub role: Option<String>,
    pub proxy_path: Option<String>,
    pub thread_pool_size: usize,
}

impl ClickHouseConfig {
    /// Base URL of the ClickHouse HTTP interface, including the proxy path.
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        let path = self
            .proxy_path
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(|p| format!("{}/", p))
            .unwrap_or_default();
        format!("{}://{}:{}/{}", scheme, self.host, self.port, path)
    }
}

// ── chDB ────────────────────────────────────────────────────────────────────

pub const CHDB_IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone)]
pub struct ChDbConfig {
    pub enabled: bool,
    pub data_path: String,
    pub binary_path: String,
}

impl ChDbConfig {
    pub fn is_in_memory(&self) -> bool {
        self.data_path == CHDB_IN_MEMORY
    }
}

// ── Server ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: Transport,
    pub bind_host: String,
    pub bind_port: u16,
    pub query_timeout: Duration,
    pub list_tables_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub clickhouse: ClickHouseConfig,
    pub chdb: ChDbConfig,
    pub server: ServerConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup: &lookup };

        let ch_enabled = env.bool_or("CLICKHOUSE_ENABLED", true)?;
        let secure = env.bool_or("CLICKHOUSE_SECURE", true)?;
        let default_port = if secure { 8443 } else { 8123 };

        let (host, username, password) = if ch_enabled {
            (
                env.required("CLICKHOUSE_HOST")?,
                env.required("CLICKHOUSE_USER")?,
                env.required("CLICKHOUSE_PASSWORD")?,
            )
        } else {
            (
                env.get("CLICKHOUSE_HOST").unwrap_or_default(),
                env.get("CLICKHOUSE_USER").unwrap_or_default(),
                env.get("CLICKHOUSE_PASSWORD").unwrap_or_default(),
            )
        };

        let thread_pool_size = if ch_enabled {
            env.parse_or("CLICKHOUSE_THREAD_POOL_SIZE", 10usize)?
        } else {
            10
        };
        if thread_pool_size == 0 {
            return Err(ConfigError::Invalid {
                var: "CLICKHOUSE_THREAD_POOL_SIZE",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let clickhouse = ClickHouseConfig {
            enabled: ch_enabled,
            host,
            port: env.parse_or("CLICKHOUSE_PORT", default_port)?,
            username,
            password,
            secure,
            verify: env.bool_or("CLICKHOUSE_VERIFY", true)?,
            connect_timeout: Duration::from_secs(env.parse_or("CLICKHOUSE_CONNECT_TIMEOUT", 30u64)?),
            send_receive_timeout: Duration::from_secs(
                env.parse_or("CLICKHOUSE_SEND_RECEIVE_TIMEOUT", 300u64)?,
            ),
            database: env.get("CLICKHOUSE_DATABASE"),
            role: env.get("CLICKHOUSE_ROLE"),
            proxy_path: env.get("CLICKHOUSE_PROXY_PATH"),
            thread_pool_size,
        };

        let chdb = ChDbConfig {
            enabled: env.bool_or("CHDB_ENABLED", false)?,
            data_path: env.get("CHDB_DATA_PATH").unwrap_or_else(|| CHDB_IN_MEMORY.to_string()),
            binary_path: env.get("CHDB_BINARY_PATH").unwrap_or_else(|| "clickhouse".to_string()),
        };

        let transport = match env.get("CLICKHOUSE_MCP_SERVER_TRANSPORT") {
            Some(raw) => Transport::parse("CLICKHOUSE_MCP_SERVER_TRANSPORT", &raw)?,
            None => Transport::Stdio,
        };

        let server = ServerConfig {
            transport,
            bind_host: env.get("CLICKHOUSE_MCP_BIND_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            bind_port: env.parse_or("CLICKHOUSE_MCP_BIND_PORT", 8000u16)?,
            query_timeout: Duration::from_secs(env.parse_or("CLICKHOUSE_MCP_QUERY_TIMEOUT", 30u64)?),
            list_tables_timeout: Duration::from_secs(
                env.parse_or("CLICKHOUSE_MCP_LIST_TABLES_TIMEOUT", 120u64)?,
            ),
        };

        Ok(Self { clickhouse, chdb, server })
    }
}

// ── Lookup helpers ──────────────────────────────────────────────────────────

struct Env<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Trimmed value; empty strings count as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Required value. The raw lookup is used so an empty password is accepted.
    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        (self.lookup)(key).ok_or(ConfigError::Missing(key))
    }

    fn bool_or(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                var: key,
                value: raw,
                reason: "expected true/false".to_string(),
            }),
        }
    }

    fn parse_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
                var: key,
                reason: e.to_string(),
                value: raw,
            }),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
