// src/clickhouse/mod.rs
//! ClickHouse access: HTTP client, result decoding, and SQL literal helpers.

pub mod client;
pub mod sql;

pub use client::{ClickHouseClient, ClickHouseError, QueryResult};
pub use sql::{format_query_value, format_value_list, resolve_readonly, select_settings};
