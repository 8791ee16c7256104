// src/clickhouse/sql.rs
//! SQL literal helpers for interpolating tool arguments into ClickHouse queries.

/// Quote a string as a ClickHouse string literal.
///
/// Backslashes, single quotes and control characters are escaped so the value
/// can never terminate the literal early.
pub fn format_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Comma-separated list of quoted literals, for `IN (...)` clauses.
pub fn format_value_list<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .map(format_query_value)
        .collect::<Vec<_>>()
        .join(",")
}

/// Resolve the `readonly` setting to send with user queries.
///
/// `readonly=1` is forced unless the server already enforces a non-zero
/// level, in which case that level is kept: overriding `readonly=2` with `1`
/// makes ClickHouse reject the query ("Setting readonly is unknown or readonly").
pub fn resolve_readonly(server_value: Option<&str>) -> String {
    match server_value.map(str::trim) {
        None | Some("") | Some("0") => "1".to_string(),
        Some(v) => v.to_string(),
    }
}

/// Emit 64-bit integers as JSON numbers instead of quoted strings.
pub const QUOTE_64BIT_INTEGERS: &str = "output_format_json_quote_64bit_integers";

/// URL settings for a user query, given the `readonly` level the server reports.
///
/// - permissive server: unquoted 64-bit integers, then `readonly=1`
/// - `readonly=1`: nothing, since no setting may be changed at that level
/// - `readonly=2`: unquoted 64-bit integers only, as `readonly` itself is locked
pub fn select_settings(server_readonly: Option<&str>) -> Vec<(&'static str, String)> {
    match server_readonly.map(str::trim) {
        None | Some("") | Some("0") => vec![
            (QUOTE_64BIT_INTEGERS, "0".to_string()),
            ("readonly", resolve_readonly(server_readonly)),
        ],
        Some("1") => Vec::new(),
        Some(_) => vec![(QUOTE_64BIT_INTEGERS, "0".to_string())],
    }
}
