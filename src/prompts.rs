// src/prompts.rs
//! MCP prompts. Only `chdb_initial_prompt`, registered when chDB is enabled.

use serde_json::{json, Value};

use crate::state::AppState;

pub const CHDB_INITIAL_PROMPT: &str = "chdb_initial_prompt";

const CHDB_PROMPT_DESCRIPTION: &str =
    "This prompt helps users understand how to interact and perform common operations in chDB";

pub const CHDB_PROMPT: &str = r#"
# chDB Assistant Guide

You have access to chDB, an in-process SQL OLAP engine built on ClickHouse.
Use the `run_chdb_select_query` tool to run SQL. chDB needs no server: it can
query data directly where it lives.

## What chDB is good at

- Querying local files (CSV, TSV, Parquet, JSON, ORC, Arrow) without loading them
- Querying remote data over HTTP(S) and S3-compatible object storage
- Joining data from different sources in one query
- Fast analytical aggregations with the full ClickHouse SQL dialect

## Table functions

Use table functions in the FROM clause to read external data:

- `file('path/to/data.parquet', 'Parquet')`: local files (format is inferred from the extension when omitted)
- `url('https://example.com/data.csv', 'CSVWithNames')`: files over HTTP(S)
- `s3('https://bucket.s3.amazonaws.com/path/*.parquet', 'Parquet')`: S3 objects, globs allowed
- `numbers(N)`: a single UInt64 column `number` from 0 to N-1, handy for testing
- `generateRandom('a UInt32, b String')`: random rows for a given structure

## Workflow

1. Explore the data first: `DESCRIBE file('data.csv')` or
   `SELECT * FROM url('...') LIMIT 10`.
2. Check row counts before heavy queries: `SELECT count() FROM s3('...')`.
3. Write the analytical query, always with a `LIMIT` while iterating.
4. Prefer explicit column lists to `SELECT *` on wide files.

## Examples

```sql
-- Top values from a remote CSV
SELECT town, avg(price) AS avg_price
FROM url('https://example.com/house_prices.csv', 'CSVWithNames')
GROUP BY town
ORDER BY avg_price DESC
LIMIT 10;

-- Parquet files on S3
SELECT toStartOfDay(event_time) AS day, count() AS events
FROM s3('https://my-bucket.s3.amazonaws.com/events/*.parquet', 'Parquet')
GROUP BY day
ORDER BY day;

-- Join a local file with a remote one
SELECT l.id, l.name, r.score
FROM file('users.csv', 'CSVWithNames') AS l
JOIN url('https://example.com/scores.json', 'JSONEachRow') AS r ON l.id = r.id
LIMIT 100;
```

## Notes

- Results come back as a list of row objects.
- Errors are returned as `{"status": "error", "message": ...}`; read the
  message, fix the SQL, and retry.
- Large scans are bounded by a query timeout; narrow the data with filters
  and LIMIT when a query times out.
"#;

/// MCP `Prompt` objects for the prompts enabled by the current configuration.
pub fn prompt_definitions(state: &AppState) -> Vec<Value> {
    if !state.config.chdb.enabled {
        return vec![];
    }
    vec![json!({
        "name": CHDB_INITIAL_PROMPT,
        "description": CHDB_PROMPT_DESCRIPTION,
        "arguments": []
    })]
}

/// `prompts/get` result for `name`, or `None` if no such prompt is registered.
pub fn get_prompt(name: &str, state: &AppState) -> Option<Value> {
    match name {
        CHDB_INITIAL_PROMPT if state.config.chdb.enabled => Some(json!({
            "description": CHDB_PROMPT_DESCRIPTION,
            "messages": [{
                "role": "user",
                "content": { "type": "text", "text": CHDB_PROMPT.trim() }
            }]
        })),
        _ => None,
    }
}
