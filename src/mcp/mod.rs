// src/mcp/mod.rs
//! MCP (Model Context Protocol) server.
//!
//! **Server** (`server`): JSON-RPC 2.0 dispatch for tools and prompts.
//!
//! **Transports**: `stdio` (newline-delimited JSON, the default for desktop
//! MCP clients) and `http` (`POST /mcp`, one JSON-RPC message per request).

pub mod http;
pub mod server;
pub mod stdio;
