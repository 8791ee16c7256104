// src/main.rs
//! Binary entry point: config, logging, transport selection.

use anyhow::Context;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use mcp_clickhouse::config::{Config, Transport};
use mcp_clickhouse::mcp::stdio;
use mcp_clickhouse::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // stderr only: stdout belongs to the stdio transport.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = Config::from_env().context("invalid configuration")?;
    let transport = config.server.transport;
    let bind = (config.server.bind_host.clone(), config.server.bind_port);

    let state = AppState::new(config).context("failed to initialize ClickHouse client")?;
    tracing::info!(
        "mcp-clickhouse {} starting (clickhouse={}, chdb={})",
        env!("CARGO_PKG_VERSION"),
        state.clickhouse.is_some(),
        state.config.chdb.enabled,
    );

    match transport {
        Transport::Stdio => stdio::serve_stdio(state).await?,
        Transport::Http => serve_http(state, bind).await?,
    }

    Ok(())
}

async fn serve_http(state: AppState, (host, port): (String, u16)) -> anyhow::Result<()> {
    let app = mcp_clickhouse::create_router(state)
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                }),
        );

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {}:{}", host, port))?;
    tracing::info!("MCP server listening on http://{}/mcp", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(mcp_clickhouse::shutdown_signal())
        .await?;

    Ok(())
}
