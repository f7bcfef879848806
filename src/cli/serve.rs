//! `serve-http` and `serve-stdio` command bodies: build the engine, wrap it
//! in an `McpAdapter`, and run the requested transport until SIGINT.

use crate::cli::build_engine;
use crate::config::Config;
use crate::loader::LoadFilters;
use crate::mcp::transport::{http, sse, stdio};
use crate::mcp::McpAdapter;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[allow(unused_variables)]
pub async fn serve_http(
    config: &Config,
    host: String,
    port: u16,
    hooks_enabled: bool,
    hook_config: Option<PathBuf>,
    filters: LoadFilters,
    max_workers: usize,
) -> Result<()> {
    let _ = max_workers; // batch concurrency is per-call; serve-http exposes only single-call dispatch today
    let (engine, configs) = build_engine(config, filters)?;
    let adapter = Arc::new(McpAdapter::new(engine, configs));
    let router = http::router(adapter.clone()).merge(sse::router(adapter));

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("mcp http server listening on {addr} (POST /mcp, POST /mcp/sse)");

    tokio::select! {
        result = axum::serve(listener, router) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down mcp http server");
        }
    }
    Ok(())
}

#[allow(unused_variables)]
pub async fn serve_stdio(config: &Config, hooks_enabled: bool, hook_config: Option<PathBuf>, filters: LoadFilters) -> Result<()> {
    let (engine, configs) = build_engine(config, filters)?;
    let adapter = Arc::new(McpAdapter::new(engine, configs));

    tokio::select! {
        result = stdio::serve(adapter) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down mcp stdio server");
        }
    }
    Ok(())
}
