//! HTTP transport: a single POST endpoint that accepts one JSON-RPC request
//! body and returns one JSON-RPC response body (§4.9, §6 `serve-http`).

use crate::mcp::{JsonRpcRequest, JsonRpcResponse, McpAdapter};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

#[derive(Clone)]
pub struct McpHttpState {
    adapter: Arc<McpAdapter>,
}

pub fn router(adapter: Arc<McpAdapter>) -> Router {
    Router::new()
        .route("/mcp", post(rpc_handler))
        .route("/healthz", get(health_handler))
        .with_state(McpHttpState { adapter })
}

async fn rpc_handler(State(state): State<McpHttpState>, Json(request): Json<JsonRpcRequest>) -> Json<JsonRpcResponse> {
    Json(state.adapter.dispatch(request).await)
}

async fn health_handler() -> &'static str {
    "ok"
}
