//! Dispatches JSON-RPC requests against the engine: standard `tools/list`
//! and `tools/call`, plus the custom `tools/find`/`tools/search` methods
//! (§4.9).

use crate::engine::{Engine, ToolCall};
use crate::mcp::catalog::build_catalog;
use crate::mcp::finder::select_search_tool;
use crate::mcp::jsonrpc::{JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND};
use crate::tool::{RunOptions, ToolConfig};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Out-of-band channel for streaming chunks and other notifications a
/// transport can forward while a call is still in flight, distinct from the
/// single final `JsonRpcResponse` `dispatch` returns (§4.9 "info" channel).
pub type InfoSink = Arc<dyn Fn(Value) + Send + Sync>;

pub struct McpAdapter {
    engine: Arc<Engine>,
    configs: Vec<ToolConfig>,
}

impl McpAdapter {
    pub fn new(engine: Arc<Engine>, configs: Vec<ToolConfig>) -> Self {
        Self { engine, configs }
    }

    pub async fn dispatch(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        self.dispatch_with_sink(request, None).await
    }

    /// Like `dispatch`, but a `tools/call` whose arguments set the reserved
    /// `_tooluniverse_stream` flag forwards streamed chunks through `sink`
    /// as they're produced, ahead of the final response.
    pub async fn dispatch_with_sink(&self, request: JsonRpcRequest, sink: Option<InfoSink>) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => JsonRpcResponse::ok(request.id, self.server_info()),
            "tools/list" => JsonRpcResponse::ok(request.id, json!({"tools": build_catalog(&self.configs)})),
            "tools/call" => self.call_tool(request.id, request.params, sink).await,
            "tools/find" | "tools/search" => self.tools_find(request.id, request.params).await,
            other => JsonRpcResponse::err(request.id, METHOD_NOT_FOUND, format!("method not found: {other}")),
        }
    }

    fn server_info(&self) -> Value {
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "tool-engine", "version": crate::VERSION},
        })
    }

    async fn call_tool(&self, id: Option<Value>, params: Value, sink: Option<InfoSink>) -> JsonRpcResponse {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::err(id, INVALID_PARAMS, "Invalid params: 'name' is required");
        };
        let mut arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
        let wants_stream = arguments.get("_tooluniverse_stream").and_then(Value::as_bool).unwrap_or(false);
        strip_sentinel_values(&mut arguments);

        let stream_callback = match (wants_stream, sink) {
            (true, Some(sink)) => Some(stream_forwarder(name.to_string(), sink)),
            _ => None,
        };

        let call = ToolCall { name: name.to_string(), arguments };
        let result = self.engine.run_one(call, &RunOptions { use_cache: true, validate: true, stream_callback }).await;
        let is_error = result.get("error").is_some();
        JsonRpcResponse::ok(
            id,
            json!({
                "content": [{"type": "text", "text": result.to_string()}],
                "structuredContent": result,
                "isError": is_error,
            }),
        )
    }

    /// Resolves a search method to a concrete finder tool, invokes it through
    /// the engine like any other call, and reshapes the response when
    /// `format == "mcp_standard"`.
    async fn tools_find(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        let Some(query) = params.get("query").and_then(Value::as_str).filter(|q| !q.is_empty()) else {
            return JsonRpcResponse::err(id, INVALID_PARAMS, "Invalid params: 'query' is required");
        };
        let categories = params.get("categories").cloned();
        let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(10);
        let use_advanced_search = params.get("use_advanced_search").and_then(Value::as_bool).unwrap_or(true);
        let search_method = params.get("search_method").and_then(Value::as_str).unwrap_or("auto");
        let format = params.get("format").and_then(Value::as_str).unwrap_or("detailed");

        let available: HashSet<String> = self.configs.iter().map(|c| c.name.clone()).collect();
        let Some(finder_name) = select_search_tool(search_method, use_advanced_search, &available) else {
            return JsonRpcResponse::err(id, INTERNAL_ERROR, "no finder tool is available for the requested search method");
        };

        let mut finder_args = json!({"description": query, "limit": limit});
        if let Some(cats) = categories.clone() {
            finder_args["categories"] = cats;
        }
        let call = ToolCall { name: finder_name.to_string(), arguments: finder_args };
        let search_result = self
            .engine
            .run_one(call, &RunOptions { use_cache: true, validate: true, stream_callback: None })
            .await;

        if let Some(err) = search_result.get("error") {
            return JsonRpcResponse::err(id, INTERNAL_ERROR, format!("tool search failed: {err}"));
        }

        let result = if format == "mcp_standard" {
            reshape_mcp_standard(&search_result, query, categories)
        } else {
            search_result
        };

        JsonRpcResponse::ok(id, result)
    }
}

/// Wraps an `InfoSink` as a `RunOptions.stream_callback`, shaping each chunk
/// as a JSON-RPC notification (no `id`) carrying the tool name.
fn stream_forwarder(tool_name: String, sink: InfoSink) -> std::sync::Arc<dyn Fn(String) + Send + Sync> {
    std::sync::Arc::new(move |chunk: String| {
        sink(json!({
            "jsonrpc": "2.0",
            "method": "tools/call/progress",
            "params": {"name": tool_name, "chunk": chunk},
        }));
    })
}

fn strip_sentinel_values(arguments: &mut Value) {
    if let Value::Object(map) = arguments {
        map.remove("_tooluniverse_stream");
    }
}

fn reshape_mcp_standard(search_result: &Value, query: &str, categories: Option<Value>) -> Value {
    let (tools, search_method, total_matches) = match search_result {
        Value::Array(items) => (items.clone(), json!("unknown"), json!(items.len())),
        Value::Object(map) => {
            let tools = map.get("tools").and_then(Value::as_array).cloned().unwrap_or_default();
            let search_method = map.get("search_method").cloned().unwrap_or_else(|| json!("unknown"));
            let total_matches = map.get("total_matches").cloned().unwrap_or_else(|| json!(tools.len()));
            (tools, search_method, total_matches)
        }
        _ => (Vec::new(), json!("unknown"), json!(0)),
    };

    let mcp_tools: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "name": t.get("name").cloned().unwrap_or(Value::Null),
                "description": t.get("description").cloned().unwrap_or_else(|| json!("")),
                "inputSchema": {
                    "type": "object",
                    "properties": t.get("parameters").cloned().unwrap_or_else(|| json!({})),
                    "required": t.get("required").cloned().unwrap_or_else(|| json!([])),
                },
            })
        })
        .collect();

    json!({
        "tools": mcp_tools,
        "_meta": {
            "search_query": query,
            "search_method": search_method,
            "total_matches": total_matches,
            "categories_filtered": categories,
        },
    })
}
