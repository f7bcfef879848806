//! Builds the MCP tool catalog used by `tools/list` and `tools/find`.

use crate::loader::AUTO_LOADER_TYPE_TAG;
use crate::mcp::schema::derive_input_schema;
use crate::tool::ToolConfig;
use serde_json::{json, Value};

/// One tool entry as MCP wants it. Meta-tools (auto-loaders used to pull in
/// other MCP servers) are excluded to avoid re-exposing them through MCP and
/// creating a feedback loop (§4.9).
pub fn build_catalog(configs: &[ToolConfig]) -> Vec<Value> {
    configs
        .iter()
        .filter(|c| c.type_tag != AUTO_LOADER_TYPE_TAG)
        .map(entry)
        .collect()
}

fn entry(config: &ToolConfig) -> Value {
    json!({
        "name": config.name,
        "description": config.description,
        "inputSchema": derive_input_schema(&config.parameter_schema),
    })
}
