//! A small set of always-available tools: constructor registration and
//! `ToolConfig`s a fresh install can run without any category file.

mod echo;
mod keyword_finder;

pub use echo::EchoTool;
pub use keyword_finder::ToolFinderKeyword;

use crate::registry::Registry;
use crate::tool::{Tool, ToolConfig};
use std::sync::{Arc, RwLock};

pub const ECHO_TYPE_TAG: &str = "EchoTool";
pub const KEYWORD_FINDER_TYPE_TAG: &str = "ToolFinderKeyword";

/// Registers every builtin constructor on `registry`. `catalog` is the
/// shared handle `ToolFinderKeyword` searches over; fill it with the full,
/// final config list (via `catalog.write()`) once loading finishes and
/// before the first `tools/find` call reaches the engine.
pub fn register_builtins(registry: &Registry, catalog: Arc<RwLock<Vec<ToolConfig>>>) {
    registry.register(ECHO_TYPE_TAG, Arc::new(|cfg: &ToolConfig| -> anyhow::Result<Arc<dyn Tool>> { Ok(Arc::new(EchoTool::new(cfg.clone()))) }));
    registry.register(KEYWORD_FINDER_TYPE_TAG, Arc::new(move |cfg: &ToolConfig| -> anyhow::Result<Arc<dyn Tool>> {
        Ok(Arc::new(ToolFinderKeyword::new(cfg.clone(), catalog.clone())))
    }));
}

/// `ToolConfig`s for the builtins, to seed the engine even with an empty
/// loader category.
pub fn builtin_configs() -> Vec<ToolConfig> {
    vec![
        ToolConfig {
            name: "Echo".to_string(),
            type_tag: ECHO_TYPE_TAG.to_string(),
            category: "builtin".to_string(),
            description: "Returns its input arguments unchanged, for connectivity checks.".to_string(),
            parameter_schema: serde_json::json!({"type": "object", "properties": {}}),
            return_schema: None,
            required_api_keys: Vec::new(),
            optional_api_keys: Vec::new(),
            cacheable: false,
            cache_ttl: None,
            batch_max_concurrency: 0,
            supports_streaming: false,
        },
        ToolConfig {
            name: "Tool_Finder_Keyword".to_string(),
            type_tag: KEYWORD_FINDER_TYPE_TAG.to_string(),
            category: "builtin".to_string(),
            description: "Finds tools whose name or description contains the query words.".to_string(),
            parameter_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "description": {"type": "string"},
                    "limit": {"type": "integer"},
                    "categories": {"type": "array", "items": {"type": "string"}},
                },
                "required": ["description"],
            }),
            return_schema: None,
            required_api_keys: Vec::new(),
            optional_api_keys: Vec::new(),
            cacheable: false,
            cache_ttl: None,
            batch_max_concurrency: 0,
            supports_streaming: false,
        },
    ]
}
