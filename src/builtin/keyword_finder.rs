//! Finds tools by substring match over name/description, the always-on
//! fallback search tool `tools/find` reaches for when nothing fancier is
//! registered (§4.9, "auto" search-method selection).

use crate::tool::{RunOptions, Tool, ToolConfig};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};

pub struct ToolFinderKeyword {
    config: ToolConfig,
    catalog: Arc<RwLock<Vec<ToolConfig>>>,
}

impl ToolFinderKeyword {
    pub fn new(config: ToolConfig, catalog: Arc<RwLock<Vec<ToolConfig>>>) -> Self {
        Self { config, catalog }
    }
}

#[async_trait]
impl Tool for ToolFinderKeyword {
    fn config(&self) -> &ToolConfig {
        &self.config
    }

    async fn run(&self, arguments: Value, _opts: &RunOptions) -> anyhow::Result<Value> {
        let description = arguments
            .get("description")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("invalid parameter: 'description' is required"))?;
        let limit = arguments.get("limit").and_then(Value::as_u64).unwrap_or(10) as usize;
        let categories: Vec<String> = arguments
            .get("categories")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let words: Vec<String> = description.to_lowercase().split_whitespace().map(str::to_string).collect();
        let catalog = self.catalog.read().expect("tool catalog lock poisoned");

        let mut matches: Vec<&ToolConfig> = catalog
            .iter()
            .filter(|c| categories.is_empty() || categories.contains(&c.category))
            .filter(|c| {
                let haystack = format!("{} {}", c.name, c.description).to_lowercase();
                words.iter().any(|w| haystack.contains(w.as_str()))
            })
            .collect();
        matches.truncate(limit);

        let tools: Vec<Value> = matches
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "description": c.description,
                    "parameters": c.parameter_schema.get("properties").cloned().unwrap_or_else(|| json!({})),
                    "required": c.parameter_schema.get("required").cloned().unwrap_or_else(|| json!([])),
                })
            })
            .collect();

        Ok(json!({
            "tools": tools,
            "search_method": "keyword",
            "total_matches": tools.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, description: &str) -> ToolConfig {
        categorized_config(name, description, "")
    }

    fn categorized_config(name: &str, description: &str, category: &str) -> ToolConfig {
        ToolConfig {
            name: name.to_string(),
            type_tag: "Stub".to_string(),
            category: category.to_string(),
            description: description.to_string(),
            parameter_schema: Value::Null,
            return_schema: None,
            required_api_keys: Vec::new(),
            optional_api_keys: Vec::new(),
            cacheable: false,
            cache_ttl: None,
            batch_max_concurrency: 0,
            supports_streaming: false,
        }
    }

    #[tokio::test]
    async fn matches_on_name_or_description_substring() {
        let catalog = Arc::new(RwLock::new(vec![
            config("WeatherLookup", "fetches current weather for a city"),
            config("Calculator", "evaluates arithmetic expressions"),
        ]));
        let finder = ToolFinderKeyword::new(config("Tool_Finder_Keyword", ""), catalog);
        let out = finder.run(json!({"description": "weather city"}), &RunOptions::default()).await.unwrap();
        assert_eq!(out["total_matches"], 1);
        assert_eq!(out["tools"][0]["name"], "WeatherLookup");
    }

    #[tokio::test]
    async fn missing_description_is_an_error() {
        let finder = ToolFinderKeyword::new(config("Tool_Finder_Keyword", ""), Arc::new(RwLock::new(Vec::new())));
        let err = finder.run(json!({}), &RunOptions::default()).await.unwrap_err();
        assert!(err.to_string().contains("description"));
    }

    #[tokio::test]
    async fn categories_filter_matches_loader_category_not_type_tag() {
        let catalog = Arc::new(RwLock::new(vec![
            categorized_config("WeatherLookup", "fetches current weather for a city", "weather"),
            categorized_config("Calculator", "evaluates arithmetic city expressions", "math"),
        ]));
        let finder = ToolFinderKeyword::new(config("Tool_Finder_Keyword", ""), catalog);
        let out = finder
            .run(json!({"description": "city", "categories": ["weather"]}), &RunOptions::default())
            .await
            .unwrap();
        assert_eq!(out["total_matches"], 1);
        assert_eq!(out["tools"][0]["name"], "WeatherLookup");
    }
}
