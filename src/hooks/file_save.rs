//! Writes a tool's result to disk and returns a file descriptor instead of
//! the raw value (§3, §4.8).

use crate::hooks::{Hook, HookBinding, HookContext, HookRule, HookState};
use crate::utils::{ensure_dir, timestamped_filename};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct FileSaveConfig {
    pub temp_dir: PathBuf,
    pub file_prefix: String,
    pub include_metadata: bool,
}

impl Default for FileSaveConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            file_prefix: "tool_output".to_string(),
            include_metadata: true,
        }
    }
}

pub struct FileSaveHook {
    state: HookState,
    config: FileSaveConfig,
}

impl FileSaveHook {
    pub fn new(priority: i32, binding: HookBinding, config: FileSaveConfig) -> Self {
        Self {
            state: HookState::new("file_save", priority, HookRule::default(), binding),
            config,
        }
    }
}

#[async_trait]
impl Hook for FileSaveHook {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.state.set_enabled(enabled);
    }

    fn priority(&self) -> i32 {
        self.state.priority()
    }

    fn rule(&self) -> &HookRule {
        &self.state.rule
    }

    fn binding(&self) -> &HookBinding {
        &self.state.binding
    }

    async fn process(&self, result: Value, tool_name: &str, _arguments: &Value, _ctx: &HookContext) -> Value {
        match self.write(&result, tool_name) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("file_save hook failed for tool '{tool_name}': {e}");
                json!({
                    "error": format!("failed to save output to file: {e}"),
                    "original_output": crate::hooks::rule::to_display_string(&result),
                    "tool_name": tool_name,
                    "hook_name": self.name(),
                })
            }
        }
    }
}

impl FileSaveHook {
    pub(crate) fn write(&self, result: &Value, tool_name: &str) -> anyhow::Result<Value> {
        let (format, structure) = analyze_data(result);
        let now = Utc::now();
        let filename = timestamped_filename(&self.config.file_prefix, tool_name, now, format);
        ensure_dir(&self.config.temp_dir)?;
        let file_path = self.config.temp_dir.join(&filename);

        let bytes = render_bytes(result, format);
        std::fs::write(&file_path, &bytes)?;

        let mut descriptor = json!({
            "file_path": file_path.to_string_lossy(),
            "data_format": format,
            "data_structure": structure,
            "file_size": bytes.len(),
            "created_at": now.to_rfc3339(),
            "tool_name": tool_name,
        });

        if self.config.include_metadata {
            descriptor["metadata"] = json!({
                "hook_name": self.name(),
                "hook_type": "FileSaveHook",
                "processing_time": now.to_rfc3339(),
            });
        }

        Ok(descriptor)
    }
}

/// mapping→json, list→json, str→json-if-looks-like-json-else-txt,
/// scalar→json, unknown→bin-as-string (§4.8 "FileSaveHook format detection").
fn analyze_data(value: &Value) -> (&'static str, String) {
    match value {
        Value::Object(map) => ("json", format!("dict with {} keys", map.len())),
        Value::Array(items) => ("json", format!("list with {} items", items.len())),
        Value::String(s) if looks_like_json(s) => ("json", format!("string with {} chars", s.chars().count())),
        Value::String(s) => ("txt", format!("string with {} chars", s.chars().count())),
        Value::Null | Value::Bool(_) | Value::Number(_) => ("json", "scalar".to_string()),
    }
}

fn looks_like_json(s: &str) -> bool {
    let trimmed = s.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

fn render_bytes(value: &Value, format: &str) -> Vec<u8> {
    match (format, value) {
        ("txt", Value::String(s)) => s.as_bytes().to_vec(),
        (_, Value::String(s)) => s.as_bytes().to_vec(),
        _ => serde_json::to_vec_pretty(value).unwrap_or_default(),
    }
}
