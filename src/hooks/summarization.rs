//! AI-assisted summarization hook, delegating to a composer tool (§3, §4.8).

use crate::hooks::{Hook, HookBinding, HookRule, HookState};
use crate::hooks::rule::LengthOperator;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Abstraction over invoking the composer tool through the engine, breaking
/// the cycle between `hooks` and `engine` (the engine owns the hook
/// pipeline; the hook only needs to call back into it).
#[async_trait]
pub trait Composer: Send + Sync {
    async fn compose_summary(&self, arguments: Value) -> anyhow::Result<Value>;
}

const DEFAULT_THRESHOLD: usize = 5000;
const DEFAULT_CHUNK_SIZE: u32 = 30_000;
const DEFAULT_MAX_SUMMARY_LENGTH: u32 = 3_000;
const DEFAULT_COMPOSER_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct SummarizationConfig {
    pub composer_tool: String,
    pub chunk_size: u32,
    pub focus_areas: String,
    pub max_summary_length: u32,
    pub composer_timeout_secs: u64,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            composer_tool: "OutputSummarizationComposer".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            focus_areas: "key_findings_and_results".to_string(),
            max_summary_length: DEFAULT_MAX_SUMMARY_LENGTH,
            composer_timeout_secs: DEFAULT_COMPOSER_TIMEOUT_SECS,
        }
    }
}

pub struct SummarizationHook {
    state: HookState,
    config: SummarizationConfig,
    composer: Arc<dyn Composer>,
}

impl SummarizationHook {
    pub fn new(priority: i32, binding: HookBinding, config: SummarizationConfig, composer: Arc<dyn Composer>) -> Self {
        let rule = HookRule {
            output_length: Some((LengthOperator::Gt, DEFAULT_THRESHOLD)),
            ..Default::default()
        };
        Self {
            state: HookState::new("summarization", priority, rule, binding),
            config,
            composer,
        }
    }

    fn extract_query_context(&self, arguments: &Value) -> String {
        const QUERY_KEYS: &[&str] = &["query", "question", "input", "text", "search_term", "prompt"];
        for key in QUERY_KEYS {
            if let Some(value) = arguments.get(key) {
                return value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
            }
        }
        "tool execution".to_string()
    }
}

#[async_trait]
impl Hook for SummarizationHook {
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

    async fn process(&self, result: Value, tool_name: &str, arguments: &Value, _ctx: &crate::hooks::HookContext) -> Value {
        if result.is_null() || result == Value::String(String::new()) {
            return result;
        }

        let composer_args = json!({
            "tool_output": crate::hooks::rule::to_display_string(&result),
            "query_context": self.extract_query_context(arguments),
            "tool_name": tool_name,
            "chunk_size": self.config.chunk_size,
            "focus_areas": self.config.focus_areas,
            "max_summary_length": self.config.max_summary_length,
        });

        let timeout = Duration::from_secs(self.config.composer_timeout_secs);
        let outcome = tokio::time::timeout(timeout, self.composer.compose_summary(composer_args)).await;

        match outcome {
            Ok(Ok(composer_result)) => {
                if composer_result
                    .get("success")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
                {
                    composer_result.get("summary").cloned().unwrap_or(result)
                } else if let Value::String(_) = &composer_result {
                    composer_result
                } else {
                    warn!("composer '{}' returned an unexpected shape, keeping original result", self.config.composer_tool);
                    result
                }
            }
            Ok(Err(e)) => {
                warn!("composer '{}' failed: {e}", self.config.composer_tool);
                result
            }
            Err(_) => {
                warn!(
                    "composer '{}' timed out after {}s",
                    self.config.composer_tool, self.config.composer_timeout_secs
                );
                result
            }
        }
    }
}
