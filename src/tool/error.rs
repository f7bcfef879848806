use serde::Serialize;
use serde_json::{Map, Value};

/// Per-call error taxonomy (§3, §7). Distinct from [`crate::errors::EngineError`]:
/// a `ToolError` is a data value the engine returns, never a Rust error
/// propagated via `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    Validation,
    Auth,
    RateLimit,
    Unavailable,
    Config,
    Dependency,
    Server,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_steps: Vec<String>,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Map::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn with_details_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }

    pub fn with_next_steps(mut self, steps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.next_steps = steps.into_iter().map(Into::into).collect();
        self
    }

    /// The dual-format response: a legacy flat `{"error": "..."}` map
    /// alongside a structured `error_details` object (§4.7, §8 "Error
    /// dual-format"). Downstream callers choose which shape to consume.
    pub fn to_dual_format(&self) -> Value {
        serde_json::json!({
            "error": self.message,
            "error_details": {
                "kind": self.kind,
                "message": self.message,
                "details": self.details,
                "next_steps": self.next_steps,
            },
        })
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ToolError {}
