//! The per-tool contract every live tool implementation must honor.
//!
//! A `ToolConfig` is the declarative descriptor loaded from a config file;
//! a `Tool` is the live, callable instance built from one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

mod error;
pub use error::{ToolError, ToolErrorKind};

#[cfg(test)]
mod tests;

/// Declarative descriptor of one tool, as read from a config file. Immutable
/// once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    /// The loader category this tool was grouped under (e.g. the key in
    /// `[loader.categories]`), distinct from `type_tag`'s constructor
    /// identity. Builtin tools tag themselves `"builtin"`.
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "parameter")]
    pub parameter_schema: Value,
    #[serde(default)]
    pub return_schema: Option<Value>,
    #[serde(default)]
    pub required_api_keys: Vec<String>,
    #[serde(default)]
    pub optional_api_keys: Vec<String>,
    #[serde(default = "default_true")]
    pub cacheable: bool,
    #[serde(default)]
    pub cache_ttl: Option<u64>,
    #[serde(default)]
    pub batch_max_concurrency: u32,
    #[serde(default)]
    pub supports_streaming: bool,
}

fn default_true() -> bool {
    true
}

/// Parameters the engine threads through to a tool's `run`, modeled as an
/// explicit struct rather than reflected-upon kwargs (§9 DESIGN NOTES:
/// argument inspection replaced by a `RunOptions` struct). A tool opts into
/// a field by reading it; unused fields are simply ignored.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub use_cache: bool,
    pub validate: bool,
    pub stream_callback: Option<std::sync::Arc<dyn Fn(String) + Send + Sync>>,
}

/// A live, callable implementation of a `ToolConfig`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn config(&self) -> &ToolConfig;

    /// Execute the tool. `opts.stream_callback`, if set and
    /// `self.config().supports_streaming()`, receives chunks as they are
    /// produced; the return value is always the full (possibly
    /// concatenated) result.
    async fn run(&self, arguments: Value, opts: &RunOptions) -> anyhow::Result<Value>;

    /// Validate `arguments` against `parameter_schema`. Returns a
    /// `Validation` error on mismatch, `None` on success. Tools MAY override
    /// with stricter checks; the default uses `jsonschema`.
    fn validate_parameters(&self, arguments: &Value) -> Option<ToolError> {
        let schema = &self.config().parameter_schema;
        if schema.is_null() || (schema.is_object() && schema.as_object().unwrap().is_empty()) {
            return None;
        }
        let validator = match jsonschema::validator_for(schema) {
            Ok(v) => v,
            Err(e) => {
                return Some(ToolError::new(
                    ToolErrorKind::Validation,
                    format!("invalid parameter schema: {e}"),
                ));
            }
        };
        let errors: Vec<String> = validator
            .iter_errors(arguments)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            None
        } else {
            Some(
                ToolError::new(
                    ToolErrorKind::Validation,
                    format!("parameter validation failed: {}", errors.join("; ")),
                )
                .with_details_entry("validation_errors", Value::from(errors)),
            )
        }
    }

    /// Classify a runtime failure into a structured `ToolError`. The default
    /// classifier inspects message substrings, case-insensitively, in a
    /// fixed priority order (ported from the reference tool harness'
    /// `handle_error`).
    fn handle_error(&self, exception: &anyhow::Error) -> ToolError {
        classify_error(&exception.to_string())
    }

    /// Default cache key: hex digest of a stable serialization of
    /// `{tool_name, arguments}` with keys sorted.
    fn get_cache_key(&self, arguments: &Value) -> String {
        let mut map = Map::new();
        map.insert("tool_name".to_string(), Value::String(self.config().name.clone()));
        map.insert("arguments".to_string(), arguments.clone());
        let canonical = canonical_json(&Value::Object(map));
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn get_cache_namespace(&self) -> String {
        self.config().name.clone()
    }

    /// Stable version fingerprint: hex digest (first 16 chars) of a static
    /// marker XORed conceptually with source identity and parameter schema.
    /// The framework has no reflection into a tool's source in Rust, so the
    /// marker defaults to the tool's type tag; tools with code that changes
    /// behavior without changing `type_tag` or schema MUST override this.
    fn get_cache_version(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"1");
        hasher.update(self.config().type_tag.as_bytes());
        hasher.update(canonical_json(&self.config().parameter_schema).as_bytes());
        hex::encode(hasher.finalize())[..16].to_string()
    }

    /// `tool_config.cache_ttl`, or `None` if unset.
    fn get_cache_ttl(&self, _result: &Value) -> Option<u64> {
        self.config().cache_ttl
    }

    fn supports_caching(&self) -> bool {
        self.config().cacheable
    }

    fn supports_streaming(&self) -> bool {
        self.config().supports_streaming
    }

    /// `max(0, batch_max_concurrency)`; 0 means unlimited. Negative values
    /// cannot occur — `batch_max_concurrency` is `u32` and a negative
    /// literal fails config deserialization instead (Open Question #3).
    fn get_batch_concurrency_limit(&self) -> u32 {
        self.config().batch_max_concurrency
    }

    /// The subset of `RunOptions` fields this tool actually reads. The
    /// engine forwards only the intersection (§4.7 step 7); the default
    /// advertises none, i.e. the tool ignores streaming/use_cache/validate
    /// hints entirely.
    fn accepted_run_options(&self) -> BTreeSet<&'static str> {
        BTreeSet::new()
    }
}

/// Classify a raw error message into a `ToolError` kind. Case-insensitive
/// substring matching in a fixed priority order, ported from the reference
/// tool harness' default `handle_error`.
pub fn classify_error(message: &str) -> ToolError {
    let lower = message.to_lowercase();

    let auth = ["auth", "unauthorized", "401", "403", "api key", "token"];
    let rate_limit = ["rate limit", "429", "quota", "limit exceeded"];
    let unavailable = [
        "unavailable",
        "timeout",
        "connection",
        "network",
        "not found",
        "404",
    ];
    let validation = ["validation", "invalid", "schema", "parameter"];
    let config = ["config", "configuration", "setup"];
    let dependency = ["import", "module", "dependency", "package"];

    let kind = if auth.iter().any(|k| lower.contains(k)) {
        ToolErrorKind::Auth
    } else if rate_limit.iter().any(|k| lower.contains(k)) {
        ToolErrorKind::RateLimit
    } else if unavailable.iter().any(|k| lower.contains(k)) {
        ToolErrorKind::Unavailable
    } else if validation.iter().any(|k| lower.contains(k)) {
        ToolErrorKind::Validation
    } else if config.iter().any(|k| lower.contains(k)) {
        ToolErrorKind::Config
    } else if dependency.iter().any(|k| lower.contains(k)) {
        ToolErrorKind::Dependency
    } else {
        ToolErrorKind::Server
    };

    ToolError::new(kind, message.to_string())
}

/// Serialize a JSON value with object keys sorted (arrays keep their
/// original order), producing a stable string for cache-key hashing.
pub fn canonical_json(value: &Value) -> String {
    canonical_value(value).to_string()
}

fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: std::collections::BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonical_value(v)))
                .collect();
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        other => other.clone(),
    }
}
