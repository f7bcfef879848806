use super::*;
use serde_json::json;

#[test]
fn canonical_json_sorts_object_keys() {
    let value = json!({"b": 1, "a": 2});
    assert_eq!(canonical_json(&value), r#"{"a":2,"b":1}"#);
}

#[test]
fn canonical_json_preserves_array_order() {
    let value = json!([3, 1, 2]);
    assert_eq!(canonical_json(&value), "[3,1,2]");
}

#[test]
fn canonical_json_sorts_nested_objects() {
    let value = json!({"z": {"y": 1, "x": 2}, "a": 1});
    assert_eq!(canonical_json(&value), r#"{"a":1,"z":{"x":2,"y":1}}"#);
}

#[test]
fn classify_error_priority_order() {
    assert_eq!(
        classify_error("401 unauthorized").kind,
        ToolErrorKind::Auth
    );
    assert_eq!(
        classify_error("429 too many requests, quota exceeded").kind,
        ToolErrorKind::RateLimit
    );
    assert_eq!(
        classify_error("connection timeout to upstream").kind,
        ToolErrorKind::Unavailable
    );
    assert_eq!(
        classify_error("invalid parameter for schema").kind,
        ToolErrorKind::Validation
    );
    assert_eq!(
        classify_error("bad configuration setup").kind,
        ToolErrorKind::Config
    );
    assert_eq!(
        classify_error("missing module dependency").kind,
        ToolErrorKind::Dependency
    );
    assert_eq!(
        classify_error("something exploded").kind,
        ToolErrorKind::Server
    );
}

#[test]
fn classify_error_is_case_insensitive() {
    assert_eq!(
        classify_error("AUTHENTICATION FAILED").kind,
        ToolErrorKind::Auth
    );
}

#[test]
fn dual_format_contains_both_shapes() {
    let err = ToolError::new(ToolErrorKind::Validation, "bad input")
        .with_next_steps(["fix the input"]);
    let value = err.to_dual_format();
    assert_eq!(value["error"], "bad input");
    assert_eq!(value["error_details"]["kind"], "validation");
    assert_eq!(value["error_details"]["next_steps"][0], "fix the input");
}

struct EchoTool {
    config: ToolConfig,
}

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn config(&self) -> &ToolConfig {
        &self.config
    }

    async fn run(&self, arguments: Value, _opts: &RunOptions) -> anyhow::Result<Value> {
        Ok(arguments)
    }
}

fn echo_config() -> ToolConfig {
    ToolConfig {
        name: "Echo".to_string(),
        type_tag: "EchoTool".to_string(),
        category: String::new(),
        description: String::new(),
        parameter_schema: Value::Null,
        return_schema: None,
        required_api_keys: vec![],
        optional_api_keys: vec![],
        cacheable: true,
        cache_ttl: None,
        batch_max_concurrency: 0,
        supports_streaming: false,
    }
}

#[test]
fn get_cache_key_is_stable_across_argument_key_order() {
    let tool = EchoTool { config: echo_config() };
    let a = tool.get_cache_key(&json!({"x": 1, "y": 2}));
    let b = tool.get_cache_key(&json!({"y": 2, "x": 1}));
    assert_eq!(a, b);
}

#[test]
fn get_cache_key_differs_across_tool_names() {
    let tool_a = EchoTool {
        config: ToolConfig { name: "A".to_string(), ..echo_config() },
    };
    let tool_b = EchoTool {
        config: ToolConfig { name: "B".to_string(), ..echo_config() },
    };
    let args = json!({"x": 1});
    assert_ne!(tool_a.get_cache_key(&args), tool_b.get_cache_key(&args));
}

#[test]
fn get_cache_version_changes_with_schema() {
    let mut cfg_a = echo_config();
    cfg_a.parameter_schema = json!({"type": "object"});
    let mut cfg_b = echo_config();
    cfg_b.parameter_schema = json!({"type": "string"});
    let a = EchoTool { config: cfg_a };
    let b = EchoTool { config: cfg_b };
    assert_ne!(a.get_cache_version(), b.get_cache_version());
}

#[test]
fn validate_parameters_passes_with_empty_schema() {
    let tool = EchoTool { config: echo_config() };
    assert!(tool.validate_parameters(&json!({"anything": true})).is_none());
}

#[test]
fn validate_parameters_rejects_schema_mismatch() {
    let mut cfg = echo_config();
    cfg.parameter_schema = json!({
        "type": "object",
        "required": ["x"],
        "properties": {"x": {"type": "integer"}},
    });
    let tool = EchoTool { config: cfg };
    let err = tool.validate_parameters(&json!({})).expect("should fail");
    assert_eq!(err.kind, ToolErrorKind::Validation);
}

#[test]
fn default_batch_concurrency_limit_is_zero_meaning_unlimited() {
    let tool = EchoTool { config: echo_config() };
    assert_eq!(tool.get_batch_concurrency_limit(), 0);
}
