//! Predicate evaluated over a tool's result to decide whether a hook fires.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthOperator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentTypeKind {
    Json,
    Text,
}

/// At most one condition kind is meaningful per rule: the source checks
/// `output_length`, then `content_type`, then `tool_type`, then `tool_name`,
/// in that fixed order, returning on the first one present. A rule with no
/// conditions set always triggers.
#[derive(Debug, Clone, Default)]
pub struct HookRule {
    pub output_length: Option<(LengthOperator, usize)>,
    pub content_type: Option<ContentTypeKind>,
    pub tool_type: Option<String>,
    pub tool_name: Option<String>,
}

impl HookRule {
    pub fn evaluate(&self, result: &Value, tool_name: &str, tool_type: Option<&str>) -> bool {
        if let Some((op, threshold)) = &self.output_length {
            let len = display_len(result);
            return match op {
                LengthOperator::Lt => len < *threshold,
                LengthOperator::Le => len <= *threshold,
                LengthOperator::Gt => len > *threshold,
                LengthOperator::Ge => len >= *threshold,
                LengthOperator::Eq => len == *threshold,
            };
        }
        if let Some(kind) = &self.content_type {
            return match kind {
                ContentTypeKind::Json => result.is_object() || result.is_array(),
                ContentTypeKind::Text => result.is_string(),
            };
        }
        if let Some(expected) = &self.tool_type {
            return tool_type == Some(expected.as_str());
        }
        if let Some(expected) = &self.tool_name {
            return tool_name == expected;
        }
        true
    }
}

/// The value's string form, matching the source's `str(result)`.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Length of the value's string form, matching the source's `len(str(result))`.
pub fn display_len(value: &Value) -> usize {
    to_display_string(value).chars().count()
}
