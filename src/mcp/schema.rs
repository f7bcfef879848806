//! Normalizes a tool's `parameter_schema` into an MCP `inputSchema`.
//!
//! Tool configs sometimes mark a property required in-line (`"required":
//! true` or the string `"True"`) instead of listing it in the schema's
//! `required` array. `derive_input_schema` lifts those markers up, cleaning
//! nested object/array schemas the same way, so every property that is ever
//! required ends up exactly once in its parent's `required` array.

use serde_json::{Map, Value};

pub fn derive_input_schema(parameter_schema: &Value) -> Value {
    let mut schema = normalize(parameter_schema);
    if let Value::Object(map) = &mut schema {
        map.entry("type").or_insert_with(|| Value::String("object".to_string()));
        map.entry("properties").or_insert_with(|| Value::Object(Map::new()));
    } else {
        schema = serde_json::json!({"type": "object", "properties": {}});
    }
    schema
}

fn normalize(schema: &Value) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    let mut lifted_required: Vec<String> = match map.get("required") {
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    };

    let mut out = Map::new();

    if let Some(Value::Object(properties)) = map.get("properties") {
        let mut normalized_properties = Map::new();
        for (name, prop) in properties {
            let (clean_prop, is_required) = normalize_named_property(prop);
            if is_required && !lifted_required.contains(name) {
                lifted_required.push(name.clone());
            }
            normalized_properties.insert(name.clone(), clean_prop);
        }
        out.insert("properties".to_string(), Value::Object(normalized_properties));
    }

    if let Some(items) = map.get("items") {
        out.insert("items".to_string(), normalize_items(items));
    }

    for (key, value) in map {
        if matches!(key.as_str(), "properties" | "required" | "items") {
            continue;
        }
        out.insert(key.clone(), value.clone());
    }

    if !lifted_required.is_empty() {
        out.insert("required".to_string(), Value::Array(lifted_required.into_iter().map(Value::String).collect()));
    }

    Value::Object(out)
}

fn normalize_items(items: &Value) -> Value {
    match items {
        Value::Array(schemas) => Value::Array(schemas.iter().map(normalize).collect()),
        other => normalize(other),
    }
}

/// Normalizes one named property's schema (a value under a parent's
/// `properties` map), stripping its in-line `required` marker and reporting
/// whether it was set (truthy, or the strings "true"/"True"). The property's
/// own nested `properties`/`items` are normalized the same way as any other
/// schema, so the lift propagates arbitrarily deep.
fn normalize_named_property(prop: &Value) -> (Value, bool) {
    let Value::Object(map) = prop else {
        return (prop.clone(), false);
    };

    let is_required = map.get("required").is_some_and(is_truthy_marker);
    let mut without_marker = map.clone();
    without_marker.remove("required");
    (normalize(&Value::Object(without_marker)), is_required)
}

fn is_truthy_marker(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
