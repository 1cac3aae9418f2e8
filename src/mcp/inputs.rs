//! Tool input handling: defaults from a tool's input schema and validation
//! of user-supplied values against it.

use serde_json::{Map, Value};
use tracing::debug;

use crate::mcp::error::McpError;

/// Build an input object from each property's `default` (or `const`),
/// recursing into nested object properties. Properties without either are
/// left out.
pub fn default_inputs(schema: &Value) -> Value {
    let mut object = Map::new();
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Value::Object(object);
    };

    for (name, property) in properties {
        if let Some(value) = property.get("default").or_else(|| property.get("const")) {
            object.insert(name.clone(), value.clone());
        } else if is_object_schema(property) {
            let nested = default_inputs(property);
            if nested.as_object().is_some_and(|map| !map.is_empty()) {
                object.insert(name.clone(), nested);
            }
        }
    }

    Value::Object(object)
}

/// Overlay `inputs` on top of `defaults`. Nested objects merge key by key;
/// everything else from `inputs` wins outright.
pub fn merge_inputs(defaults: Value, inputs: Value) -> Value {
    match (defaults, inputs) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge_inputs(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, inputs) => inputs,
    }
}

/// Check `inputs` against the tool's input schema. A schema that cannot be
/// compiled accepts everything.
pub fn validate_inputs(schema: &Value, inputs: &Value) -> Result<(), McpError> {
    if schema.is_null() {
        return Ok(());
    }

    let validator = match jsonschema::validator_for(schema) {
        Ok(validator) => validator,
        Err(err) => {
            debug!(error = %err, "Skipping validation for uncompilable input schema");
            return Ok(());
        }
    };

    let problems: Vec<String> = validator
        .iter_errors(inputs)
        .map(|err| err.to_string())
        .collect();

    if problems.is_empty() {
        Ok(())
    } else {
        Err(McpError::InvalidInput(problems))
    }
}

fn is_object_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("object")
        || schema.get("properties").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["city"],
            "properties": {
                "city": { "type": "string", "minLength": 1 },
                "days": { "type": "integer", "default": 3, "minimum": 1, "maximum": 10 },
                "units": { "type": "string", "enum": ["metric", "imperial"], "default": "metric" },
                "format": { "const": "json" },
                "options": {
                    "type": "object",
                    "properties": {
                        "hourly": { "type": "boolean", "default": false },
                        "lang": { "type": "string" }
                    }
                },
                "extra": { "type": "object", "properties": { "x": { "type": "string" } } }
            }
        })
    }

    #[test]
    fn defaults_collect_default_and_const_values() {
        assert_eq!(
            default_inputs(&schema()),
            json!({
                "days": 3,
                "units": "metric",
                "format": "json",
                "options": { "hourly": false }
            })
        );
    }

    #[test]
    fn defaults_for_schema_without_properties_are_empty() {
        assert_eq!(default_inputs(&json!({ "type": "object" })), json!({}));
        assert_eq!(default_inputs(&Value::Null), json!({}));
    }

    #[test]
    fn merge_prefers_user_values_and_keeps_nested_defaults() {
        let merged = merge_inputs(
            default_inputs(&schema()),
            json!({ "city": "Oslo", "days": 5, "options": { "lang": "no" } }),
        );
        assert_eq!(
            merged,
            json!({
                "city": "Oslo",
                "days": 5,
                "units": "metric",
                "format": "json",
                "options": { "hourly": false, "lang": "no" }
            })
        );
    }

    #[test]
    fn valid_inputs_pass() {
        let inputs = json!({ "city": "Oslo", "days": 2 });
        assert!(validate_inputs(&schema(), &inputs).is_ok());
    }

    #[test]
    fn invalid_inputs_report_every_problem() {
        let inputs = json!({ "days": 0, "units": "kelvin" });
        match validate_inputs(&schema(), &inputs) {
            Err(McpError::InvalidInput(problems)) => assert_eq!(problems.len(), 3),
            other => panic!("expected invalid input, got {other:?}"),
        }
    }

    #[test]
    fn uncompilable_or_missing_schema_is_accepted() {
        let broken = json!({ "type": "string", "pattern": "(" });
        assert!(validate_inputs(&broken, &json!({ "anything": 1 })).is_ok());
        assert!(validate_inputs(&Value::Null, &json!(42)).is_ok());
    }
}
