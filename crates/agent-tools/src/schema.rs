//! JSON schema builders and parameter validation
//!
//! Only the subset of JSON Schema the catalogue uses is understood:
//! `type`, `properties`, `required`, `additionalProperties: false`, `enum`,
//! `pattern`, `minimum` and `exclusiveMinimum`.

use regex::Regex;
use serde_json::{Map, Value, json};

/// Create a JSON schema for an object with properties
///
/// Unknown properties are rejected.
pub fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// String property schema
pub fn string(description: &str) -> Value {
    json!({
        "type": "string",
        "description": description,
    })
}

/// String property restricted to a closed set of values
pub fn string_enum(description: &str, values: &[&str]) -> Value {
    json!({
        "type": "string",
        "description": description,
        "enum": values,
    })
}

/// A-share stock code: exactly six digits
pub fn stock_code() -> Value {
    json!({
        "type": "string",
        "description": "6-digit A-share stock code, e.g. 600519",
        "pattern": "^[0-9]{6}$",
    })
}

/// Number property schema
pub fn number(description: &str) -> Value {
    json!({
        "type": "number",
        "description": description,
    })
}

/// Number strictly greater than zero
pub fn positive_number(description: &str) -> Value {
    json!({
        "type": "number",
        "description": description,
        "exclusiveMinimum": 0,
    })
}

/// Integer property schema
pub fn integer(description: &str) -> Value {
    json!({
        "type": "integer",
        "description": description,
    })
}

/// Integer with a lower bound
pub fn integer_min(description: &str, minimum: i64) -> Value {
    json!({
        "type": "integer",
        "description": description,
        "minimum": minimum,
    })
}

/// Boolean property schema
pub fn boolean(description: &str) -> Value {
    json!({
        "type": "boolean",
        "description": description,
    })
}

/// Array property schema
pub fn array(description: &str, items: Value) -> Value {
    json!({
        "type": "array",
        "description": description,
        "items": items,
    })
}

/// Validate `value` against `schema`
///
/// The error names the offending path, e.g. `params.stock_code: ...`.
pub fn validate(schema: &Value, value: &Value) -> Result<(), String> {
    validate_at("params", schema, value)
}

fn validate_at(path: &str, schema: &Value, value: &Value) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        check_type(path, expected, value)?;
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(format!("{path}: {value} is not one of {}", Value::from(allowed.clone())));
        }
    }

    if let (Some(pattern), Some(text)) = (schema.get("pattern").and_then(Value::as_str), value.as_str()) {
        let re = Regex::new(pattern).map_err(|e| format!("{path}: bad pattern in schema: {e}"))?;
        if !re.is_match(text) {
            return Err(format!("{path}: '{text}' does not match {pattern}"));
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
            if n < min {
                return Err(format!("{path}: {n} is below the minimum {min}"));
            }
        }
        if let Some(min) = schema.get("exclusiveMinimum").and_then(Value::as_f64) {
            if n <= min {
                return Err(format!("{path}: {n} must be greater than {min}"));
            }
        }
    }

    if let Some(map) = value.as_object() {
        validate_object(path, schema, map)?;
    }

    if let (Some(items), Some(array)) = (schema.get("items"), value.as_array()) {
        for (i, item) in array.iter().enumerate() {
            validate_at(&format!("{path}[{i}]"), items, item)?;
        }
    }

    Ok(())
}

fn validate_object(path: &str, schema: &Value, map: &Map<String, Value>) -> Result<(), String> {
    let properties = schema.get("properties").and_then(Value::as_object);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if map.get(name).is_none_or(Value::is_null) {
                return Err(format!("{path}: missing required field '{name}'"));
            }
        }
    }

    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));
    for (name, field) in map {
        match properties.and_then(|p| p.get(name)) {
            Some(field_schema) => {
                // Optional fields may be passed as explicit nulls
                if !field.is_null() {
                    validate_at(&format!("{path}.{name}"), field_schema, field)?;
                }
            }
            None if closed => return Err(format!("{path}: unknown field '{name}'")),
            None => {}
        }
    }
    Ok(())
}

fn check_type(path: &str, expected: &str, value: &Value) -> Result<(), String> {
    let ok = match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("{path}: expected {expected}, got {}", type_name(value)))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
