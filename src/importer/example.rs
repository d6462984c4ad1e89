//! Example Generator: turns a resolved JSON Schema fragment into a
//! representative sample value.
//!
//! Total function over arbitrary schema-shaped input; no error states.
//! Deterministic for fixed input except the `date-time` format, which uses
//! the current timestamp.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

const SAMPLE_EMAIL: &str = "user@example.com";
const SAMPLE_UUID: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

/// Synthesize an example value for `schema`.
///
/// Precedence: explicit `example`, then `default`, then type-driven
/// synthesis. Unrecognized shapes yield the literal string `"unknown"`.
pub fn generate_example(schema: &Value) -> Value {
    if schema.is_null() {
        return json!("null");
    }

    if let Some(example) = schema.get("example") {
        if !example.is_null() {
            return example.clone();
        }
    }
    if let Some(default) = schema.get("default") {
        if !default.is_null() {
            return default.clone();
        }
    }

    let schema_type = schema.get("type").and_then(Value::as_str);

    if schema_type == Some("object") || schema.get("properties").is_some() {
        let mut out = Map::new();
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (key, prop) in properties {
                out.insert(key.clone(), generate_example(prop));
            }
        }
        return Value::Object(out);
    }

    match schema_type {
        Some("array") => match schema.get("items") {
            Some(items) => json!([generate_example(items)]),
            None => json!([]),
        },
        Some("string") => string_example(schema),
        Some("integer") | Some("number") => json!(0),
        Some("boolean") => json!(true),
        _ => json!("unknown"),
    }
}

fn string_example(schema: &Value) -> Value {
    match schema.get("format").and_then(Value::as_str) {
        Some("date-time") => {
            return json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        Some("email") => return json!(SAMPLE_EMAIL),
        Some("uuid") => return json!(SAMPLE_UUID),
        _ => {}
    }
    if let Some(first) = schema
        .get("enum")
        .and_then(Value::as_array)
        .and_then(|values| values.first())
    {
        return first.clone();
    }
    json!("string")
}
