//! Extended JSON storage form. Typed values are wrapped in single-key objects
//! (`$oid`, `$date`, `$numberDouble`) so they survive a round-trip through JSONB.

use super::oid::ObjectId;
use super::value::{Document, Value};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value as JsonValue};

pub fn to_extended(v: &Value) -> JsonValue {
    match v {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::from(*i),
        Value::Double(d) => match serde_json::Number::from_f64(*d) {
            Some(n) if d.fract() != 0.0 => JsonValue::Number(n),
            _ => json!({ "$numberDouble": double_text(*d) }),
        },
        Value::String(s) => JsonValue::String(s.clone()),
        Value::ObjectId(oid) => json!({ "$oid": oid.to_hex() }),
        Value::DateTime(d) => json!({ "$date": d.to_rfc3339_opts(SecondsFormat::Micros, true) }),
        Value::Array(arr) => JsonValue::Array(arr.iter().map(to_extended).collect()),
        Value::Document(d) => JsonValue::Object(document_to_extended(d)),
    }
}

pub fn document_to_extended(d: &Document) -> Map<String, JsonValue> {
    d.iter().map(|(k, v)| (k.clone(), to_extended(v))).collect()
}

fn double_text(d: f64) -> String {
    if d.is_nan() {
        "NaN".into()
    } else if d == f64::INFINITY {
        "Infinity".into()
    } else if d == f64::NEG_INFINITY {
        "-Infinity".into()
    } else {
        format!("{:?}", d)
    }
}

fn parse_double_text(s: &str) -> Option<f64> {
    match s {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

pub fn from_extended(v: JsonValue) -> Value {
    match v {
        JsonValue::Object(map) => {
            if map.len() == 1 {
                if let Some(typed) = typed_value(&map) {
                    return typed;
                }
            }
            Value::Document(document_from_extended(map))
        }
        JsonValue::Array(arr) => Value::Array(arr.into_iter().map(from_extended).collect()),
        other => Value::from_json(other),
    }
}

pub fn document_from_extended(map: Map<String, JsonValue>) -> Document {
    map.into_iter().map(|(k, v)| (k, from_extended(v))).collect()
}

fn typed_value(map: &Map<String, JsonValue>) -> Option<Value> {
    let (key, inner) = map.iter().next()?;
    let text = inner.as_str()?;
    match key.as_str() {
        "$oid" => ObjectId::parse_str(text).ok().map(Value::ObjectId),
        "$date" => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|d| Value::DateTime(d.with_timezone(&Utc))),
        "$numberDouble" => parse_double_text(text).map(Value::Double),
        _ => None,
    }
}
