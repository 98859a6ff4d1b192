//! Document values: the JSON data model plus typed identifiers, timestamps and non-finite doubles.

use super::oid::ObjectId;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

/// Insertion-ordered field mapping.
pub type Document = IndexMap<String, Value>;

/// Key holding a document's identifier.
pub const ID_FIELD: &str = "_id";

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    ObjectId(ObjectId),
    DateTime(DateTime<Utc>),
    Array(Vec<Value>),
    Document(Document),
}

impl Value {
    /// Convert request JSON. Integral numbers within i64 become `Int`, other numbers `Double`.
    pub fn from_json(v: JsonValue) -> Value {
        match v {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(arr) => Value::Array(arr.into_iter().map(Value::from_json).collect()),
            JsonValue::Object(map) => Value::Document(document_from_json(map)),
        }
    }

    /// Identifier from a path segment: 24 hex digits is an `ObjectId`, anything else a string id.
    pub fn id_from_path(s: &str) -> Value {
        match ObjectId::parse_str(s) {
            Ok(oid) => Value::ObjectId(oid),
            Err(_) => Value::String(s.to_string()),
        }
    }

    /// Every stored `_id` an identifier can denote: an object id and its hex string,
    /// an integer and its decimal string. The identifier itself comes first.
    pub fn id_aliases(&self) -> Vec<Value> {
        let mut aliases = vec![self.clone()];
        match self {
            Value::ObjectId(oid) => aliases.push(Value::String(oid.to_hex())),
            Value::Int(n) => aliases.push(Value::String(n.to_string())),
            Value::String(s) => {
                if let Ok(oid) = ObjectId::parse_str(s) {
                    aliases.push(Value::ObjectId(oid));
                    if s.bytes().any(|b| b.is_ascii_uppercase()) {
                        aliases.push(Value::String(oid.to_hex()));
                    }
                }
                if let Ok(n) = s.parse::<i64>() {
                    if n.to_string() == *s {
                        aliases.push(Value::Int(n));
                    }
                }
            }
            _ => {}
        }
        aliases
    }

    /// Canonical string form, used to compare identifiers and as a storage key.
    pub fn canonical_string(&self) -> String {
        match self {
            Value::ObjectId(oid) => oid.to_hex(),
            Value::String(s) => s.clone(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Double(d) => d.to_string(),
            Value::DateTime(d) => d.to_rfc3339(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Value::ObjectId(oid) => Some(*oid),
            Value::String(s) => ObjectId::parse_str(s).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::ObjectId(_) => "objectId",
            Value::DateTime(_) => "date",
            Value::Array(_) => "array",
            Value::Document(_) => "object",
        }
    }
}

pub fn document_from_json(map: serde_json::Map<String, JsonValue>) -> Document {
    map.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect()
}

impl From<ObjectId> for Value {
    fn from(oid: ObjectId) -> Self {
        Value::ObjectId(oid)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::DateTime(d)
    }
}

impl From<Document> for Value {
    fn from(d: Document) -> Self {
        Value::Document(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

/// Build a [`Document`] from `key => value` pairs.
#[macro_export]
macro_rules! doc {
    () => { $crate::document::Document::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut d = $crate::document::Document::new();
        $( d.insert(String::from($key), $crate::document::Value::from($value)); )+
        d
    }};
}
