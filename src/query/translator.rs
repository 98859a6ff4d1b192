//! Query string to filter translation.
//!
//! Three forms are accepted:
//! - no parameters: empty filter, every document matches;
//! - `query_string=<json>`: the decoded JSON object is the filter, with every string
//!   leaf of the form `Identifier(<24 hex>)` replaced by a typed object id;
//! - anything else: each parameter is an equality constraint on a literal string.
//!   No identifier coercion happens in this form.

use crate::document::{Document, ObjectId, Value};
use crate::error::ParseError;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Parameter carrying a serialized filter.
pub const FILTER_PARAM: &str = "query_string";

/// Filter handed to the store's find operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryFilter(Document);

impl QueryFilter {
    pub fn empty() -> Self {
        QueryFilter(Document::new())
    }

    pub fn from_document(doc: Document) -> Self {
        QueryFilter(doc)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^Identifier\(([0-9a-fA-F]{24})\)$").expect("static pattern"))
}

/// Build a filter from decoded query parameters. Repeated keys have already been
/// collapsed to one value by the extractor.
pub fn translate(params: &HashMap<String, String>) -> Result<QueryFilter, ParseError> {
    if params.is_empty() {
        return Ok(QueryFilter::empty());
    }
    if let Some(raw) = params.get(FILTER_PARAM) {
        if params.len() > 1 {
            tracing::debug!(ignored = params.len() - 1, "{} present, other parameters ignored", FILTER_PARAM);
        }
        return parse_filter(raw);
    }
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();
    let doc = keys
        .into_iter()
        .map(|k| (k.clone(), Value::String(params[k].clone())))
        .collect();
    Ok(QueryFilter(doc))
}

/// Decode a serialized filter and rewrite identifier literals.
pub fn parse_filter(raw: &str) -> Result<QueryFilter, ParseError> {
    let json: JsonValue = serde_json::from_str(raw).map_err(|e| ParseError::json("query_string filter", e))?;
    match map_leaves(json, &rewrite_identifier) {
        Value::Document(doc) => Ok(QueryFilter(doc)),
        _ => Err(ParseError::NotAnObject("query_string filter")),
    }
}

/// Recursively convert JSON, descending into objects and arrays and applying
/// `leaf` to every scalar.
pub fn map_leaves<F>(value: JsonValue, leaf: &F) -> Value
where
    F: Fn(JsonValue) -> Value,
{
    match value {
        JsonValue::Object(map) => Value::Document(map.into_iter().map(|(k, v)| (k, map_leaves(v, leaf))).collect()),
        JsonValue::Array(arr) => Value::Array(arr.into_iter().map(|v| map_leaves(v, leaf)).collect()),
        scalar => leaf(scalar),
    }
}

fn rewrite_identifier(scalar: JsonValue) -> Value {
    if let JsonValue::String(s) = &scalar {
        if let Some(hex) = identifier_pattern().captures(s).and_then(|c| c.get(1)) {
            if let Ok(oid) = ObjectId::parse_str(hex.as_str()) {
                return Value::ObjectId(oid);
            }
        }
    }
    Value::from_json(scalar)
}
