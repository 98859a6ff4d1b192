//! Response encoding: documents to canonical JSON text, plus the status object returned by mutations.
//!
//! Rendering rules for values JSON has no native form for:
//! - object ids render as their 24-digit lowercase hex string;
//! - non-finite doubles render as the strings `"inf"`, `"-inf"` and `"nan"`;
//! - timestamps render as `YYYY-MM-DDTHH:MM:SS.ffffffZ` (always UTC, always six
//!   fractional digits), readable by `new Date(s)` in JS or `%Y-%m-%dT%H:%M:%S.%fZ`.

use crate::document::Value;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub fn format_timestamp(d: &DateTime<Utc>) -> String {
    d.format(TIMESTAMP_FORMAT).to_string()
}

fn non_finite_text(d: f64) -> &'static str {
    if d.is_nan() {
        "nan"
    } else if d.is_sign_negative() {
        "-inf"
    } else {
        "inf"
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Double(d) if d.is_finite() => serializer.serialize_f64(*d),
            Value::Double(d) => serializer.serialize_str(non_finite_text(*d)),
            Value::String(s) => serializer.serialize_str(s),
            Value::ObjectId(oid) => serializer.serialize_str(&oid.to_hex()),
            Value::DateTime(d) => serializer.serialize_str(&format_timestamp(d)),
            Value::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for v in arr {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Value::Document(doc) => {
                let mut map = serializer.serialize_map(Some(doc.len()))?;
                for (k, v) in doc {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// Serialize any result value to JSON text.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

/// JSON response built with [`encode`]. Encoding failures become a 500 with an error body.
pub struct JsonText<T>(pub T);

impl<T: Serialize> IntoResponse for JsonText<T> {
    fn into_response(self) -> Response {
        match encode(&self.0) {
            Ok(body) => (
                [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "response encoding failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(error_body("encoding_error", e.to_string(), None)),
                )
                    .into_response()
            }
        }
    }
}

/// Result of a mutating operation.
#[derive(Serialize)]
pub struct StatusBody<T> {
    pub success: bool,
    pub value: T,
}

pub fn status_ok<T: Serialize>(value: T) -> JsonText<StatusBody<T>> {
    JsonText(StatusBody { success: true, value })
}

pub fn error_body(code: &str, message: String, details: Option<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::document::ObjectId;

    #[test]
    fn object_ids_render_as_hex_strings() {
        let oid = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        let out = encode(&doc! { "_id" => oid }).unwrap();
        assert_eq!(out, r#"{"_id":"507f1f77bcf86cd799439011"}"#);
    }

    #[test]
    fn non_finite_doubles_render_as_strings() {
        let d = doc! { "a" => f64::INFINITY, "b" => f64::NEG_INFINITY, "c" => f64::NAN, "d" => 1.5 };
        assert_eq!(encode(&d).unwrap(), r#"{"a":"inf","b":"-inf","c":"nan","d":1.5}"#);
    }

    #[test]
    fn timestamps_use_fixed_utc_profile() {
        let when = DateTime::parse_from_rfc3339("2023-07-04T05:06:07+02:00")
            .unwrap()
            .with_timezone(&Utc);
        let out = encode(&Value::DateTime(when)).unwrap();
        assert_eq!(out, r#""2023-07-04T03:06:07.000000Z""#);
    }

    #[test]
    fn sequences_and_status_objects() {
        let docs = vec![doc! { "n" => 1i64 }, doc! { "n" => 2i64 }];
        assert_eq!(encode(&docs).unwrap(), r#"[{"n":1},{"n":2}]"#);
        let body = StatusBody { success: true, value: Value::Null };
        assert_eq!(encode(&body).unwrap(), r#"{"success":true,"value":null}"#);
    }
}
