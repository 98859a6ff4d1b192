//! In-process filter evaluation shared by the bundled store backends.

use crate::document::{Document, Value};
use crate::error::StoreError;
use std::cmp::Ordering;

/// True when `doc` satisfies every constraint in `filter`.
pub fn matches(doc: &Document, filter: &Document) -> Result<bool, StoreError> {
    for (key, cond) in filter {
        let ok = match key.as_str() {
            "$and" => clauses(key, cond)?.iter().try_fold(true, |acc, f| Ok::<_, StoreError>(acc && matches(doc, f)?))?,
            "$or" => {
                let mut any = false;
                for f in clauses(key, cond)? {
                    if matches(doc, f)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for f in clauses(key, cond)? {
                    if matches(doc, f)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            op if op.starts_with('$') => return Err(StoreError::UnsupportedOperator(op.to_string())),
            path => field_matches(&lookup(doc, path), cond)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(op: &str, cond: &'a Value) -> Result<Vec<&'a Document>, StoreError> {
    match cond {
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .map(|v| v.as_document().ok_or_else(|| StoreError::InvalidQuery(format!("{} entries must be objects", op))))
            .collect(),
        _ => Err(StoreError::InvalidQuery(format!("{} requires a non-empty array", op))),
    }
}

/// Values reachable at a dotted path. Arrays along the way fan out over their elements;
/// a numeric segment also indexes into an array.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let mut current: Vec<&Value> = Vec::new();
    let mut segments = path.split('.');
    let first = match segments.next() {
        Some(s) => s,
        None => return current,
    };
    if let Some(v) = doc.get(first) {
        current.push(v);
    }
    for seg in segments {
        let mut next = Vec::new();
        for v in current {
            match v {
                Value::Document(d) => {
                    if let Some(child) = d.get(seg) {
                        next.push(child);
                    }
                }
                Value::Array(items) => {
                    if let Ok(idx) = seg.parse::<usize>() {
                        if let Some(child) = items.get(idx) {
                            next.push(child);
                        }
                    } else {
                        for item in items {
                            if let Value::Document(d) = item {
                                if let Some(child) = d.get(seg) {
                                    next.push(child);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
}

fn is_operator_document(cond: &Value) -> bool {
    match cond {
        Value::Document(d) => !d.is_empty() && d.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn field_matches(found: &[&Value], cond: &Value) -> Result<bool, StoreError> {
    if let (true, Value::Document(ops)) = (is_operator_document(cond), cond) {
        for (op, arg) in ops {
            if !apply_operator(found, op, arg)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }
    Ok(equals_any(found, cond))
}

/// Equality with array-element semantics; `null` also matches a missing field.
fn equals_any(found: &[&Value], target: &Value) -> bool {
    if found.is_empty() {
        return matches!(target, Value::Null);
    }
    found.iter().any(|v| {
        values_equal(v, target)
            || matches!(v, Value::Array(items) if items.iter().any(|item| values_equal(item, target)))
    })
}

fn apply_operator(found: &[&Value], op: &str, arg: &Value) -> Result<bool, StoreError> {
    Ok(match op {
        "$eq" => equals_any(found, arg),
        "$ne" => !equals_any(found, arg),
        "$gt" => compare_any(found, arg, |o| o == Ordering::Greater),
        "$gte" => compare_any(found, arg, |o| o != Ordering::Less),
        "$lt" => compare_any(found, arg, |o| o == Ordering::Less),
        "$lte" => compare_any(found, arg, |o| o != Ordering::Greater),
        "$in" => in_list(found, op, arg)?,
        "$nin" => !in_list(found, op, arg)?,
        "$exists" => {
            let want = match arg {
                Value::Bool(b) => *b,
                Value::Int(i) => *i != 0,
                other => return Err(StoreError::InvalidQuery(format!("$exists expects a boolean, got {}", other.type_name()))),
            };
            want == !found.is_empty()
        }
        other => return Err(StoreError::UnsupportedOperator(other.to_string())),
    })
}

fn in_list(found: &[&Value], op: &str, arg: &Value) -> Result<bool, StoreError> {
    match arg {
        Value::Array(options) => Ok(options.iter().any(|opt| equals_any(found, opt))),
        _ => Err(StoreError::InvalidQuery(format!("{} requires an array", op))),
    }
}

fn compare_any(found: &[&Value], arg: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    found.iter().any(|v| {
        let candidates: Vec<&Value> = match v {
            Value::Array(items) => items.iter().collect(),
            single => vec![*single],
        };
        candidates.into_iter().any(|c| compare(c, arg).map(&accept).unwrap_or(false))
    })
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
            compare(a, b) == Some(Ordering::Equal)
        }
        (Value::Array(x), Value::Array(y)) => x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r)),
        (Value::Document(x), Value::Document(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|((lk, lv), (rk, rv))| lk == rk && values_equal(lv, rv))
        }
        _ => a == b,
    }
}

/// Ordering between values of the same kind. Ints and doubles compare numerically.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::ObjectId(x), Value::ObjectId(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::document::ObjectId;

    fn sample() -> Document {
        doc! {
            "_id" => ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap(),
            "status" => "open",
            "count" => 3i64,
            "tags" => vec![Value::from("xpp"), Value::from("sxr")],
            "detector" => doc! { "name" => "cspad", "gain" => 1.5 },
            "runs" => vec![Value::from(doc! { "num" => 1i64 }), Value::from(doc! { "num" => 7i64 })],
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(matches(&sample(), &Document::new()).unwrap());
    }

    #[test]
    fn equality_on_object_id_and_strings() {
        let oid = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        assert!(matches(&sample(), &doc! { "_id" => oid }).unwrap());
        assert!(!matches(&sample(), &doc! { "_id" => "507f1f77bcf86cd799439011" }).unwrap());
        assert!(matches(&sample(), &doc! { "status" => "open" }).unwrap());
        assert!(!matches(&sample(), &doc! { "status" => "closed" }).unwrap());
    }

    #[test]
    fn dotted_paths_and_arrays() {
        assert!(matches(&sample(), &doc! { "detector.name" => "cspad" }).unwrap());
        assert!(matches(&sample(), &doc! { "tags" => "sxr" }).unwrap());
        assert!(matches(&sample(), &doc! { "runs.num" => 7i64 }).unwrap());
        assert!(matches(&sample(), &doc! { "runs.0.num" => 1i64 }).unwrap());
        assert!(!matches(&sample(), &doc! { "runs.0.num" => 7i64 }).unwrap());
    }

    #[test]
    fn numeric_equality_crosses_int_and_double() {
        assert!(matches(&sample(), &doc! { "count" => 3.0 }).unwrap());
    }

    #[test]
    fn null_matches_missing_field() {
        assert!(matches(&sample(), &doc! { "absent" => Value::Null }).unwrap());
    }

    #[test]
    fn comparison_and_membership_operators() {
        assert!(matches(&sample(), &doc! { "count" => doc! { "$gt" => 2i64, "$lte" => 3i64 } }).unwrap());
        assert!(!matches(&sample(), &doc! { "count" => doc! { "$lt" => 3i64 } }).unwrap());
        assert!(matches(&sample(), &doc! { "status" => doc! { "$in" => vec![Value::from("open"), Value::from("x")] } }).unwrap());
        assert!(matches(&sample(), &doc! { "status" => doc! { "$nin" => vec![Value::from("closed")] } }).unwrap());
        assert!(matches(&sample(), &doc! { "absent" => doc! { "$exists" => false } }).unwrap());
        assert!(matches(&sample(), &doc! { "status" => doc! { "$ne" => "closed" } }).unwrap());
    }

    #[test]
    fn logical_operators() {
        let or = doc! { "$or" => vec![Value::from(doc! { "status" => "closed" }), Value::from(doc! { "count" => 3i64 })] };
        assert!(matches(&sample(), &or).unwrap());
        let nor = doc! { "$nor" => vec![Value::from(doc! { "status" => "open" })] };
        assert!(!matches(&sample(), &nor).unwrap());
        let and = doc! { "$and" => vec![Value::from(doc! { "status" => "open" }), Value::from(doc! { "count" => 4i64 })] };
        assert!(!matches(&sample(), &and).unwrap());
    }

    #[test]
    fn unknown_operators_are_errors() {
        let err = matches(&sample(), &doc! { "count" => doc! { "$regex" => "x" } }).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedOperator(op) if op == "$regex"));
        assert!(matches(&sample(), &doc! { "$where" => "1" }).is_err());
    }
}
