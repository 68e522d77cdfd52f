//! Canonical Serialization
//!
//! Deterministic, key-order-independent JSON serialization. The output of
//! `canonicalize` is the exact byte sequence fed into the digest engine, so
//! two records with identical key/value sets must produce identical strings
//! regardless of insertion order.

use serde_json::Value;

/// Canonicalize a JSON value into a deterministic string.
///
/// Rules:
/// - Object keys are sorted lexicographically before serialization.
/// - Array element order is preserved (order is meaningful for arrays).
/// - Nested structures are canonicalized recursively.
/// - A `null` root (or any `null` value) serializes as the literal `null`.
///
/// Absent fields never reach this function: optional fields are modeled as
/// `Option` with `skip_serializing_if`, so "absent" is decided by the type
/// and an explicit `null` is always emitted as `null`.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(&mut out, value);
    out
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        Value::Object(fields) => {
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // serde_json performs the JSON string escaping.
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(out, &fields[key.as_str()]);
            }
            out.push('}');
        }
        // Null, booleans, numbers, and strings already have a single
        // compact rendering.
        atom => out.push_str(&atom.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_independence() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(canonicalize(&a), canonicalize(&b));
        assert_eq!(canonicalize(&a), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_nested_objects_sorted_recursively() {
        let value = json!({"outer": {"z": 1, "a": {"m": true, "b": null}}, "first": [3, 1, 2]});
        assert_eq!(
            canonicalize(&value),
            r#"{"first":[3,1,2],"outer":{"a":{"b":null,"m":true},"z":1}}"#
        );
    }

    #[test]
    fn test_array_order_preserved() {
        let a = json!([1, 2, 3]);
        let b = json!([3, 2, 1]);
        assert_ne!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(canonicalize(&json!({})), "{}");
        assert_eq!(canonicalize(&json!([])), "[]");
    }

    #[test]
    fn test_null_root() {
        assert_eq!(canonicalize(&Value::Null), "null");
    }

    #[test]
    fn test_absent_field_omitted() {
        // Absence is modeled at the type level: a skipped Option never
        // appears in the serialized value, so the canonical forms match.
        #[derive(serde::Serialize)]
        struct Record {
            a: u32,
            #[serde(skip_serializing_if = "Option::is_none")]
            b: Option<u32>,
        }

        let with_absent = serde_json::to_value(Record { a: 1, b: None }).unwrap();
        let without = json!({"a": 1});
        assert_eq!(canonicalize(&with_absent), canonicalize(&without));
    }

    #[test]
    fn test_string_escaping() {
        let value = json!({"details": "line one\nline \"two\""});
        assert_eq!(
            canonicalize(&value),
            r#"{"details":"line one\nline \"two\""}"#
        );
    }

    #[test]
    fn test_deterministic_across_calls() {
        let value = json!({"k": [1, {"y": 2, "x": 3}], "j": "text"});
        assert_eq!(canonicalize(&value), canonicalize(&value));
    }
}
