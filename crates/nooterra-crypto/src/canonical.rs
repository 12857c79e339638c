//! JCS-style canonical JSON (spec §4.1).
//!
//! Rules implemented:
//! - object keys sorted lexicographically by UTF-8 byte value;
//! - no insignificant whitespace;
//! - integers render as-is, non-integers use the shortest round-trip
//!   decimal form (Rust's `f64::Display`, the same shortest-round-trip
//!   algorithm family as ES2020 `Number.prototype.toString`);
//! - strings use standard JSON escaping (serde_json's string encoder
//!   already emits `\n`, `\t`, `\\`, `\"`);
//! - `null` is preserved; there is no `undefined` in `serde_json::Value` so
//!   non-serializable input is rejected at the `to_value` boundary instead.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonicalizeError {
    #[error("value is not serializable to JSON: {0}")]
    NotSerializable(#[from] serde_json::Error),
    #[error("NaN and Infinity cannot be canonicalized")]
    NonFiniteNumber,
}

/// Canonicalize any `Serialize` value to its JCS-style byte string.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<String, CanonicalizeError> {
    let v = serde_json::to_value(value)?;
    let mut out = String::new();
    write_canonical(&v, &mut out)?;
    Ok(out)
}

/// Canonicalize an already-constructed `serde_json::Value`.
pub fn canonicalize_value(value: &Value) -> Result<String, CanonicalizeError> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> Result<(), CanonicalizeError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out)?,
        Value::String(s) => out.push_str(&serde_json::to_string(s)?),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[key], out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_number(n: &serde_json::Number, out: &mut String) -> Result<(), CanonicalizeError> {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
    } else if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
    } else {
        let f = n.as_f64().ok_or(CanonicalizeError::NonFiniteNumber)?;
        if !f.is_finite() {
            return Err(CanonicalizeError::NonFiniteNumber);
        }
        out.push_str(&format!("{}", f));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys() {
        let v = json!({"b": 1, "a": 2});
        assert_eq!(canonicalize_value(&v).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn no_whitespace() {
        let v = json!({"a": [1, 2, 3]});
        assert_eq!(canonicalize_value(&v).unwrap(), r#"{"a":[1,2,3]}"#);
    }

    #[test]
    fn nested_objects_sort_recursively() {
        let v = json!({"z": {"y": 1, "x": 2}, "a": 1});
        assert_eq!(
            canonicalize_value(&v).unwrap(),
            r#"{"a":1,"z":{"x":2,"y":1}}"#
        );
    }

    #[test]
    fn logically_equal_values_produce_identical_bytes() {
        // Property from spec §8: JCS(A) == JCS(B) for A ≡ B regardless of
        // original key order or insignificant formatting differences.
        let a = json!({"type": "gate.created", "amountCents": 100, "currency": "USD"});
        let b = json!({"currency": "USD", "type": "gate.created", "amountCents": 100});
        assert_eq!(
            canonicalize_value(&a).unwrap(),
            canonicalize_value(&b).unwrap()
        );
    }

    #[test]
    fn escapes_control_characters() {
        let v = json!({"msg": "line1\nline2\ttabbed\\slash\"quote"});
        let out = canonicalize_value(&v).unwrap();
        assert!(out.contains("\\n"));
        assert!(out.contains("\\t"));
        assert!(out.contains("\\\\"));
        assert!(out.contains("\\\""));
    }

    #[test]
    fn integers_render_without_decimal() {
        let v = json!({"n": 42});
        assert_eq!(canonicalize_value(&v).unwrap(), r#"{"n":42}"#);
    }
}
