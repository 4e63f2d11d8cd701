// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Key-driven type coercion for flattened statistics.
//!
//! The kind of a statistic depends only on its flattened key, never on the
//! JSON type it arrived with.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::influx::{render_bool, FieldValue};

/// The stored type of a statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Float,
    Integer,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::String => f.write_str("string"),
            ValueKind::Float => f.write_str("float"),
            ValueKind::Integer => f.write_str("integer"),
        }
    }
}

/// Keys that do not store as integers. Everything not listed is an integer.
const KIND_TABLE: &[(&str, ValueKind)] = &[
    ("gateway", ValueKind::String),
    ("uptime", ValueKind::Float),
    ("loadavg", ValueKind::Float),
    ("memory_usage", ValueKind::Float),
    ("rootfs_usage", ValueKind::Float),
];

#[derive(Debug, Error)]
#[error("cannot store '{key}' = {value} as {kind}")]
pub struct CoercionError {
    pub key: String,
    pub kind: ValueKind,
    pub value: Value,
}

/// Look up the kind a flattened key is stored as.
pub fn kind_of(key: &str) -> ValueKind {
    KIND_TABLE
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, kind)| *kind)
        .unwrap_or(ValueKind::Integer)
}

/// Coerce a raw statistic into the field value its key demands.
pub fn coerce(key: &str, value: &Value) -> Result<FieldValue, CoercionError> {
    let kind = kind_of(key);
    let coerced = match kind {
        ValueKind::String => to_string(value).map(FieldValue::String),
        ValueKind::Float => to_float(value).map(FieldValue::Float),
        ValueKind::Integer => to_integer(value).map(FieldValue::Integer),
    };

    coerced.ok_or_else(|| CoercionError {
        key: key.to_string(),
        kind,
        value: value.clone(),
    })
}

fn to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(render_bool(*b).to_string()),
        _ => None,
    }
}

fn to_float(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    v.is_finite().then_some(v)
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            // Fractional or beyond i64: truncate toward zero if it fits.
            let f = n.as_f64()?;
            let t = f.trunc();
            (t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64).then_some(t as i64)
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_table() {
        assert_eq!(kind_of("gateway"), ValueKind::String);
        for key in ["uptime", "loadavg", "memory_usage", "rootfs_usage"] {
            assert_eq!(kind_of(key), ValueKind::Float, "{}", key);
        }
        assert_eq!(kind_of("clients_total"), ValueKind::Integer);
        assert_eq!(kind_of("traffic_rx_bytes"), ValueKind::Integer);
        // Matching is on the whole flattened key.
        assert_eq!(kind_of("gateway_nexthop"), ValueKind::Integer);
    }

    #[test]
    fn test_gateway_always_string() {
        for raw in [json!("02:ca:ff:ee:00:01"), json!(42), json!(1.5), json!("7")] {
            match coerce("gateway", &raw).unwrap() {
                FieldValue::String(_) => {}
                other => panic!("expected String for {}, got {:?}", raw, other),
            }
        }
        assert_eq!(
            coerce("gateway", &json!(42)).unwrap(),
            FieldValue::String("42".to_string())
        );
    }

    #[test]
    fn test_gateway_bool_python_spelling() {
        assert_eq!(
            coerce("gateway", &json!(true)).unwrap(),
            FieldValue::String("True".to_string())
        );
        assert_eq!(
            coerce("gateway", &json!(false)).unwrap(),
            FieldValue::String("False".to_string())
        );
    }

    #[test]
    fn test_uptime_always_float() {
        for raw in [json!(100), json!(100.5), json!("100.5"), json!(" 7 ")] {
            match coerce("uptime", &raw).unwrap() {
                FieldValue::Float(_) => {}
                other => panic!("expected Float for {}, got {:?}", raw, other),
            }
        }
        assert_eq!(
            coerce("uptime", &json!("100.5")).unwrap(),
            FieldValue::Float(100.5)
        );
        assert_eq!(
            coerce("memory_usage", &json!(0.2)).unwrap(),
            FieldValue::Float(0.2)
        );
    }

    #[test]
    fn test_other_keys_always_integer() {
        for raw in [json!(3), json!("3"), json!(3.9), json!(true)] {
            match coerce("anything_else", &raw).unwrap() {
                FieldValue::Integer(_) => {}
                other => panic!("expected Integer for {}, got {:?}", raw, other),
            }
        }
        assert_eq!(
            coerce("clients", &json!("3")).unwrap(),
            FieldValue::Integer(3)
        );
        assert_eq!(
            coerce("clients", &json!(3.9)).unwrap(),
            FieldValue::Integer(3)
        );
        assert_eq!(
            coerce("clients", &json!(-3.9)).unwrap(),
            FieldValue::Integer(-3)
        );
    }

    #[test]
    fn test_fractional_string_rejected_for_integer() {
        let err = coerce("clients", &json!("100.5")).unwrap_err();
        assert_eq!(err.key, "clients");
        assert_eq!(err.kind, ValueKind::Integer);
    }

    #[test]
    fn test_non_numeric_rejected() {
        assert!(coerce("clients_total", &json!("many")).is_err());
        assert!(coerce("uptime", &json!("forever")).is_err());
        assert!(coerce("uptime", &json!("NaN")).is_err());
        assert!(coerce("clients_total", &json!(1e300)).is_err());
    }

    #[test]
    fn test_null_and_containers_rejected() {
        assert!(coerce("gateway", &Value::Null).is_err());
        assert!(coerce("uptime", &json!([1.0])).is_err());
        assert!(coerce("clients", &json!({"total": 1})).is_err());
    }

    #[test]
    fn test_error_message() {
        let err = coerce("clients", &json!("many")).unwrap_err();
        assert_eq!(err.to_string(), "cannot store 'clients' = \"many\" as integer");
    }
}
