//! JSON transcoding.
//!
//! Integers outside the 64-bit range are written as strings, since JSON
//! readers generally cannot represent them. NaN and infinities have no JSON
//! form and are rejected.

use crate::value::{Map, Value};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Decode a JSON string into a Value.
pub fn decode(input: &str) -> Result<Value, String> {
    let json: serde_json::Value =
        serde_json::from_str(input).map_err(|e| format!("JSON parse error: {}", e))?;
    Ok(json_to_value(json))
}

/// Encode a Value as pretty-printed JSON.
pub fn encode(value: &Value) -> Result<String, String> {
    let json = value_to_json(value)?;
    serde_json::to_string_pretty(&json).map_err(|e| format!("JSON encode error: {}", e))
}

fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(BigInt::from(i))
            } else if let Some(u) = n.as_u64() {
                Value::Integer(BigInt::from(u))
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(obj) => Value::Object(
            obj.into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect::<Map>(),
        ),
    }
}

pub(crate) fn value_to_json(value: &Value) -> Result<serde_json::Value, String> {
    match value {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Integer(n) => {
            if let Some(i) = n.to_i64() {
                Ok(serde_json::Value::from(i))
            } else if let Some(u) = n.to_u64() {
                Ok(serde_json::Value::from(u))
            } else {
                Ok(serde_json::Value::String(n.to_string()))
            }
        }
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| format!("JSON has no representation for {}", f)),
        Value::String(s) => Ok(serde_json::Value::String(s.clone())),
        Value::Array(arr) => {
            let items: Result<Vec<serde_json::Value>, String> =
                arr.iter().map(value_to_json).collect();
            Ok(serde_json::Value::Array(items?))
        }
        Value::Object(obj) => {
            let mut map = serde_json::Map::new();
            for (k, v) in obj {
                map.insert(k.clone(), value_to_json(v)?);
            }
            Ok(serde_json::Value::Object(map))
        }
    }
}
