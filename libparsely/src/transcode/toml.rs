//! TOML transcoding.
//!
//! Lossy edges:
//!   - TOML has no null type; null values cause an error.
//!   - TOML integers are i64; big integers that overflow cause an error.
//!   - TOML datetimes become strings.
//!   - TOML requires the top-level value to be a table.

use crate::value::{Map, Value};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use toml_edit::DocumentMut;

/// Decode a TOML string into a Value.
pub fn decode(input: &str) -> Result<Value, String> {
    let doc: DocumentMut = input
        .parse::<DocumentMut>()
        .map_err(|e| format!("TOML parse error: {}", e))?;
    toml_table_to_value(doc.as_table())
}

/// Encode a Value as a TOML string.
pub fn encode(value: &Value) -> Result<String, String> {
    let Value::Object(obj) = value else {
        return Err("TOML requires the top-level value to be a table/object".to_string());
    };
    let mut doc = DocumentMut::new();
    for (key, value) in obj {
        doc[key.as_str()] = value_to_toml(value)?;
    }
    Ok(doc.to_string())
}

fn toml_table_to_value(table: &toml_edit::Table) -> Result<Value, String> {
    let mut obj = Map::new();
    for (key, item) in table.iter() {
        obj.insert(key.to_string(), toml_item_to_value(item)?);
    }
    Ok(Value::Object(obj))
}

fn toml_item_to_value(item: &toml_edit::Item) -> Result<Value, String> {
    match item {
        toml_edit::Item::Value(v) => toml_value_to_parsely(v),
        toml_edit::Item::Table(t) => toml_table_to_value(t),
        toml_edit::Item::ArrayOfTables(arr) => {
            let items: Result<Vec<Value>, String> = arr.iter().map(toml_table_to_value).collect();
            Ok(Value::Array(items?))
        }
        toml_edit::Item::None => Ok(Value::Null),
    }
}

fn toml_value_to_parsely(v: &toml_edit::Value) -> Result<Value, String> {
    match v {
        toml_edit::Value::String(s) => Ok(Value::String(s.value().clone())),
        toml_edit::Value::Integer(i) => Ok(Value::Integer(BigInt::from(*i.value()))),
        toml_edit::Value::Float(f) => Ok(Value::Float(*f.value())),
        toml_edit::Value::Boolean(b) => Ok(Value::Bool(*b.value())),
        toml_edit::Value::Datetime(dt) => Ok(Value::String(dt.value().to_string())),
        toml_edit::Value::Array(arr) => {
            let items: Result<Vec<Value>, String> = arr.iter().map(toml_value_to_parsely).collect();
            Ok(Value::Array(items?))
        }
        toml_edit::Value::InlineTable(table) => {
            let mut obj = Map::new();
            for (key, val) in table.iter() {
                obj.insert(key.to_string(), toml_value_to_parsely(val)?);
            }
            Ok(Value::Object(obj))
        }
    }
}

fn value_to_toml(value: &Value) -> Result<toml_edit::Item, String> {
    match value {
        Value::Object(obj) => {
            let mut table = toml_edit::Table::new();
            for (k, v) in obj {
                table.insert(k.as_str(), value_to_toml(v)?);
            }
            Ok(toml_edit::Item::Table(table))
        }
        other => Ok(toml_edit::Item::Value(value_to_inline(other)?)),
    }
}

/// Values inside arrays are always inline, so nested objects become inline
/// tables.
fn value_to_inline(value: &Value) -> Result<toml_edit::Value, String> {
    match value {
        Value::Null => Err("TOML has no null type".to_string()),
        Value::Bool(b) => Ok(toml_edit::Value::from(*b)),
        Value::Integer(n) => {
            let i = n
                .to_i64()
                .ok_or_else(|| format!("Integer {} too large for TOML (i64)", n))?;
            Ok(toml_edit::Value::from(i))
        }
        Value::Float(f) => Ok(toml_edit::Value::from(*f)),
        Value::String(s) => Ok(toml_edit::Value::from(s.as_str())),
        Value::Array(arr) => {
            let mut toml_arr = toml_edit::Array::new();
            for v in arr {
                toml_arr.push(value_to_inline(v)?);
            }
            Ok(toml_edit::Value::Array(toml_arr))
        }
        Value::Object(obj) => {
            let mut inline = toml_edit::InlineTable::new();
            for (k, v) in obj {
                inline.insert(k.as_str(), value_to_inline(v)?);
            }
            Ok(toml_edit::Value::InlineTable(inline))
        }
    }
}
