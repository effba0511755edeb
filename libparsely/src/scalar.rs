//! Scalar coercion for unstructured trailing text.
//!
//! Coercion order is fixed: numbers first, then booleans, then strings.
//! Content relies on this order, e.g. `True` (unquoted) must become a
//! boolean and `1,000` must become the integer 1000.

use crate::value::Value;
use num_bigint::BigInt;

/// Separator between items of an inline list (`tags:- a, b, c`).
pub const LIST_ITEM_SEPARATOR: &str = ", ";

/// Convert trailing text into a typed scalar.
pub fn deserialize_scalar(text: &str) -> Value {
    let text = text.trim();

    if let Some(num) = parse_number(text) {
        return num;
    }

    if let Some(b) = parse_keyword(text) {
        return b;
    }

    Value::String(unescape(text))
}

/// Split inline list text on `", "` and coerce every item.
///
/// Always produces an array, even for a single item.
pub fn deserialize_list(text: &str) -> Value {
    Value::Array(list_items(text).map(deserialize_scalar).collect())
}

/// The trimmed items of inline list text.
pub fn list_items(text: &str) -> impl Iterator<Item = &str> {
    text.trim().split(LIST_ITEM_SEPARATOR).map(str::trim)
}

/// Undo delimiter escaping (`\:` becomes `:`).
pub fn unescape(text: &str) -> String {
    if text.contains("\\:") {
        text.replace("\\:", ":")
    } else {
        text.to_string()
    }
}

/// Check if s is a boolean keyword (case-insensitive) and return its value.
fn parse_keyword(s: &str) -> Option<Value> {
    if s.eq_ignore_ascii_case("true") {
        Some(Value::Bool(true))
    } else if s.eq_ignore_ascii_case("false") {
        Some(Value::Bool(false))
    } else {
        None
    }
}

/// Attempt to parse s as a number.
/// Commas are removed first so that digit grouping (`1,000`) is accepted.
fn parse_number(s: &str) -> Option<Value> {
    let trimmed: String = s.chars().filter(|c| *c != ',').collect();

    if is_integer_pattern(&trimmed) {
        if let Ok(n) = trimmed.parse::<BigInt>() {
            return Some(Value::Integer(n));
        }
    }

    // Words like "nan" or "infinity" parse as floats but stay strings here.
    if trimmed.chars().any(|c| c.is_ascii_digit()) {
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return Some(Value::Float(f));
            }
        }
    }

    None
}

/// Check if string matches integer pattern: -?\d+
fn is_integer_pattern(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keyword() {
        assert_eq!(parse_keyword("true"), Some(Value::Bool(true)));
        assert_eq!(parse_keyword("True"), Some(Value::Bool(true)));
        assert_eq!(parse_keyword("FALSE"), Some(Value::Bool(false)));
        assert_eq!(parse_keyword("yes"), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42"), Some(Value::Integer(42.into())));
        assert_eq!(parse_number("-10"), Some(Value::Integer((-10).into())));
        assert_eq!(parse_number("1,000"), Some(Value::Integer(1000.into())));
        assert_eq!(parse_number("2.75"), Some(Value::Float(2.75)));
        assert_eq!(parse_number("1e3"), Some(Value::Float(1000.0)));
        assert_eq!(parse_number("1.0.0"), None);
        assert_eq!(parse_number("nan"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("-"), None);
    }

    #[test]
    fn test_big_integer() {
        let big = "123456789012345678901234567890";
        assert_eq!(
            deserialize_scalar(big),
            Value::Integer(big.parse::<BigInt>().unwrap())
        );
    }

    #[test]
    fn test_deserialize_scalar_order() {
        assert_eq!(deserialize_scalar(" 8000 "), Value::Integer(8000.into()));
        assert_eq!(deserialize_scalar("True"), Value::Bool(true));
        assert_eq!(
            deserialize_scalar("(111) 123-3456"),
            Value::String("(111) 123-3456".into())
        );
        assert_eq!(
            deserialize_scalar("1, true, hello, 2.75"),
            Value::String("1, true, hello, 2.75".into())
        );
        assert_eq!(
            deserialize_scalar("note\\: read me"),
            Value::String("note: read me".into())
        );
    }

    #[test]
    fn test_deserialize_list() {
        assert_eq!(
            deserialize_list("1, true, hello, 2.75"),
            Value::Array(vec![
                Value::Integer(1.into()),
                Value::Bool(true),
                Value::String("hello".into()),
                Value::Float(2.75),
            ])
        );
        assert_eq!(
            deserialize_list("just one thing here"),
            Value::Array(vec![Value::String("just one thing here".into())])
        );
    }
}
