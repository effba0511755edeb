//! Serialize values back to Parsely text.
//!
//! Nested blocks are indented four spaces per level. Multi-line strings
//! reachable through objects alone are moved to `===path` blocks at the end
//! of the document; inside lists they become indented `key:|` blocks.

use crate::classify::{BLOCK_PREFIX, DEFAULT_BLOCK_KEY, FENCE, SEPARATOR};
use crate::error::SerializeError;
use crate::scalar::LIST_ITEM_SEPARATOR;
use crate::value::{Map, Value};

type Result<T> = std::result::Result<T, SerializeError>;

const INDENT: &str = "    ";

/// Output settings for [`serialize_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Nest the whole document under this key.
    pub namespace: Option<String>,
    /// Write nested object keys as dotted paths (`site.title: Home`)
    /// instead of indented blocks.
    pub inline: bool,
    /// Keys (or dotted paths) whose string values always become `===`
    /// blocks, even when they fit on one line.
    pub blob_keys: Vec<String>,
}

/// Serialize with default options.
pub fn serialize(value: &Value) -> Result<String> {
    serialize_with(value, &SerializeOptions::default())
}

/// Serialize a document.
///
/// The top-level value must be an object or an array. Nulls, non-finite
/// floats and arrays nested directly inside arrays have no textual form and
/// are rejected.
pub fn serialize_with(value: &Value, options: &SerializeOptions) -> Result<String> {
    let mut writer = Writer {
        options,
        out: String::new(),
        deferred: Vec::new(),
    };
    let namespace = options
        .namespace
        .as_deref()
        .map(str::trim)
        .filter(|ns| !ns.is_empty());

    match (value, namespace) {
        (Value::Object(obj), _) if options.inline => {
            writer.write_map_inline(obj, namespace.unwrap_or(""))?
        }
        (Value::Object(obj), None) => writer.write_map(obj, 0, "", true)?,
        (Value::Object(obj), Some(ns)) => {
            writer.line(0, &format!("{}:", escape_text(ns)));
            writer.write_map(obj, 1, ns, true)?;
        }
        (Value::Array(items), None) => writer.write_root_list(items)?,
        (Value::Array(items), Some(ns)) => writer.write_list(&escape_text(ns), items, 0, ns)?,
        (other, _) => {
            return Err(unrepresentable(
                "",
                other,
                "the top-level value must be an object or an array",
            ))
        }
    }
    Ok(writer.finish())
}

fn unrepresentable(path: &str, value: &Value, reason: &'static str) -> SerializeError {
    SerializeError::Unrepresentable {
        path: path.to_string(),
        kind: value.kind_name(),
        reason,
    }
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

struct Writer<'o> {
    options: &'o SerializeOptions,
    out: String,
    /// `(path, text)` of blocks written after the data section.
    deferred: Vec<(String, String)>,
}

impl Writer<'_> {
    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn finish(mut self) -> String {
        for (path, text) in std::mem::take(&mut self.deferred) {
            if path == DEFAULT_BLOCK_KEY {
                self.out.push_str(BLOCK_PREFIX);
            } else {
                self.out.push_str(&format!("{}{}", BLOCK_PREFIX, path));
            }
            self.out.push('\n');
            self.out.push_str(&text);
            if !text.is_empty() && !text.ends_with('\n') {
                self.out.push('\n');
            }
        }
        self.out
    }

    fn is_blob(&self, key: &str, path: &str) -> bool {
        self.options.blob_keys.iter().any(|k| k == key || k == path)
    }

    fn write_map(&mut self, obj: &Map, depth: usize, path: &str, deferrable: bool) -> Result<()> {
        for (key, value) in obj {
            let child = join_path(path, key);
            check_key(key, value, &child)?;
            self.write_entry(key, &escape_text(key), value, depth, &child, deferrable)?;
        }
        Ok(())
    }

    fn write_map_inline(&mut self, obj: &Map, path: &str) -> Result<()> {
        for (key, value) in obj {
            let child = join_path(path, key);
            check_key(key, value, &child)?;
            match value {
                Value::Object(nested) if !nested.is_empty() => self.write_map_inline(nested, &child)?,
                _ => self.write_entry(key, &escape_text(&child), value, 0, &child, true)?,
            }
        }
        Ok(())
    }

    /// Write one `key` / value pair. `label` is the key as it appears in
    /// the output, `key` the bare key for blob matching.
    fn write_entry(
        &mut self,
        key: &str,
        label: &str,
        value: &Value,
        depth: usize,
        path: &str,
        deferrable: bool,
    ) -> Result<()> {
        match value {
            Value::String(s) if deferrable && (s.contains('\n') || self.is_blob(key, path)) => {
                check_block_text(s, value, path)?;
                self.deferred.push((path.to_string(), s.clone()));
            }
            Value::String(s) if s.contains('\n') || s.is_empty() => {
                check_block_text(s, value, path)?;
                self.line(depth, &format!("{}:|", label));
                for text in s.lines() {
                    if text.trim().is_empty() {
                        self.out.push('\n');
                    } else {
                        self.line(depth + 1, text);
                    }
                }
            }
            Value::Object(obj) => {
                self.line(depth, &format!("{}:", label));
                self.write_map(obj, depth + 1, path, deferrable)?;
            }
            Value::Array(items) => self.write_list(label, items, depth, path)?,
            scalar => {
                let text = scalar_text(scalar, path)?;
                self.line(depth, &format!("{}: {}", label, text));
            }
        }
        Ok(())
    }

    fn write_list(&mut self, label: &str, items: &[Value], depth: usize, path: &str) -> Result<()> {
        if let Some(inline) = inline_list(items) {
            self.line(depth, &format!("{}:- {}", label, inline));
            return Ok(());
        }
        self.line(depth, &format!("{}:-", label));
        self.write_items(items, depth + 1, path)
    }

    fn write_root_list(&mut self, items: &[Value]) -> Result<()> {
        // A separator marks the document as a list.
        if !matches!(items.first(), Some(Value::Object(_))) {
            self.line(0, SEPARATOR);
        }
        self.write_items(items, 0, "")
    }

    fn write_items(&mut self, items: &[Value], depth: usize, path: &str) -> Result<()> {
        for (index, item) in items.iter().enumerate() {
            let item_path = join_path(path, &index.to_string());
            match item {
                Value::Object(obj) if obj.is_empty() => {
                    return Err(unrepresentable(&item_path, item, "empty objects inside lists are dropped on reading"))
                }
                Value::Object(obj) => {
                    self.line(depth, SEPARATOR);
                    self.write_map(obj, depth, &item_path, false)?;
                }
                Value::Array(_) => {
                    return Err(unrepresentable(&item_path, item, "arrays cannot nest directly inside arrays"))
                }
                Value::String(s) if s.contains('\n') || s.trim().is_empty() => {
                    return Err(unrepresentable(&item_path, item, "list items must be non-empty single lines"))
                }
                Value::String(s) if s.trim_start().starts_with('#') || s.trim() == SEPARATOR => {
                    return Err(unrepresentable(&item_path, item, "list item would read as a comment or separator"))
                }
                scalar => {
                    let text = scalar_text(scalar, &item_path)?;
                    self.line(depth, &text);
                }
            }
        }
        Ok(())
    }
}

/// `a, b, c` form of a list, when every item allows it.
fn inline_list(items: &[Value]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let mut texts = Vec::with_capacity(items.len());
    for item in items {
        let text = match item {
            Value::String(s) if s.trim().is_empty() || s.contains('\n') => return None,
            Value::String(s) if s.contains(LIST_ITEM_SEPARATOR) => return None,
            Value::Float(f) if !f.is_finite() => return None,
            Value::Bool(_) | Value::Integer(_) | Value::Float(_) | Value::String(_) => {
                scalar_text(item, "").ok()?
            }
            _ => return None,
        };
        texts.push(text);
    }
    Some(texts.join(LIST_ITEM_SEPARATOR))
}

fn check_key(key: &str, value: &Value, path: &str) -> Result<()> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(unrepresentable(path, value, "keys cannot be empty"));
    }
    if trimmed.starts_with('#') || key.starts_with(BLOCK_PREFIX) || key.starts_with(FENCE) {
        return Err(unrepresentable(path, value, "key would read as a comment or fence"));
    }
    Ok(())
}

fn check_block_text(text: &str, value: &Value, path: &str) -> Result<()> {
    let fenced = text.lines().any(|line| {
        line.starts_with(BLOCK_PREFIX) || line.starts_with(FENCE) || line.trim().ends_with(FENCE)
    });
    if fenced {
        return Err(unrepresentable(path, value, "text contains a line that would end its block"));
    }
    Ok(())
}

fn scalar_text(value: &Value, path: &str) -> Result<String> {
    match value {
        Value::Null => Err(unrepresentable(path, value, "null has no textual form")),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Integer(n) => Ok(n.to_string()),
        Value::Float(f) if !f.is_finite() => {
            Err(unrepresentable(path, value, "NaN and infinities have no textual form"))
        }
        Value::Float(f) => {
            let s = format!("{}", f);
            if s.contains('.') || s.contains('e') {
                Ok(s)
            } else {
                Ok(format!("{}.0", s))
            }
        }
        Value::String(s) => Ok(escape_text(s)),
        Value::Array(_) | Value::Object(_) => Err(unrepresentable(path, value, "expected a scalar")),
    }
}

/// Escape every `:` that would otherwise read as a delimiter.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && matches!(chars.peek(), None | Some(' ' | '|' | '`' | '-')) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn obj(entries: Vec<(&str, Value)>) -> Value {
        Value::Object(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn test_scalars_and_nesting() {
        let value = obj(vec![
            ("title", "Home".into()),
            ("count", 3i64.into()),
            ("ratio", 1.0.into()),
            ("server", obj(vec![("port", 8080i64.into()), ("debug", false.into())])),
        ]);
        assert_eq!(
            serialize(&value).unwrap(),
            "title: Home\ncount: 3\nratio: 1.0\nserver:\n    port: 8080\n    debug: false\n"
        );
    }

    #[test]
    fn test_lists() {
        let value = obj(vec![
            ("tags", Value::Array(vec!["a".into(), "b".into()])),
            ("empty", Value::Array(vec![])),
            (
                "people",
                Value::Array(vec![obj(vec![("name", "Ada".into())]), "plain".into()]),
            ),
        ]);
        assert_eq!(
            serialize(&value).unwrap(),
            "tags:- a, b\nempty:-\npeople:-\n    -\n    name: Ada\n    plain\n"
        );
    }

    #[test]
    fn test_multiline_strings_are_deferred() {
        let value = obj(vec![
            ("content", "# Hello\n\nBody\n".into()),
            ("page", obj(vec![("script", "a();\nb();\n".into())])),
            ("title", "Post".into()),
        ]);
        assert_eq!(
            serialize(&value).unwrap(),
            "page:\ntitle: Post\n===\n# Hello\n\nBody\n===page.script\na();\nb();\n"
        );
    }

    #[test]
    fn test_multiline_strings_in_lists_use_text_blocks() {
        let value = obj(vec![(
            "items",
            Value::Array(vec![obj(vec![("body", "one\ntwo\n".into())])]),
        )]);
        assert_eq!(
            serialize(&value).unwrap(),
            "items:-\n    -\n    body:|\n        one\n        two\n"
        );
    }

    #[test]
    fn test_escaping() {
        let value = obj(vec![("note", "read: this".into()), ("a:b", "x:".into())]);
        assert_eq!(serialize(&value).unwrap(), "note: read\\: this\na:b: x\\:\n");
    }

    #[test]
    fn test_inline_and_namespace() {
        let value = obj(vec![
            ("site", obj(vec![("title", "Home".into())])),
            ("draft", true.into()),
        ]);
        let options = SerializeOptions {
            namespace: Some("config".into()),
            inline: true,
            blob_keys: vec![],
        };
        assert_eq!(
            serialize_with(&value, &options).unwrap(),
            "config.site.title: Home\nconfig.draft: true\n"
        );

        let nested = SerializeOptions {
            namespace: Some("config".into()),
            ..SerializeOptions::default()
        };
        assert_eq!(
            serialize_with(&value, &nested).unwrap(),
            "config:\n    site:\n        title: Home\n    draft: true\n"
        );
    }

    #[test]
    fn test_blob_keys() {
        let value = obj(vec![("summary", "short".into())]);
        let options = SerializeOptions {
            blob_keys: vec!["summary".into()],
            ..SerializeOptions::default()
        };
        assert_eq!(serialize_with(&value, &options).unwrap(), "===summary\nshort\n");
    }

    #[test]
    fn test_root_list() {
        let value = Value::Array(vec![obj(vec![("a", 1i64.into())]), obj(vec![("a", 2i64.into())])]);
        assert_eq!(serialize(&value).unwrap(), "-\na: 1\n-\na: 2\n");
        assert_eq!(serialize(&Value::Array(vec![1i64.into()])).unwrap(), "-\n1\n");
    }

    #[test]
    fn test_unrepresentable_values() {
        let null = obj(vec![("gone", Value::Null)]);
        assert_eq!(
            serialize(&null).unwrap_err(),
            SerializeError::Unrepresentable {
                path: "gone".into(),
                kind: "null",
                reason: "null has no textual form",
            }
        );
        let nested = obj(vec![("grid", Value::Array(vec![Value::Array(vec![])]))]);
        assert!(matches!(
            serialize(&nested),
            Err(SerializeError::Unrepresentable { path, .. }) if path == "grid.0"
        ));
        assert!(serialize(&obj(vec![("x", f64::NAN.into())])).is_err());
        assert!(serialize(&Value::from("bare")).is_err());
    }
}
