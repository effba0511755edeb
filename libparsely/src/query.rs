//! File access and directory collections.
//!
//! A `$dir/...` or `$data/...` lookup that names a directory produces a
//! [`Collection`]: every document in the directory, filtered, ordered and
//! paginated according to the lookup's query parameters.

use crate::error::Result;
use crate::scope::ParseScope;
use crate::value::{Map, Value};
use glob::Pattern;
use indexmap::IndexMap;
use num_traits::ToPrimitive;
use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File names starting with one of these are never listed.
pub const HIDDEN_PREFIXES: [char; 8] = ['.', '_', '<', '>', '(', ')', '$', '!'];
/// Extensions of files that can appear in a collection.
pub const DOCUMENT_EXTENSIONS: [&str; 6] = ["prs", "md", "json", "yaml", "yml", "toml"];
/// Always skipped in listings; it describes the directory itself.
pub const INDEX_FILE: &str = "index.md";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
    Missing,
}

/// Filesystem access used by lookups.
///
/// [`FsLookup`] reads the real filesystem. Other implementations can serve
/// documents from memory or an archive.
pub trait FileLookup {
    fn resolve_path(&self, path: &Path) -> PathKind;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    fn file_size(&self, path: &Path) -> io::Result<u64>;

    /// Stable identity of a path, used for cycle detection.
    fn canonicalize(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }

    /// Documents in `dir` (recursively) that pass the query's name filters.
    fn list_documents(&self, dir: &Path, query: &DirectoryQuery) -> io::Result<Vec<PathBuf>>;
}

/// [`FileLookup`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLookup;

impl FileLookup for FsLookup {
    fn resolve_path(&self, path: &Path) -> PathKind {
        if path.is_dir() {
            PathKind::Directory
        } else if path.is_file() {
            PathKind::File
        } else {
            PathKind::Missing
        }
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }

    fn canonicalize(&self, path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }

    fn list_documents(&self, dir: &Path, query: &DirectoryQuery) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_hidden(&entry.file_name().to_string_lossy()));
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() && query.accepts_name(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        Ok(paths)
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with(HIDDEN_PREFIXES)
}

// =============================================================================
// Queries
// =============================================================================

/// Comparison operator of a `where_key` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhereOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Contains,
}

/// `attr:<op><value>` filter, e.g. `age:>=18`, `title:~draft`, `lang:en`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereClause {
    pub attr: String,
    pub op: WhereOp,
    pub value: String,
}

impl WhereClause {
    pub fn parse(text: &str) -> Option<Self> {
        let (attr, rest) = text.split_once(':')?;
        let attr = attr.trim();
        if attr.is_empty() {
            return None;
        }
        let rest = rest.trim_start();
        let (op, value) = [
            (">=", WhereOp::Ge),
            ("<=", WhereOp::Le),
            ("!=", WhereOp::Ne),
            (">", WhereOp::Gt),
            ("<", WhereOp::Lt),
            ("=", WhereOp::Eq),
            ("~", WhereOp::Contains),
        ]
        .iter()
        .find_map(|(token, op)| rest.strip_prefix(*token).map(|v| (*op, v)))
        .unwrap_or((WhereOp::Eq, rest));
        Some(WhereClause {
            attr: attr.to_string(),
            op,
            value: value.trim().to_string(),
        })
    }

    /// Test a document. `file_name` is matched against the `file_name`
    /// attribute when the document has none of its own.
    pub fn matches(&self, document: &Value, file_name: &str) -> bool {
        let file_name = Value::from(file_name);
        let Some(actual) = document
            .get_path(&self.attr)
            .or((self.attr == "file_name").then_some(&file_name))
        else {
            return self.op == WhereOp::Ne;
        };
        let expected = crate::scalar::deserialize_scalar(&self.value);

        match self.op {
            WhereOp::Contains => match actual {
                Value::String(s) => s.contains(self.value.as_str()),
                Value::Array(items) => items.iter().any(|item| loosely_equal(item, &expected)),
                _ => false,
            },
            WhereOp::Eq => loosely_equal(actual, &expected),
            WhereOp::Ne => !loosely_equal(actual, &expected),
            WhereOp::Gt => compare_values(actual, &expected) == Some(Ordering::Greater),
            WhereOp::Lt => compare_values(actual, &expected) == Some(Ordering::Less),
            WhereOp::Ge => matches!(
                compare_values(actual, &expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            WhereOp::Le => matches!(
                compare_values(actual, &expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(n) => n.to_f64(),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b || scalar_text(a).is_some_and(|s| Some(s) == scalar_text(b)),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Integer(n) => Some(n.to_string()),
        Value::Float(f) => Some(f.to_string()),
        _ => None,
    }
}

/// Order two values of the same family: numbers numerically, strings and
/// booleans naturally. Anything else is incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order used to sort a collection by an attribute.
///
/// Values of different kinds never tie: numbers come first, then booleans,
/// then strings, then everything else.
pub fn sort_order(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Integer(_) | Value::Float(_) => 0,
            Value::Bool(_) => 1,
            Value::String(_) => 2,
            _ => 3,
        }
    }

    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ if rank(a) == 0 && rank(b) == 0 => {
            let x = as_number(a).unwrap_or(f64::NAN);
            let y = as_number(b).unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Parameters of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryQuery {
    /// Items per page. `0` lists everything on one page.
    pub limit: usize,
    /// One-based page number.
    pub curr_page: usize,
    /// `file_name` or a dotted attribute path.
    pub order_by: String,
    pub descending: bool,
    /// Glob matched against file names.
    pub name_pattern: Option<String>,
    pub exclude_names: Vec<String>,
    pub filter: Option<WhereClause>,
}

impl Default for DirectoryQuery {
    fn default() -> Self {
        DirectoryQuery {
            limit: 0,
            curr_page: 1,
            order_by: "file_name".to_string(),
            descending: false,
            name_pattern: None,
            exclude_names: vec![INDEX_FILE.to_string()],
            filter: None,
        }
    }
}

impl DirectoryQuery {
    /// Build a query from lookup parameters. Unknown keys are ignored and
    /// bad values fall back to the defaults.
    pub fn from_params(params: &IndexMap<String, String>) -> Self {
        let mut query = DirectoryQuery::default();
        for (key, value) in params {
            let value = value.trim();
            match key.as_str() {
                "limit" => {
                    query.limit = if value == "*" {
                        0
                    } else {
                        value.parse::<usize>().unwrap_or(query.limit)
                    }
                }
                "curr_page" | "page" => query.curr_page = value.parse::<usize>().unwrap_or(1).max(1),
                "order_by" if !value.is_empty() => query.order_by = value.to_string(),
                "order_dir" => query.descending = value.eq_ignore_ascii_case("desc"),
                "name" if !value.is_empty() => query.name_pattern = Some(value.to_string()),
                "where_key" | "where" => query.filter = WhereClause::parse(value),
                other => debug!(param = other, "ignoring unknown directory query parameter"),
            }
        }
        query
    }

    /// Whether a file may appear in the listing, judging by its name alone.
    pub fn accepts_name(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        if is_hidden(&name) || self.exclude_names.iter().any(|n| *n == name) {
            return false;
        }
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if !DOCUMENT_EXTENSIONS.contains(&extension.as_str()) {
            return false;
        }
        match &self.name_pattern {
            Some(pattern) => match Pattern::new(pattern) {
                Ok(pattern) => pattern.matches(&name),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "invalid name pattern");
                    false
                }
            },
            None => true,
        }
    }
}

// =============================================================================
// Collections
// =============================================================================

/// One page of documents from a directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub limit: usize,
    /// Number of documents that passed the filter, across all pages.
    pub max_count: usize,
    pub curr_page: usize,
    /// First and last page numbers.
    pub page_nums: [usize; 2],
    pub items: Vec<Value>,
}

impl Collection {
    /// Paginate already filtered and ordered documents.
    pub fn paginate(items: Vec<Value>, limit: usize, curr_page: usize) -> Self {
        let max_count = items.len();
        if limit == 0 {
            return Collection {
                limit,
                max_count,
                curr_page: 1,
                page_nums: [1, 1],
                items,
            };
        }
        let last_page = max_count.div_ceil(limit).max(1);
        let curr_page = curr_page.clamp(1, last_page);
        let items = items
            .into_iter()
            .skip((curr_page - 1) * limit)
            .take(limit)
            .collect();
        Collection {
            limit,
            max_count,
            curr_page,
            page_nums: [1, last_page],
            items,
        }
    }

    pub fn into_value(self) -> Value {
        let mut map = Map::new();
        map.insert("limit".into(), self.limit.into());
        map.insert("max_count".into(), self.max_count.into());
        map.insert("curr_page".into(), self.curr_page.into());
        map.insert(
            "page_nums".into(),
            Value::Array(self.page_nums.iter().map(|n| Value::from(*n)).collect()),
        );
        map.insert("items".into(), Value::Array(self.items));
        Value::Object(map)
    }
}

impl ParseScope<'_> {
    /// List, load, filter, order and paginate the documents in `dir`.
    pub fn load_collection(&mut self, dir: &Path, query: &DirectoryQuery) -> Result<Collection> {
        let paths = match self.lookup.list_documents(dir, query) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "unable to list directory");
                Vec::new()
            }
        };

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let reference = path.display().to_string();
            let document = self.load_document(&path, &reference)?;
            if query
                .filter
                .as_ref()
                .is_some_and(|f| !f.matches(&document, &file_name))
            {
                continue;
            }
            documents.push((file_name, document));
        }

        if query.order_by != "file_name" {
            // Documents missing the attribute sort last.
            documents.sort_by(|(_, a), (_, b)| {
                match (a.get_path(&query.order_by), b.get_path(&query.order_by)) {
                    (Some(x), Some(y)) => sort_order(x, y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            });
        } else {
            documents.sort_by(|(a, _), (b, _)| a.cmp(b));
        }
        if query.descending {
            documents.reverse();
        }

        debug!(dir = %dir.display(), count = documents.len(), "loaded collection");
        let items = documents.into_iter().map(|(_, doc)| doc).collect();
        Ok(Collection::paginate(items, query.limit, query.curr_page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(entries: &[(&str, Value)]) -> Value {
        Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_where_clause_parse() {
        let clause = WhereClause::parse("age:>=18").unwrap();
        assert_eq!(clause.attr, "age");
        assert_eq!(clause.op, WhereOp::Ge);
        assert_eq!(clause.value, "18");

        let clause = WhereClause::parse("name:value").unwrap();
        assert_eq!(clause.op, WhereOp::Eq);
        assert_eq!(clause.value, "value");

        assert_eq!(WhereClause::parse("no operator"), None);
    }

    #[test]
    fn test_where_clause_matches() {
        let document = doc(&[
            ("age", 21i64.into()),
            ("title", "Draft post".into()),
            ("tags", Value::Array(vec!["rust".into(), "web".into()])),
        ]);
        assert!(WhereClause::parse("age:>18").unwrap().matches(&document, "a.md"));
        assert!(!WhereClause::parse("age:<=18").unwrap().matches(&document, "a.md"));
        assert!(WhereClause::parse("title:~Draft").unwrap().matches(&document, "a.md"));
        assert!(WhereClause::parse("tags:~rust").unwrap().matches(&document, "a.md"));
        assert!(WhereClause::parse("file_name:=a.md").unwrap().matches(&document, "a.md"));
        assert!(WhereClause::parse("missing:!=x").unwrap().matches(&document, "a.md"));
    }

    #[test]
    fn test_from_params() {
        let params: IndexMap<String, String> = [
            ("limit", "*"),
            ("curr_page", "3"),
            ("order_by", "date"),
            ("order_dir", "desc"),
            ("name", "*.md"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let query = DirectoryQuery::from_params(&params);
        assert_eq!(query.limit, 0);
        assert_eq!(query.curr_page, 3);
        assert_eq!(query.order_by, "date");
        assert!(query.descending);
        assert_eq!(query.name_pattern.as_deref(), Some("*.md"));
    }

    #[test]
    fn test_accepts_name() {
        let query = DirectoryQuery::default();
        assert!(query.accepts_name(Path::new("posts/a.md")));
        assert!(query.accepts_name(Path::new("posts/b.prs")));
        assert!(!query.accepts_name(Path::new("posts/index.md")));
        assert!(!query.accepts_name(Path::new("posts/_draft.md")));
        assert!(!query.accepts_name(Path::new("posts/.hidden.md")));
        assert!(!query.accepts_name(Path::new("posts/image.png")));
    }

    #[test]
    fn test_sort_order_mixed_kinds() {
        let mut values = vec![
            Value::from("w2"),
            Value::from(10i64),
            Value::Bool(true),
            Value::from(2.5),
            Value::Null,
            Value::from("a"),
            Value::from(-3i64),
            Value::Bool(false),
        ];
        values.sort_by(sort_order);
        assert_eq!(
            values,
            vec![
                Value::from(-3i64),
                Value::from(2.5),
                Value::from(10i64),
                Value::Bool(false),
                Value::Bool(true),
                Value::from("a"),
                Value::from("w2"),
                Value::Null,
            ]
        );
        assert_eq!(sort_order(&Value::from(1i64), &Value::from("1")), Ordering::Less);
        assert_eq!(sort_order(&Value::from(2i64), &Value::from(2.0)), Ordering::Equal);
    }

    #[test]
    fn test_paginate() {
        let items: Vec<Value> = (1..=5i64).map(Value::from).collect();
        let page = Collection::paginate(items.clone(), 2, 3);
        assert_eq!(page.max_count, 5);
        assert_eq!(page.page_nums, [1, 3]);
        assert_eq!(page.items, vec![Value::from(5i64)]);

        let clamped = Collection::paginate(items.clone(), 2, 9);
        assert_eq!(clamped.curr_page, 3);

        let all = Collection::paginate(items, 0, 4);
        assert_eq!(all.curr_page, 1);
        assert_eq!(all.items.len(), 5);
    }
}
