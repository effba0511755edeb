//! Lookup references (`$data/...`, `$dir/...`).
//!
//! A lookup pulls a value in from another file or directory:
//!
//! ```text
//! author: $data/authors/ada.json#name
//! posts: $dir/posts?limit=5&curr_page=2&order_by=date&order_dir=desc
//! ```
//!
//! The path is resolved against the datastore (`$data`) or the directory of
//! the current document (`$dir`). A trailing `#attr.path` selects a nested
//! value from what was loaded; `?key=value` pairs configure directory
//! listings.

use crate::error::{DiagnosticKind, ParseError, Result};
use crate::query::{DirectoryQuery, PathKind};
use crate::scope::ParseScope;
use crate::transcode;
use crate::value::Value;
use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LOOKUP_DATA_PREFIX: &str = "$data/";
pub const LOOKUP_DIR_PREFIX: &str = "$dir/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// Relative to the datastore directory.
    Data,
    /// Relative to the current document's directory.
    Dir,
}

/// A parsed lookup reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupReference {
    pub kind: LookupKind,
    /// Path segments with traversal tokens removed.
    pub segments: Vec<String>,
    pub query: IndexMap<String, String>,
    pub attr_path: Option<String>,
    /// The reference as written.
    pub raw: String,
}

impl LookupReference {
    /// Parse `text` as a lookup reference. Returns `None` for anything that
    /// does not start with a lookup prefix.
    pub fn parse(text: &str) -> Option<Self> {
        let (kind, rest) = if let Some(rest) = text.strip_prefix(LOOKUP_DATA_PREFIX) {
            (LookupKind::Data, rest)
        } else if let Some(rest) = text.strip_prefix(LOOKUP_DIR_PREFIX) {
            (LookupKind::Dir, rest)
        } else {
            return None;
        };

        let (rest, attr_path) = match rest.rsplit_once('#') {
            Some((rest, attr)) if !attr.trim().is_empty() => (rest, Some(attr.trim().to_string())),
            Some((rest, _)) => (rest, None),
            None => (rest, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (rest, IndexMap::new()),
        };

        Some(LookupReference {
            kind,
            segments: normalize_segments(path),
            query,
            attr_path,
            raw: text.to_string(),
        })
    }

    /// The referenced path, relative to its base directory.
    pub fn relative_path(&self) -> PathBuf {
        self.segments.iter().collect()
    }
}

/// Split a path into segments, dropping traversal tokens (`..`, `*`) and
/// empty segments so a reference can never leave its base directory.
fn normalize_segments(path: &str) -> Vec<String> {
    path.replace("../", "")
        .replace("/*", "")
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "." && *s != ".." && *s != "*")
        .map(str::to_string)
        .collect()
}

fn parse_query(query: &str) -> IndexMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(text: &str) -> String {
    let text = text.replace('+', " ");
    percent_decode_str(&text).decode_utf8_lossy().into_owned()
}

impl ParseScope<'_> {
    /// Resolve a lookup to a value.
    ///
    /// Missing targets and undecodable files produce a diagnostic and
    /// `Null`. Cycles and runaway chains are hard errors.
    pub fn resolve_lookup(&mut self, reference: &LookupReference) -> Result<Value> {
        let base = match reference.kind {
            LookupKind::Data => self.context.datastore_dir.clone(),
            LookupKind::Dir => self.current_dir().to_path_buf(),
        };
        let path = base.join(reference.relative_path());
        debug!(reference = %reference.raw, path = %path.display(), "resolving lookup");

        let value = match self.lookup.resolve_path(&path) {
            PathKind::Missing => {
                self.diagnose(DiagnosticKind::LookupNotFound {
                    reference: reference.raw.clone(),
                    path,
                });
                return Ok(Value::Null);
            }
            PathKind::Directory => {
                let mut query = DirectoryQuery::from_params(&reference.query);
                if let Some(name) = self.current_file().and_then(Path::file_name) {
                    query.exclude_names.push(name.to_string_lossy().into_owned());
                }
                self.load_collection(&path, &query)?.into_value()
            }
            PathKind::File => self.load_document(&path, &reference.raw)?,
        };

        Ok(match &reference.attr_path {
            Some(attr) => value.get_path(attr).cloned().unwrap_or(Value::Null),
            None => value,
        })
    }

    /// Load and decode one file.
    ///
    /// `.json`, `.yaml`/`.yml` and `.toml` files go through their codecs;
    /// anything else is parsed as a Parsely document in a fresh scope.
    pub(crate) fn load_document(&mut self, path: &Path, reference: &str) -> Result<Value> {
        let canonical = self.lookup.canonicalize(path);
        if self.resolution_stack().contains(&canonical) {
            return Err(ParseError::CycleDetected {
                path: canonical,
                chain: self.resolution_stack().to_vec(),
            });
        }
        let limit = self.options().max_lookup_depth;
        if self.resolution_stack().len() >= limit {
            return Err(ParseError::LookupDepthExceeded {
                limit,
                path: canonical,
            });
        }

        let size = self
            .lookup
            .file_size(path)
            .map_err(|source| ParseError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let max_size = self.options().max_file_size;
        if size > max_size {
            return Err(ParseError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                limit: max_size,
            });
        }

        let text = match self.lookup.read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                self.unreadable(reference, path, e.to_string());
                return Ok(Value::Null);
            }
        };

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let decoded = match extension.as_str() {
            "json" => transcode::json::decode(&text),
            "yaml" | "yml" => transcode::yaml::decode(&text),
            "toml" => transcode::toml::decode(&text),
            _ => {
                let mut child = self.child(canonical);
                let lines: Vec<&str> = text.lines().collect();
                let value = child.parse_lines(&lines);
                self.absorb(child);
                return value;
            }
        };

        match decoded {
            Ok(value) => Ok(value),
            Err(message) => {
                self.unreadable(reference, path, message);
                Ok(Value::Null)
            }
        }
    }

    fn unreadable(&mut self, reference: &str, path: &Path, message: String) {
        self.diagnose(DiagnosticKind::UnreadableLookup {
            reference: reference.to_string(),
            path: path.to_path_buf(),
            message,
        });
    }
}
