//! Parsely: an indentation-sensitive, block-structured format for content
//! and configuration files.
//!
//! ```text
//! title: Hello
//! tags:- rust, parsing
//! author:
//!     name: Ada
//! posts: $dir/posts?limit=5
//! ===content
//! Free-form text until the next block.
//! ```
//!
//! # Parsing Pipeline
//!
//! 1. **Classifier**: Reads one physical line at a time and works out its
//!    depth, key, delimiter and inline value. Lookups (`$data/...`,
//!    `$dir/...`) and anchors (`$name`) are resolved here.
//!
//! 2. **Collector**: Groups lines into blocks by indentation or fences and
//!    folds each block into an object or an array.
//!
//! 3. **Serializer**: Turns a value back into Parsely text.
//!
//! Recoverable problems (malformed lines, missing lookups) never abort a
//! parse; they are returned as [`Diagnostic`]s next to the value.

mod classify;
mod collect;
mod context;
mod encode;
mod error;
mod lookup;
mod query;
mod scalar;
mod scope;
pub mod transcode;
mod value;

use std::path::Path;
use tracing::debug;

pub use classify::{
    classify, count_depth, deserialize_value, find_delimiter, BlockFlags, ClassifiedLine,
    ContainerHint, Delimiter, LineKind, BLOCK_PREFIX, DEFAULT_BLOCK_KEY, FENCE,
};
pub use collect::BlockMode;
pub use context::{AppContext, ParseOptions, DEFAULT_TAB_WIDTH};
pub use encode::{serialize, serialize_with, SerializeOptions};
pub use error::{ClassifyError, Diagnostic, DiagnosticKind, ParseError, Result, SerializeError};
pub use lookup::{LookupKind, LookupReference, LOOKUP_DATA_PREFIX, LOOKUP_DIR_PREFIX};
pub use query::{
    compare_values, sort_order, Collection, DirectoryQuery, FileLookup, FsLookup, PathKind,
    WhereClause, WhereOp,
};
pub use scalar::{deserialize_list, deserialize_scalar, list_items, unescape};
pub use scope::ParseScope;
pub use value::{merge_at_path, Map, Value};

/// A parsed document and the problems found along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub value: Value,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a Parsely document from a string.
///
/// Lookups resolve relative to the working directory. Use
/// [`parse_document`] to control that and to see diagnostics.
///
/// # Example
///
/// ```
/// use libparsely::{parse, Value};
///
/// let value = parse("name: Ada\nage: 36").unwrap();
/// assert_eq!(value.get("age"), Some(&Value::from(36i64)));
/// ```
pub fn parse(input: &str) -> Result<Value> {
    Ok(parse_document(input, &AppContext::default())?.value)
}

/// Parse a document from a string within `context`.
pub fn parse_document(input: &str, context: &AppContext) -> Result<Parsed> {
    parse_document_with(input, context, &FsLookup)
}

/// Parse a document from a string, reading lookups through `lookup`.
pub fn parse_document_with(
    input: &str,
    context: &AppContext,
    lookup: &dyn FileLookup,
) -> Result<Parsed> {
    let mut scope = ParseScope::new(context, lookup);
    parse_in_scope(input, &mut scope).map(|value| Parsed {
        value,
        diagnostics: scope.into_diagnostics(),
    })
}

/// Read and parse a document from disk.
///
/// `$dir/` lookups resolve against the file's own directory.
pub fn parse_file(path: &Path, context: &AppContext) -> Result<Parsed> {
    let lookup = FsLookup;
    let io_error = |source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    };
    let size = lookup.file_size(path).map_err(io_error)?;
    let limit = context.options.max_file_size;
    if size > limit {
        return Err(ParseError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            limit,
        });
    }
    let input = lookup.read_to_string(path).map_err(io_error)?;
    debug!(path = %path.display(), size, "parsing file");

    let mut scope = ParseScope::for_file(context, &lookup, path);
    parse_in_scope(&input, &mut scope).map(|value| Parsed {
        value,
        diagnostics: scope.into_diagnostics(),
    })
}

fn parse_in_scope(input: &str, scope: &mut ParseScope<'_>) -> Result<Value> {
    let lines: Vec<&str> = input.lines().collect();
    scope.parse_lines(&lines)
}
