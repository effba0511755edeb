//! Per-document parse state.

use crate::context::{AppContext, ParseOptions};
use crate::error::{Diagnostic, DiagnosticKind, ParseError, Result};
use crate::query::FileLookup;
use crate::value::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// State carried through the parse of one document.
///
/// Every document gets its own scope, so `$name` anchors never leak between
/// a document and the files it references. The resolution stack and the
/// diagnostics are handed down to (and collected back from) nested scopes.
pub struct ParseScope<'a> {
    pub(crate) context: &'a AppContext,
    pub(crate) lookup: &'a dyn FileLookup,
    anchors: HashMap<String, Value>,
    file: Option<PathBuf>,
    dir: PathBuf,
    /// Files currently being resolved, outermost first.
    stack: Vec<PathBuf>,
    diagnostics: Vec<Diagnostic>,
    /// One-based number of the line being classified.
    line: usize,
    nesting: usize,
}

impl<'a> ParseScope<'a> {
    /// Scope for text that did not come from a file.
    pub fn new(context: &'a AppContext, lookup: &'a dyn FileLookup) -> Self {
        ParseScope {
            context,
            lookup,
            anchors: HashMap::new(),
            file: None,
            dir: context.contents_dir.clone(),
            stack: Vec::new(),
            diagnostics: Vec::new(),
            line: 0,
            nesting: 0,
        }
    }

    /// Scope for a document read from `path`.
    pub fn for_file(context: &'a AppContext, lookup: &'a dyn FileLookup, path: &Path) -> Self {
        let mut scope = ParseScope::new(context, lookup);
        scope.enter_file(lookup.canonicalize(path));
        scope
    }

    /// Fresh scope for a document referenced from this one.
    pub(crate) fn child(&self, path: PathBuf) -> ParseScope<'a> {
        let mut scope = ParseScope::new(self.context, self.lookup);
        scope.stack = self.stack.clone();
        scope.enter_file(path);
        scope
    }

    fn enter_file(&mut self, path: PathBuf) {
        if let Some(parent) = path.parent() {
            self.dir = parent.to_path_buf();
        }
        self.stack.push(path.clone());
        self.file = Some(path);
    }

    pub fn options(&self) -> &ParseOptions {
        &self.context.options
    }

    /// Directory `$dir/` references resolve against.
    pub fn current_dir(&self) -> &Path {
        &self.dir
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub(crate) fn resolution_stack(&self) -> &[PathBuf] {
        &self.stack
    }

    pub(crate) fn set_line(&mut self, line: usize) {
        self.line = line;
    }

    pub(crate) fn line(&self) -> usize {
        self.line
    }

    /// Anchored value registered under `name` (including the `$`).
    pub fn anchor(&self, name: &str) -> Option<&Value> {
        self.anchors.get(name)
    }

    pub(crate) fn commit_anchor(&mut self, name: &str, value: &Value) {
        self.anchors.insert(name.to_string(), value.clone());
    }

    pub(crate) fn diagnose(&mut self, kind: DiagnosticKind) {
        let diagnostic = Diagnostic {
            file: self.file.clone(),
            line: self.line,
            kind,
        };
        warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn absorb(&mut self, child: ParseScope<'_>) {
        self.diagnostics.extend(child.diagnostics);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Track one more level of block nesting.
    pub(crate) fn descend(&mut self) -> Result<()> {
        self.nesting += 1;
        if self.nesting > self.context.options.max_depth {
            let location = match &self.file {
                Some(path) => format!(" at {}:{}", path.display(), self.line),
                None => format!(" at line {}", self.line),
            };
            return Err(ParseError::DepthExceeded {
                limit: self.context.options.max_depth,
                location,
            });
        }
        Ok(())
    }

    pub(crate) fn ascend(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
    }
}
