//! Parse configuration and application context.

use std::path::{Path, PathBuf};

/// Default number of spaces per indentation level.
pub const DEFAULT_TAB_WIDTH: usize = 4;

/// Limits and layout settings for a parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Spaces per indentation level. Tabs count as one full level.
    pub tab_width: usize,
    /// Maximum block nesting depth inside one document.
    pub max_depth: usize,
    /// Maximum number of nested lookup hops.
    pub max_lookup_depth: usize,
    /// Maximum size in bytes of any document read from disk.
    pub max_file_size: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            tab_width: DEFAULT_TAB_WIDTH,
            max_depth: 64,
            max_lookup_depth: 16,
            max_file_size: 8 * 1024 * 1024,
        }
    }
}

impl ParseOptions {
    pub fn with_tab_width(mut self, tab_width: usize) -> Self {
        self.tab_width = tab_width.max(1);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_lookup_depth(mut self, max_lookup_depth: usize) -> Self {
        self.max_lookup_depth = max_lookup_depth;
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }
}

/// Base paths used to resolve lookup references.
///
/// `$data/...` references resolve against `datastore_dir`. `$dir/...`
/// references resolve against the directory of the document being parsed,
/// or `contents_dir` when parsing text that did not come from a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppContext {
    pub contents_dir: PathBuf,
    pub datastore_dir: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub options: ParseOptions,
}

impl AppContext {
    /// Context rooted at a single directory for both contents and data.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            contents_dir: root.clone(),
            datastore_dir: root,
            output_dir: None,
            options: ParseOptions::default(),
        }
    }

    pub fn with_contents_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.contents_dir = dir.into();
        self
    }

    pub fn with_datastore_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.datastore_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }
}
