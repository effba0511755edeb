//! Error and diagnostic types for Parsely parsing and serialization.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for Parsely parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Hard failures. These abort the parse of the current document.
///
/// Anything recoverable (a malformed line, a missing lookup) is reported as a
/// [`Diagnostic`] instead.
#[derive(Error, Debug)]
pub enum ParseError {
    /// A lookup chain revisited a file that is still being resolved.
    #[error("Lookup cycle detected at {}{}", .path.display(), format_chain(.chain))]
    CycleDetected { path: PathBuf, chain: Vec<PathBuf> },

    /// Block nesting went deeper than the configured limit.
    #[error("Block nesting exceeds the maximum depth of {limit}{location}")]
    DepthExceeded { limit: usize, location: String },

    /// Lookup resolution went deeper than the configured limit.
    #[error("Lookup chain exceeds the maximum depth of {limit} at {}", .path.display())]
    LookupDepthExceeded { limit: usize, path: PathBuf },

    /// A document is larger than the configured limit.
    #[error("File {} is {size} bytes, larger than the limit of {limit} bytes", .path.display())]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        limit: u64,
    },

    /// A document could not be read.
    #[error("Unable to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn format_chain(chain: &[PathBuf]) -> String {
    if chain.is_empty() {
        return String::new();
    }
    let hops: Vec<String> = chain.iter().map(|p| p.display().to_string()).collect();
    format!(" (via {})", hops.join(" -> "))
}

/// Failures while turning a [`Value`](crate::Value) back into text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SerializeError {
    /// The value has no textual representation in the format.
    #[error("Cannot serialize {kind} at `{path}`: {reason}")]
    Unrepresentable {
        path: String,
        kind: &'static str,
        reason: &'static str,
    },
}

/// Why a single line could not be classified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// A delimiter was found with nothing in front of it.
    #[error("empty key before `{0}`")]
    EmptyKey(&'static str),

    /// The line contains a control character.
    #[error("control character U+{0:04X}")]
    ControlCharacter(u32),
}

/// A recoverable problem found while parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Document the problem was found in, when parsing from a file.
    pub file: Option<PathBuf>,
    /// One-based line number.
    pub line: usize,
    pub kind: DiagnosticKind,
}

/// The kinds of recoverable problems.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    /// The line was kept as an opaque text fragment.
    MalformedLine { text: String, cause: ClassifyError },
    /// A keyless value appeared where keys were expected and was dropped.
    OrphanValue { text: String },
    /// A lookup reference points at a path that does not exist.
    LookupNotFound { reference: String, path: PathBuf },
    /// A lookup reference points at a file that could not be decoded.
    UnreadableLookup {
        reference: String,
        path: PathBuf,
        message: String,
    },
}

impl Diagnostic {
    /// Format a location suffix for messages.
    pub fn loc_suffix(&self) -> String {
        match &self.file {
            Some(name) => format!(" at {}:{}", name.display(), self.line),
            None => format!(" at line {}", self.line),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::MalformedLine { text, cause } => {
                write!(f, "Malformed line ({}) {:?}", cause, text)?
            }
            DiagnosticKind::OrphanValue { text } => {
                write!(f, "Value without a key dropped: {:?}", text)?
            }
            DiagnosticKind::LookupNotFound { reference, path } => write!(
                f,
                "Lookup {} not found (make sure {} exists)",
                reference,
                path.display()
            )?,
            DiagnosticKind::UnreadableLookup {
                reference,
                path,
                message,
            } => write!(
                f,
                "Lookup {} could not read {}: {}",
                reference,
                path.display(),
                message
            )?,
        }
        write!(f, "{}", self.loc_suffix())
    }
}
