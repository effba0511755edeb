//! Line classification.
//!
//! Every physical line is classified on its own: indentation depth, key,
//! delimiter, and whatever value can be decoded from the text after the
//! delimiter. Grouping lines into blocks is the collector's job.

use crate::error::{ClassifyError, DiagnosticKind, Result};
use crate::lookup::LookupReference;
use crate::scalar::{deserialize_scalar, list_items, unescape};
use crate::scope::ParseScope;
use crate::value::{merge_at_path, Map, Value};
use tracing::trace;

/// Opens a named block that runs until the next fence.
pub const BLOCK_PREFIX: &str = "===";
/// Opens (or closes) a code fence.
pub const FENCE: &str = "````";
/// Key used for fences that carry no name.
pub const DEFAULT_BLOCK_KEY: &str = "content";
/// A line made of only this marks the boundary between list-of-map items.
pub const SEPARATOR: &str = "-";

/// The inline delimiters, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `:|` indentation-delimited text block.
    BlockString,
    /// `` :` `` indentation-delimited raw text block.
    RawString,
    /// `:-` list.
    List,
    /// `: ` map entry.
    Map,
}

impl Delimiter {
    pub const ALL: [Delimiter; 4] = [
        Delimiter::BlockString,
        Delimiter::RawString,
        Delimiter::List,
        Delimiter::Map,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Delimiter::BlockString => ":|",
            Delimiter::RawString => ":`",
            Delimiter::List => ":-",
            Delimiter::Map => ": ",
        }
    }

    fn hint(self) -> ContainerHint {
        match self {
            Delimiter::BlockString | Delimiter::RawString => ContainerHint::Text,
            Delimiter::List => ContainerHint::List,
            Delimiter::Map => ContainerHint::Map,
        }
    }
}

/// What kind of container a line's value (or child block) builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerHint {
    Scalar,
    List,
    Map,
    Text,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockFlags {
    /// The child block is raw text rather than data.
    pub is_string_block: bool,
    /// The value comes from the following, more-indented lines.
    pub is_parent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Key and/or value.
    Entry,
    /// A lone `-`.
    Separator,
    Blank,
    /// `# ...`
    Comment,
    /// `#| ...`, which also hides every deeper line below it.
    BlockComment,
    /// `===name` or a code fence opener.
    Fence,
    /// Text inside a block.
    Text,
    /// Terminates the current block. `consumed` is set for closing fences,
    /// which belong to the block they close.
    EndOfBlock { consumed: bool },
    /// Unclassifiable line kept as opaque text.
    Fragment,
}

/// One physical line after classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedLine {
    /// Nesting level. `None` for fragments.
    pub depth: Option<usize>,
    pub key: Option<String>,
    pub hint: ContainerHint,
    pub value: Option<Value>,
    pub block: BlockFlags,
    pub kind: LineKind,
}

impl ClassifiedLine {
    fn new(kind: LineKind, depth: Option<usize>) -> Self {
        ClassifiedLine {
            depth,
            key: None,
            hint: ContainerHint::Scalar,
            value: None,
            block: BlockFlags::default(),
            kind,
        }
    }
}

/// Number of indentation levels before the first non-whitespace character.
///
/// Spaces are counted in units of `tab_width`; a tab is one full level.
pub fn count_depth(line: &str, tab_width: usize) -> usize {
    let tab_width = tab_width.max(1);
    let columns: usize = line
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { tab_width } else { 1 })
        .sum();
    columns / tab_width
}

/// Classify one line.
///
/// `inside_block` is set while collecting the body of a text block; such
/// lines are kept verbatim unless they terminate the block.
pub fn classify(line: &str, inside_block: bool, scope: &mut ParseScope<'_>) -> Result<ClassifiedLine> {
    let depth = count_depth(line, scope.options().tab_width);

    if inside_block {
        let classified = classify_block_line(line, depth);
        trace!(depth, kind = ?classified.kind, "classified block line");
        return Ok(classified);
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(ClassifiedLine::new(LineKind::Blank, Some(depth)));
    }
    if trimmed.starts_with("#|") {
        return Ok(ClassifiedLine::new(LineKind::BlockComment, Some(depth)));
    }
    if trimmed.starts_with('#') {
        return Ok(ClassifiedLine::new(LineKind::Comment, Some(depth)));
    }

    if let Some(c) = line.chars().find(|c| c.is_control() && *c != '\t' && *c != '\r') {
        return Ok(degrade(line, ClassifyError::ControlCharacter(c as u32), scope));
    }

    if let Some(key) = fence_key(line) {
        let mut classified = ClassifiedLine::new(LineKind::Fence, Some(0));
        classified.key = Some(key);
        classified.hint = ContainerHint::Text;
        classified.block = BlockFlags {
            is_string_block: true,
            is_parent: true,
        };
        return Ok(classified);
    }

    if trimmed == SEPARATOR {
        let mut classified = ClassifiedLine::new(LineKind::Separator, Some(depth));
        classified.value = Some(Value::String(SEPARATOR.to_string()));
        return Ok(classified);
    }

    let classified = classify_entry(trimmed, depth, scope)?;
    trace!(depth, key = ?classified.key, hint = ?classified.hint, "classified line");
    Ok(classified)
}

fn classify_block_line(line: &str, depth: usize) -> ClassifiedLine {
    // `===name` and named fences open the next block, so they are left for
    // the caller. Only a closing fence belongs to the block it ends.
    let end = if line.starts_with(BLOCK_PREFIX) {
        Some(false)
    } else if line.trim().ends_with(FENCE) {
        Some(true)
    } else if line.starts_with(FENCE) {
        Some(false)
    } else {
        None
    };
    if let Some(consumed) = end {
        return ClassifiedLine::new(LineKind::EndOfBlock { consumed }, Some(depth));
    }

    let mut classified = ClassifiedLine::new(LineKind::Text, Some(depth));
    classified.hint = ContainerHint::Text;
    classified.block.is_string_block = true;
    classified.value = Some(Value::String(format!("{}\n", line)));
    classified
}

/// Key of a block opened by `line`, if it is a fence.
///
/// `===name` names the block directly. A code fence reads
/// `` ````lang alias ``; the alias, when present, wins over the language.
fn fence_key(line: &str) -> Option<String> {
    let rest = if let Some(rest) = line.strip_prefix(BLOCK_PREFIX) {
        rest
    } else if line.starts_with(FENCE) {
        line.trim_start_matches('`')
    } else {
        return None;
    };
    let rest = rest.trim();
    let key = match rest.split_once(char::is_whitespace) {
        Some((_, alias)) if !alias.trim().is_empty() => alias.trim(),
        Some((name, _)) => name,
        None => rest,
    };
    Some(if key.is_empty() {
        DEFAULT_BLOCK_KEY.to_string()
    } else {
        key.to_string()
    })
}

fn classify_entry(trimmed: &str, depth: usize, scope: &mut ParseScope<'_>) -> Result<ClassifiedLine> {
    // A trailing `:` opens a map block.
    let normalized;
    let text = if trimmed.ends_with(':') && !trimmed.ends_with("\\:") {
        normalized = format!("{} ", trimmed);
        normalized.as_str()
    } else {
        trimmed
    };

    let Some((position, delimiter)) = find_delimiter(text) else {
        let mut classified = ClassifiedLine::new(LineKind::Entry, Some(depth));
        classified.value = Some(deserialize_value(text, ContainerHint::Scalar, scope)?);
        return Ok(classified);
    };

    let key = unescape(text[..position].trim());
    if key.is_empty() {
        return Ok(degrade(text, ClassifyError::EmptyKey(delimiter.token()), scope));
    }
    let residual = text[position + delimiter.token().len()..].trim();

    let mut classified = ClassifiedLine::new(LineKind::Entry, Some(depth));
    classified.key = Some(key);
    classified.hint = delimiter.hint();
    classified.block.is_string_block = classified.hint == ContainerHint::Text;

    if residual.is_empty() {
        classified.block.is_parent = true;
        return Ok(classified);
    }

    classified.value = Some(match delimiter {
        // Inline text after a text-block delimiter is taken as-is.
        Delimiter::BlockString | Delimiter::RawString => Value::String(residual.to_string()),
        Delimiter::List => deserialize_value(residual, ContainerHint::List, scope)?,
        Delimiter::Map => deserialize_value(residual, ContainerHint::Map, scope)?,
    });
    Ok(classified)
}

fn degrade(text: &str, cause: ClassifyError, scope: &mut ParseScope<'_>) -> ClassifiedLine {
    scope.diagnose(DiagnosticKind::MalformedLine {
        text: text.to_string(),
        cause,
    });
    let mut classified = ClassifiedLine::new(LineKind::Fragment, None);
    classified.value = Some(Value::String(text.trim().to_string()));
    classified
}

/// Find the first unescaped delimiter in `text`.
///
/// The earliest position wins; ties go to the delimiter listed first in
/// [`Delimiter::ALL`].
pub fn find_delimiter(text: &str) -> Option<(usize, Delimiter)> {
    Delimiter::ALL
        .iter()
        .filter_map(|d| find_unescaped(text, d.token()).map(|pos| (pos, *d)))
        .min_by_key(|(pos, _)| *pos)
}

fn find_unescaped(text: &str, token: &str) -> Option<usize> {
    text.match_indices(token)
        .map(|(pos, _)| pos)
        .find(|pos| *pos == 0 || text.as_bytes()[pos - 1] != b'\\')
}

fn has_inline_map(text: &str) -> bool {
    find_unescaped(text, Delimiter::Map.token()).is_some() && !text.contains(", ")
}

/// Decode the text after a delimiter.
///
/// Lookups resolve first, then inline maps (`a: b`), then anchors, and
/// finally plain scalars or inline lists. Each item of an inline list is
/// checked against the anchors on its own.
///
/// A `$name` that matches no anchor is kept verbatim, `$` included, so
/// text such as `$5` is never mistaken for a number.
pub fn deserialize_value(text: &str, hint: ContainerHint, scope: &mut ParseScope<'_>) -> Result<Value> {
    let text = text.trim();

    if let Some(reference) = LookupReference::parse(text) {
        return scope.resolve_lookup(&reference);
    }

    if hint == ContainerHint::List {
        let items = list_items(text)
            .map(|item| scope.anchor(item).cloned().unwrap_or_else(|| deserialize_scalar(item)))
            .collect();
        return Ok(Value::Array(items));
    }

    if has_inline_map(text) {
        // Every `: ` nests one level deeper.
        scope.descend()?;
        let inner = classify_entry(text, 0, scope);
        scope.ascend();
        let inner = inner?;
        if let (Some(key), Some(value)) = (inner.key, inner.value) {
            let mut map = Map::new();
            merge_at_path(&mut map, &key, value);
            return Ok(Value::Object(map));
        }
    }

    if let Some(value) = scope.anchor(text) {
        return Ok(value.clone());
    }

    Ok(deserialize_scalar(text))
}
