//! Block collection.
//!
//! The collector walks classified lines, hands every line that opens a
//! block to a recursive call, and folds the resulting entries into a map or
//! a list. Every call returns the value it built together with the number
//! of lines it consumed.

use crate::classify::{classify, count_depth, ClassifiedLine, ContainerHint, LineKind};
use crate::error::{DiagnosticKind, Result};
use crate::scope::ParseScope;
use crate::value::{merge_at_path, Map, Value};
use tracing::{debug, trace};

/// How the lines of a block are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    /// Structured lines: keys, lists, nested blocks.
    Data,
    /// Raw text that ends where indentation returns to the opener's depth.
    Indented,
    /// Raw text that ends at the next fence.
    Fenced,
}

/// A keyed or keyless value waiting to be folded into its container.
struct Entry {
    key: Option<String>,
    value: Value,
    separator: bool,
    line: usize,
    text: String,
}

impl ParseScope<'_> {
    /// Parse a whole document.
    pub fn parse_lines(&mut self, lines: &[&str]) -> Result<Value> {
        let (value, _) = self.collect(lines, 0, None, BlockMode::Data, ContainerHint::Map)?;
        Ok(value)
    }

    /// Collect the block starting at `lines[0]`.
    ///
    /// `current_depth` is the depth of the line that opened the block; any
    /// line at or above it ends the block. `offset` is the index of
    /// `lines[0]` in the document, for line numbers in diagnostics.
    pub fn collect(
        &mut self,
        lines: &[&str],
        offset: usize,
        current_depth: Option<usize>,
        mode: BlockMode,
        hint: ContainerHint,
    ) -> Result<(Value, usize)> {
        self.descend()?;
        let result = match mode {
            BlockMode::Data => self.collect_data(lines, offset, current_depth, hint),
            BlockMode::Indented => self.collect_indented(lines, offset, current_depth),
            BlockMode::Fenced => self.collect_fenced(lines, offset),
        };
        self.ascend();
        result
    }

    // =========================================================================
    // Data blocks
    // =========================================================================

    fn collect_data(
        &mut self,
        lines: &[&str],
        offset: usize,
        current_depth: Option<usize>,
        hint: ContainerHint,
    ) -> Result<(Value, usize)> {
        let tab_width = self.options().tab_width;
        let mut entries = Vec::new();
        let mut hidden_below: Option<usize> = None;
        let mut cursor = 0;

        while cursor < lines.len() {
            let raw = lines[cursor];
            let trimmed = raw.trim();
            let depth = count_depth(raw, tab_width);

            if trimmed.is_empty() {
                cursor += 1;
                continue;
            }
            if let Some(comment_depth) = hidden_below {
                if depth > comment_depth {
                    cursor += 1;
                    continue;
                }
                hidden_below = None;
            }
            if current_depth.is_some_and(|d| depth <= d) && !trimmed.starts_with('#') {
                break;
            }

            self.set_line(offset + cursor + 1);
            let line = classify(raw, false, self)?;
            match line.kind {
                LineKind::Blank | LineKind::Comment | LineKind::Text | LineKind::EndOfBlock { .. } => {
                    cursor += 1;
                }
                LineKind::BlockComment => {
                    hidden_below = Some(depth);
                    cursor += 1;
                }
                LineKind::Separator => {
                    entries.push(Entry {
                        key: None,
                        value: Value::Null,
                        separator: true,
                        line: self.line(),
                        text: trimmed.to_string(),
                    });
                    cursor += 1;
                }
                LineKind::Fence => {
                    let start = offset + cursor + 1;
                    let (value, used) = self.collect(
                        &lines[cursor + 1..],
                        start,
                        line.depth,
                        BlockMode::Fenced,
                        ContainerHint::Text,
                    )?;
                    debug!(key = ?line.key, line = start, used, "collected fenced block");
                    self.push_entry(&mut entries, line, value, start, trimmed);
                    cursor += 1 + used;
                }
                LineKind::Entry if line.block.is_parent => {
                    let start = offset + cursor + 1;
                    let mode = if line.block.is_string_block {
                        BlockMode::Indented
                    } else {
                        BlockMode::Data
                    };
                    let (value, used) =
                        self.collect(&lines[cursor + 1..], start, Some(depth), mode, line.hint)?;
                    trace!(key = ?line.key, ?mode, used, "collected nested block");
                    self.push_entry(&mut entries, line, value, start, trimmed);
                    cursor += 1 + used;
                }
                LineKind::Entry | LineKind::Fragment => {
                    let start = offset + cursor + 1;
                    let value = line.value.clone().unwrap_or(Value::Null);
                    self.push_entry(&mut entries, line, value, start, trimmed);
                    cursor += 1;
                }
            }
        }

        let value = self.fold(entries, hint);
        Ok((value, cursor))
    }

    fn push_entry(
        &mut self,
        entries: &mut Vec<Entry>,
        line: ClassifiedLine,
        value: Value,
        line_number: usize,
        text: &str,
    ) {
        // Anchors are visible to every line that follows, at any depth.
        if let Some(key) = line.key.as_deref().filter(|k| k.starts_with('$')) {
            self.commit_anchor(key, &value);
        }
        entries.push(Entry {
            key: line.key,
            value,
            separator: false,
            line: line_number,
            text: text.to_string(),
        });
    }

    /// Fold collected entries into the block's value.
    fn fold(&mut self, entries: Vec<Entry>, hint: ContainerHint) -> Value {
        if entries.iter().any(|e| e.separator) {
            return fold_list_of_maps(entries);
        }
        match hint {
            ContainerHint::List => fold_list(entries),
            _ => self.fold_map(entries),
        }
    }

    fn fold_map(&mut self, entries: Vec<Entry>) -> Value {
        let mut map = Map::new();
        for entry in entries {
            match entry.key {
                Some(key) => merge_at_path(&mut map, &key, entry.value),
                None => {
                    let line = self.line();
                    self.set_line(entry.line);
                    self.diagnose(DiagnosticKind::OrphanValue { text: entry.text });
                    self.set_line(line);
                }
            }
        }
        Value::Object(map)
    }

    // =========================================================================
    // Text blocks
    // =========================================================================

    fn collect_indented(
        &mut self,
        lines: &[&str],
        offset: usize,
        current_depth: Option<usize>,
    ) -> Result<(Value, usize)> {
        let tab_width = self.options().tab_width;
        let opener_depth = current_depth.unwrap_or(0);
        let mut body = Vec::new();
        let mut cursor = 0;

        while cursor < lines.len() {
            let raw = lines[cursor];
            if raw.trim().is_empty() {
                body.push("");
                cursor += 1;
                continue;
            }
            if count_depth(raw, tab_width) <= opener_depth {
                break;
            }
            self.set_line(offset + cursor + 1);
            match classify(raw, true, self)?.kind {
                LineKind::EndOfBlock { consumed } => {
                    if consumed {
                        cursor += 1;
                    }
                    break;
                }
                _ => body.push(raw),
            }
            cursor += 1;
        }

        Ok((Value::String(join_text(dedent(trim_blank_lines(&body)))), cursor))
    }

    fn collect_fenced(&mut self, lines: &[&str], offset: usize) -> Result<(Value, usize)> {
        let mut body = Vec::new();
        let mut cursor = 0;

        while cursor < lines.len() {
            self.set_line(offset + cursor + 1);
            match classify(lines[cursor], true, self)?.kind {
                LineKind::EndOfBlock { consumed } => {
                    if consumed {
                        cursor += 1;
                    }
                    break;
                }
                _ => body.push(lines[cursor]),
            }
            cursor += 1;
        }

        let body: Vec<String> = trim_blank_lines(&body).iter().map(|l| l.to_string()).collect();
        Ok((Value::String(join_text(body)), cursor))
    }
}

fn fold_list(entries: Vec<Entry>) -> Value {
    let items = entries
        .into_iter()
        .map(|entry| match entry.key {
            Some(key) => {
                let mut map = Map::new();
                merge_at_path(&mut map, &key, entry.value);
                Value::Object(map)
            }
            None => entry.value,
        })
        .collect();
    Value::Array(items)
}

/// Group entries between separators into maps.
///
/// Keyed entries accumulate into the current map; a separator closes it.
/// A keyless entry becomes an element of its own.
fn fold_list_of_maps(entries: Vec<Entry>) -> Value {
    let mut items = Vec::new();
    let mut current = Map::new();
    for entry in entries {
        if entry.separator {
            if !current.is_empty() {
                items.push(Value::Object(std::mem::take(&mut current)));
            }
            continue;
        }
        match entry.key {
            Some(key) => merge_at_path(&mut current, &key, entry.value),
            None => {
                if !current.is_empty() {
                    items.push(Value::Object(std::mem::take(&mut current)));
                }
                items.push(entry.value);
            }
        }
    }
    if !current.is_empty() {
        items.push(Value::Object(current));
    }
    Value::Array(items)
}

/// Remove leading and trailing blank lines.
fn trim_blank_lines<'l>(lines: &[&'l str]) -> Vec<&'l str> {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].to_vec(),
        _ => Vec::new(),
    }
}

/// Strip the indentation shared by all non-blank lines.
fn dedent(lines: Vec<&str>) -> Vec<String> {
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| *c == ' ' || *c == '\t').count())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                l.chars().skip(indent).collect()
            }
        })
        .collect()
}

fn join_text(lines: Vec<String>) -> String {
    let mut text = String::new();
    for line in lines {
        text.push_str(&line);
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use crate::context::AppContext;
    use crate::error::{DiagnosticKind, ParseError};
    use crate::query::FsLookup;
    use crate::scope::ParseScope;
    use crate::value::{Map, Value};
    use pretty_assertions::assert_eq;

    fn parse_with(context: &AppContext, text: &str) -> (crate::Result<Value>, usize) {
        let lookup = FsLookup;
        let mut scope = ParseScope::new(context, &lookup);
        let lines: Vec<&str> = text.lines().collect();
        let value = scope.parse_lines(&lines);
        (value, scope.diagnostics().len())
    }

    fn parse(text: &str) -> Value {
        parse_with(&AppContext::default(), text).0.unwrap()
    }

    fn obj(entries: Vec<(&str, Value)>) -> Value {
        Value::Object(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<Map>())
    }

    #[test]
    fn test_nested_maps() {
        let text = "\
config:
    server:
        port: 8000
    debug: false
name: app
";
        let expected = obj(vec![
            (
                "config",
                obj(vec![
                    ("server", obj(vec![("port", 8000i64.into())])),
                    ("debug", false.into()),
                ]),
            ),
            ("name", "app".into()),
        ]);
        assert_eq!(parse(text), expected);
    }

    #[test]
    fn test_list_block() {
        let text = "tags:-\n    one\n    2\n    name: x\n";
        let expected = obj(vec![(
            "tags",
            Value::Array(vec![
                "one".into(),
                2i64.into(),
                obj(vec![("name", "x".into())]),
            ]),
        )]);
        assert_eq!(parse(text), expected);
    }

    #[test]
    fn test_list_of_maps() {
        let text = "\
people:-
    name: Ada
    age: 36
    -
    name: Alan
    -
    plain
";
        let expected = obj(vec![(
            "people",
            Value::Array(vec![
                obj(vec![("name", "Ada".into()), ("age", 36i64.into())]),
                obj(vec![("name", "Alan".into())]),
                "plain".into(),
            ]),
        )]);
        assert_eq!(parse(text), expected);
    }

    #[test]
    fn test_dotted_keys_merge() {
        let text = "site.title: Home\nsite.lang: en\n";
        let expected = obj(vec![(
            "site",
            obj(vec![("title", "Home".into()), ("lang", "en".into())]),
        )]);
        assert_eq!(parse(text), expected);
    }

    #[test]
    fn test_indented_text_block() {
        let text = "\
body:|
    first line

        indented: kept
    last line

after: 1
";
        let value = parse(text);
        assert_eq!(
            value.get("body"),
            Some(&Value::from("first line\n\n    indented: kept\nlast line\n"))
        );
        assert_eq!(value.get("after"), Some(&Value::from(1i64)));
    }

    #[test]
    fn test_fenced_blocks() {
        let text = "\
title: Post
===content
line one

line two
===js
console.log(1);
````python snippet
print('x')
````
";
        let expected = obj(vec![
            ("title", "Post".into()),
            ("content", "line one\n\nline two\n".into()),
            ("js", "console.log(1);\n".into()),
            ("snippet", "print('x')\n".into()),
        ]);
        assert_eq!(parse(text), expected);
    }

    #[test]
    fn test_comments_are_transparent() {
        let text = "\
config:
    a: 1
# top level note
    b: 2
#| hidden block
    secret: 1
    deeper: 2
c: 3
";
        let expected = obj(vec![
            ("config", obj(vec![("a", 1i64.into()), ("b", 2i64.into())])),
            ("c", 3i64.into()),
        ]);
        assert_eq!(parse(text), expected);
    }

    #[test]
    fn test_anchors_resolve_at_any_depth() {
        let text = "\
defaults:
    $theme: dark
page:
    theme: $theme
    other: $missing
";
        let value = parse(text);
        assert_eq!(value.get_path("page.theme"), Some(&Value::from("dark")));
        assert_eq!(value.get_path("page.other"), Some(&Value::from("$missing")));
    }

    #[test]
    fn test_anchors_in_inline_lists() {
        let value = parse("$a: 1\n$b: 2\nboth:- $a, $b\none:- $a\n");
        assert_eq!(
            value.get("both"),
            Some(&Value::Array(vec![1i64.into(), 2i64.into()]))
        );
        assert_eq!(value.get("one"), Some(&Value::Array(vec![1i64.into()])));
    }

    #[test]
    fn test_root_list_of_maps() {
        let value = parse("a: 1\n-\na: 2\n");
        assert_eq!(
            value,
            Value::Array(vec![
                obj(vec![("a", 1i64.into())]),
                obj(vec![("a", 2i64.into())]),
            ])
        );
    }

    #[test]
    fn test_orphan_values_are_reported() {
        let (value, diagnostics) = parse_with(&AppContext::default(), "a: 1\nstray\n: bad\n");
        assert_eq!(value.unwrap(), obj(vec![("a", 1i64.into())]));
        assert_eq!(diagnostics, 3);
    }

    #[test]
    fn test_orphan_diagnostic_kind() {
        let context = AppContext::default();
        let lookup = FsLookup;
        let mut scope = ParseScope::new(&context, &lookup);
        scope.parse_lines(&["a: 1", "stray"]).unwrap();
        let diag = &scope.diagnostics()[0];
        assert_eq!(diag.line, 2);
        assert_eq!(
            diag.kind,
            DiagnosticKind::OrphanValue {
                text: "stray".into()
            }
        );
    }

    #[test]
    fn test_depth_limit() {
        let context = AppContext::default()
            .with_options(crate::ParseOptions::default().with_max_depth(3));
        let text = "a:\n    b:\n        c:\n            d: 1\n";
        let (result, _) = parse_with(&context, text);
        assert!(matches!(result, Err(ParseError::DepthExceeded { limit: 3, .. })));
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(parse(""), Value::Object(Map::new()));
        assert_eq!(parse("\n\n# only a comment\n"), Value::Object(Map::new()));
    }
}
