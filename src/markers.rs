//! Marker-delimited generated blocks.
//!
//! A generated block is the span from a `### NAME START ###` line to the
//! next `### NAME END ###` line, both inclusive. Recognition works on a
//! line tokenizer rather than whole-document pattern scans, so every block
//! comes back with exact byte offsets that the analyzer and the rewriter
//! can test containment against.
//!
//! # Recognition rules
//!
//! - Marker lines must match exactly, starting at column 0.
//! - A start pairs with the first later end carrying the same name; the
//!   scan resumes after that end, so blocks never nest or overlap.
//! - An unterminated or mismatched start is ordinary user text.
//! - `### DISABLED-NAME START ###` is inert: [`find_blocks`] ignores it,
//!   while [`strip_blocks`] pairs it with `### NAME END ###` so disabled
//!   blocks are still removable.

use crate::document::ConfigDocument;
use crate::error::Result;
use crate::types::Position;
use std::ops::Range;
use tracing::debug;

/// Prefix a soft rollback puts in front of a start-marker name
pub const DISABLED_PREFIX: &str = "DISABLED-";

pub fn start_line(marker: &str) -> String {
    format!("### {marker} START ###")
}

pub fn end_line(marker: &str) -> String {
    format!("### {marker} END ###")
}

/// Classification of a single line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Start(&'a str),
    End(&'a str),
    Text,
}

/// A tokenized line. `range` includes the trailing newline, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line<'a> {
    pub range: Range<usize>,
    pub kind: LineKind<'a>,
}

/// Split `text` into classified lines with byte offsets.
pub fn tokenize(text: &str) -> Vec<Line<'_>> {
    let mut offset = 0;
    text.split_inclusive('\n')
        .map(|raw| {
            let range = offset..offset + raw.len();
            offset = range.end;
            Line {
                range,
                kind: classify(raw),
            }
        })
        .collect()
}

fn classify(raw: &str) -> LineKind<'_> {
    let line = raw.trim_end_matches('\n').trim_end_matches('\r');
    let Some(inner) = line
        .strip_prefix("### ")
        .and_then(|rest| rest.strip_suffix(" ###"))
    else {
        return LineKind::Text;
    };

    if let Some(name) = inner.strip_suffix(" START").filter(|n| is_marker_name(n)) {
        LineKind::Start(name)
    } else if let Some(name) = inner.strip_suffix(" END").filter(|n| is_marker_name(n)) {
        LineKind::End(name)
    } else {
        LineKind::Text
    }
}

fn is_marker_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// A recognised generated block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    /// Marker name without any `DISABLED-` prefix
    pub marker: String,
    /// Byte range from the start of the START line to the end of the END line
    pub range: Range<usize>,
    pub disabled: bool,
}

impl BlockSpan {
    /// True if `other` lies entirely inside this block
    pub fn contains(&self, other: &Range<usize>) -> bool {
        self.range.start <= other.start && other.end <= self.range.end
    }

    /// True if `other` shares at least one byte with this block
    pub fn overlaps(&self, other: &Range<usize>) -> bool {
        other.start < self.range.end && self.range.start < other.end
    }
}

/// Active generated blocks in document order.
pub fn find_blocks(text: &str) -> Vec<BlockSpan> {
    scan_blocks(text, false)
}

fn scan_blocks(text: &str, include_disabled: bool) -> Vec<BlockSpan> {
    let lines = tokenize(text);
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let LineKind::Start(name) = lines[i].kind else {
            i += 1;
            continue;
        };

        let (base, disabled) = match name.strip_prefix(DISABLED_PREFIX) {
            Some(base) => (base, true),
            None => (name, false),
        };
        if disabled && !include_disabled {
            i += 1;
            continue;
        }

        let close = lines[i + 1..].iter().position(|line| match line.kind {
            LineKind::End(end) => end == base || (disabled && end == name),
            _ => false,
        });

        match close {
            Some(offset) => {
                let j = i + 1 + offset;
                blocks.push(BlockSpan {
                    marker: base.to_string(),
                    range: lines[i].range.start..lines[j].range.end,
                    disabled,
                });
                i = j + 1;
            }
            None => i += 1,
        }
    }

    blocks
}

/// Render a complete block, always newline-terminated.
pub fn render_block(marker: &str, body: &str) -> String {
    format!(
        "{}\n{}\n{}\n",
        start_line(marker),
        body.trim_end_matches('\n'),
        end_line(marker)
    )
}

/// Insert `chunk` before or after `text`, separated by one blank line.
fn place(text: &str, chunk: &str, position: Position) -> String {
    if text.is_empty() {
        return chunk.to_string();
    }
    match position {
        Position::Prepend => format!("{chunk}\n{text}"),
        Position::Append => {
            let mut out = String::with_capacity(text.len() + chunk.len() + 2);
            out.push_str(text);
            if !text.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
            out.push_str(chunk);
            out
        }
    }
}

/// Text with the block added, or `None` if an active block with this
/// marker already exists.
pub fn insert_block(text: &str, marker: &str, body: &str, position: Position) -> Option<String> {
    if find_blocks(text).iter().any(|b| b.marker == marker) {
        return None;
    }
    Some(place(text, &render_block(marker, body), position))
}

/// Make sure the document holds exactly one block for `marker`.
///
/// Returns true if the block was inserted (and the file rewritten).
/// An existing block is left untouched, body and whitespace included.
pub fn ensure_block(
    doc: &mut ConfigDocument,
    marker: &str,
    body: &str,
    position: Position,
) -> Result<bool> {
    match insert_block(doc.content(), marker, body, position) {
        Some(updated) => {
            doc.save(updated)?;
            debug!("Inserted {} block into {:?}", marker, doc.path());
            Ok(true)
        }
        None => {
            debug!("{} block already present in {:?}", marker, doc.path());
            Ok(false)
        }
    }
}

/// Make sure `line` appears somewhere in the document (literal substring
/// check, no markers). Returns true if it was added.
///
/// A prepended line goes directly above the existing text; an appended
/// one gets the same blank separator as a block.
pub fn ensure_line(doc: &mut ConfigDocument, line: &str, position: Position) -> Result<bool> {
    let needle = line.trim();
    if needle.is_empty() || doc.content().contains(needle) {
        return Ok(false);
    }
    let chunk = format!("{}\n", line.trim_end_matches('\n'));
    let updated = match position {
        Position::Prepend => format!("{chunk}{}", doc.content()),
        Position::Append => place(doc.content(), &chunk, position),
    };
    doc.save(updated)?;
    Ok(true)
}

/// Rename every start marker whose name begins with one of `prefixes` to
/// its `DISABLED-` form. End markers are left alone.
///
/// Returns the new text and the number of start lines rewritten.
pub fn disable_blocks(text: &str, prefixes: &[&str]) -> (String, usize) {
    let mut out = String::with_capacity(text.len() + 32);
    let mut count = 0;

    for line in tokenize(text) {
        let raw = &text[line.range.clone()];
        match line.kind {
            LineKind::Start(name)
                if !name.starts_with(DISABLED_PREFIX)
                    && prefixes.iter().any(|p| name.starts_with(p)) =>
            {
                out.push_str(&start_line(&format!("{DISABLED_PREFIX}{name}")));
                // keep the original line ending
                out.push_str(&raw[raw.trim_end_matches(['\n', '\r']).len()..]);
                count += 1;
            }
            _ => out.push_str(raw),
        }
    }

    (out, count)
}

/// Delete every generated block, active or disabled.
///
/// The blank separator line [`ensure_block`] inserts next to a block goes
/// with it, so stripping undoes an insertion. Returns the new text and the
/// removed blocks (offsets refer to the input text).
pub fn strip_blocks(text: &str) -> (String, Vec<BlockSpan>) {
    let blocks = scan_blocks(text, true);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for block in &blocks {
        out.push_str(&text[cursor..block.range.start]);
        if out.ends_with("\n\n") {
            out.pop();
        }
        cursor = block.range.end;
        if out.is_empty() && text[cursor..].starts_with('\n') {
            cursor += 1;
        }
    }
    out.push_str(&text[cursor..]);

    (out, blocks)
}

/// Text with every active block deleted verbatim (no separator cleanup).
pub fn without_blocks(text: &str, blocks: &[BlockSpan]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for block in blocks {
        out.push_str(&text[cursor..block.range.start]);
        cursor = block.range.end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const RUST: &str = "### AUTO-RUST START ###\nexport PATH=\"$HOME/.cargo/bin:$PATH\"\n### AUTO-RUST END ###\n";

    #[test]
    fn test_classify_marker_lines() {
        assert_eq!(classify("### AUTO-GO START ###\n"), LineKind::Start("AUTO-GO"));
        assert_eq!(classify("### AUTO-GO END ###"), LineKind::End("AUTO-GO"));
        assert_eq!(classify("### AUTO-GO END ###\r\n"), LineKind::End("AUTO-GO"));
        assert_eq!(classify(" ### AUTO-GO START ###"), LineKind::Text);
        assert_eq!(classify("### START ###"), LineKind::Text);
        assert_eq!(classify("### auto go START ###"), LineKind::Text);
        assert_eq!(classify("# plain comment"), LineKind::Text);
    }

    #[test]
    fn test_tokenize_offsets_cover_text() {
        let text = "a\n### X START ###\nb\n### X END ###";
        let lines = tokenize(text);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].range, 0..2);
        assert_eq!(lines.last().unwrap().range.end, text.len());
    }

    #[test]
    fn test_find_single_block() {
        let text = format!("alias ll='ls -l'\n\n{RUST}");
        let blocks = find_blocks(&text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].marker, "AUTO-RUST");
        assert_eq!(&text[blocks[0].range.clone()], RUST);
    }

    #[test]
    fn test_mismatched_markers_are_not_a_block() {
        let text = "### AUTO-RUST START ###\nbody\n### AUTO-GO END ###\n";
        assert!(find_blocks(text).is_empty());
    }

    #[test]
    fn test_unterminated_start_is_user_text() {
        let text = format!("### AUTO-GO START ###\nexport GOPATH=x\n{RUST}");
        let blocks = find_blocks(&text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].marker, "AUTO-RUST");
    }

    #[test]
    fn test_inner_markers_belong_to_outer_block() {
        let text = "### A START ###\n### B START ###\nx\n### B END ###\n### A END ###\n";
        let blocks = find_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].marker, "A");
        assert_eq!(blocks[0].range, 0..text.len());
    }

    #[test]
    fn test_disabled_block_is_not_active() {
        let text = "### DISABLED-AUTO-GO START ###\nx\n### AUTO-GO END ###\n";
        assert!(find_blocks(text).is_empty());
    }

    #[test]
    fn test_insert_block_into_empty_text() {
        let out = insert_block("", "AUTO-GO", "export GOPATH=x", Position::Append).unwrap();
        assert_eq!(out, "### AUTO-GO START ###\nexport GOPATH=x\n### AUTO-GO END ###\n");
    }

    #[test]
    fn test_insert_block_append_and_prepend_separators() {
        let appended = insert_block("user", "X", "body", Position::Append).unwrap();
        assert_eq!(appended, "user\n\n### X START ###\nbody\n### X END ###\n");

        let prepended = insert_block("user\n", "X", "body\n", Position::Prepend).unwrap();
        assert_eq!(prepended, "### X START ###\nbody\n### X END ###\n\nuser\n");
    }

    #[test]
    fn test_insert_block_is_noop_when_present() {
        let once = insert_block("user\n", "AUTO-RUST", "x", Position::Append).unwrap();
        assert!(insert_block(&once, "AUTO-RUST", "different body", Position::Append).is_none());
    }

    #[test]
    fn test_ensure_block_persists_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".zshrc");
        let mut doc = ConfigDocument::load(&path).unwrap();

        assert!(ensure_block(&mut doc, "AUTO-GO", "export GOPATH=x", Position::Append).unwrap());
        let first = std::fs::read_to_string(&path).unwrap();
        assert!(!ensure_block(&mut doc, "AUTO-GO", "export GOPATH=x", Position::Append).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn test_ensure_line_checks_substring() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".zshrc");
        std::fs::write(&path, "setopt autocd\n").unwrap();
        let mut doc = ConfigDocument::load(&path).unwrap();

        assert!(!ensure_line(&mut doc, "setopt autocd", Position::Append).unwrap());
        assert!(ensure_line(&mut doc, "export EDITOR=vim", Position::Append).unwrap());
        assert!(!ensure_line(&mut doc, "export EDITOR=vim", Position::Append).unwrap());
        assert_eq!(doc.content(), "setopt autocd\n\nexport EDITOR=vim\n");
    }

    #[test]
    fn test_ensure_line_prepends_without_blank_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".zshrc");
        std::fs::write(&path, "setopt autocd\n").unwrap();
        let mut doc = ConfigDocument::load(&path).unwrap();

        assert!(ensure_line(&mut doc, "export LANG=en_US.UTF-8", Position::Prepend).unwrap());
        assert_eq!(doc.content(), "export LANG=en_US.UTF-8\nsetopt autocd\n");
        assert!(!ensure_line(&mut doc, "export LANG=en_US.UTF-8", Position::Prepend).unwrap());
    }

    #[test]
    fn test_disable_rewrites_start_lines_only() {
        let text = format!("keep\n{RUST}### HOMEBREW-PATH START ###\neval x\n### HOMEBREW-PATH END ###\n### CUSTOM START ###\n### CUSTOM END ###\n");
        let (out, count) = disable_blocks(&text, crate::types::DISABLE_PREFIXES);

        assert_eq!(count, 2);
        assert!(out.contains("### DISABLED-AUTO-RUST START ###\n"));
        assert!(out.contains("### AUTO-RUST END ###\n"));
        assert!(out.contains("### DISABLED-HOMEBREW-PATH START ###\n"));
        assert!(out.contains("### CUSTOM START ###\n"));
        assert!(find_blocks(&out).iter().all(|b| b.marker == "CUSTOM"));
    }

    #[test]
    fn test_disable_is_idempotent() {
        let (once, _) = disable_blocks(RUST, &["AUTO-"]);
        let (twice, count) = disable_blocks(&once, &["AUTO-"]);
        assert_eq!(once, twice);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_strip_undoes_append() {
        let user = "export EDITOR=vim\n";
        let with_block = insert_block(user, "AUTO-RUST", "x", Position::Append).unwrap();
        let (out, removed) = strip_blocks(&with_block);
        assert_eq!(out, user);
        assert_eq!(removed.len(), 1);
    }

    #[test]
    fn test_strip_undoes_prepend() {
        let user = "export EDITOR=vim\n";
        let with_block = insert_block(user, "HOMEBREW-PATH", "eval x", Position::Prepend).unwrap();
        let (out, _) = strip_blocks(&with_block);
        assert_eq!(out, user);
    }

    #[test]
    fn test_strip_removes_disabled_blocks() {
        let text = format!("a\n\n{RUST}b\n");
        let (disabled, _) = disable_blocks(&text, &["AUTO-"]);
        let (out, removed) = strip_blocks(&disabled);
        assert_eq!(out, "a\nb\n");
        assert!(removed[0].disabled);
    }

    #[test]
    fn test_strip_leaves_unterminated_marker() {
        let text = "### AUTO-GO START ###\nexport GOPATH=x\n";
        let (out, removed) = strip_blocks(text);
        assert_eq!(out, text);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_without_blocks_is_verbatim() {
        let text = format!("a\n{RUST}b\n");
        let blocks = find_blocks(&text);
        assert_eq!(without_blocks(&text, &blocks), "a\nb\n");
    }

    #[test]
    fn test_block_span_containment() {
        let span = BlockSpan {
            marker: "X".into(),
            range: 10..20,
            disabled: false,
        };
        assert!(span.contains(&(12..15)));
        assert!(!span.contains(&(5..15)));
        assert!(span.overlaps(&(5..15)));
        assert!(!span.overlaps(&(20..25)));
        assert!(!span.overlaps(&(0..10)));
    }
}
