//! Locating and rewriting the two assignments the setup manages:
//! `plugins=( ... )` and `ZSH_THEME="..."`.
//!
//! The plugin list may span several lines (everything up to the first
//! `)`); the theme is single-line only. Both must start a line, optionally
//! indented with spaces or tabs.

use crate::document::ConfigDocument;
use crate::error::Result;
use crate::markers::BlockSpan;
use std::ops::Range;
use tracing::debug;

pub const PLUGINS_VAR: &str = "plugins";
pub const THEME_VAR: &str = "ZSH_THEME";
/// Loads Oh-My-Zsh; settings only take effect above this line
pub const SOURCE_LINE: &str = "source $ZSH/oh-my-zsh.sh";

/// Which assignment to look for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    Plugins,
    Theme,
}

/// A rendered replacement value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Plugins(Vec<String>),
    Theme(String),
}

impl Assignment {
    pub fn kind(&self) -> AssignmentKind {
        match self {
            Self::Plugins(_) => AssignmentKind::Plugins,
            Self::Theme(_) => AssignmentKind::Theme,
        }
    }

    /// Source text without indentation
    pub fn render(&self) -> String {
        match self {
            Self::Plugins(plugins) => format!("{PLUGINS_VAR}=({})", plugins.join(" ")),
            Self::Theme(theme) => format!("{THEME_VAR}=\"{theme}\""),
        }
    }
}

/// One occurrence of an assignment in a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentMatch {
    /// From the start of the line to the closing `)` or `"`, inclusive
    pub range: Range<usize>,
    /// Leading whitespace of the line
    pub indent: Range<usize>,
    /// Raw text between the delimiters
    pub value: Range<usize>,
}

impl AssignmentMatch {
    pub fn value<'a>(&self, text: &'a str) -> &'a str {
        &text[self.value.clone()]
    }
}

/// Every occurrence of `kind` in `text`, in document order.
pub fn scan(text: &str, kind: AssignmentKind) -> Vec<AssignmentMatch> {
    let mut matches = Vec::new();
    let mut line_start = 0;

    for raw in text.split_inclusive('\n') {
        let start = line_start;
        line_start += raw.len();

        let body = raw.trim_start_matches([' ', '\t']);
        let indent = start..start + (raw.len() - body.len());

        let found = match kind {
            AssignmentKind::Plugins => body.strip_prefix("plugins=(").and_then(|_| {
                let open = indent.end + "plugins=(".len();
                let close = open + text[open..].find(')')?;
                Some((open, close))
            }),
            AssignmentKind::Theme => body.strip_prefix("ZSH_THEME=\"").and_then(|rest| {
                let open = indent.end + "ZSH_THEME=\"".len();
                let len = rest.trim_end_matches(['\n', '\r']).find('"')?;
                Some((open, open + len))
            }),
        };

        if let Some((open, close)) = found {
            matches.push(AssignmentMatch {
                range: start..close + 1,
                indent: indent.clone(),
                value: open..close,
            });
        }
    }

    matches
}

/// Parse a plugin list body into whitespace-separated names.
pub fn split_plugins(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Rewrite the first occurrence that lies outside every block.
///
/// Returns `None` when no occurrence qualifies; the caller then decides
/// whether to emit a fresh block instead.
pub fn rewrite_text(text: &str, blocks: &[BlockSpan], assignment: &Assignment) -> Option<String> {
    let target = scan(text, assignment.kind())
        .into_iter()
        .find(|m| !blocks.iter().any(|b| b.overlaps(&m.range)))?;

    let mut out = String::with_capacity(text.len() + 16);
    out.push_str(&text[..target.range.start]);
    out.push_str(&text[target.indent.clone()]);
    out.push_str(&assignment.render());
    out.push_str(&text[target.range.end..]);
    Some(out)
}

/// Add `assignment` as a new line directly above the first user-owned
/// Oh-My-Zsh source line, with that line's indentation. Without a source
/// line the assignment is appended.
pub fn insert_text(text: &str, blocks: &[BlockSpan], assignment: &Assignment) -> String {
    let mut line_start = 0;
    for raw in text.split_inclusive('\n') {
        let line = line_start..line_start + raw.len();
        line_start = line.end;

        let body = raw.trim_start_matches([' ', '\t']);
        if body.starts_with(SOURCE_LINE) && !blocks.iter().any(|b| b.overlaps(&line)) {
            let indent = &raw[..raw.len() - body.len()];
            return format!(
                "{}{indent}{}\n{}",
                &text[..line.start],
                assignment.render(),
                &text[line.start..]
            );
        }
    }

    let sep = if text.is_empty() || text.ends_with('\n') { "" } else { "\n" };
    format!("{text}{sep}{}\n", assignment.render())
}

/// Insert a fresh assignment and persist the document; see [`insert_text`].
pub fn insert(doc: &mut ConfigDocument, blocks: &[BlockSpan], assignment: &Assignment) -> Result<()> {
    let updated = insert_text(doc.content(), blocks, assignment);
    doc.save(updated)?;
    debug!("Added {:?} assignment to {:?}", assignment.kind(), doc.path());
    Ok(())
}

/// Rewrite the first user-owned occurrence of the assignment in place and
/// persist the document. `blocks` must describe the document's current text.
///
/// Returns false (and leaves the file alone) if there is nothing to rewrite.
pub fn rewrite(
    doc: &mut ConfigDocument,
    blocks: &[BlockSpan],
    assignment: &Assignment,
) -> Result<bool> {
    match rewrite_text(doc.content(), blocks, assignment) {
        Some(updated) => {
            doc.save(updated)?;
            debug!("Rewrote {:?} assignment in {:?}", assignment.kind(), doc.path());
            Ok(true)
        }
        None => Ok(false),
    }
}
