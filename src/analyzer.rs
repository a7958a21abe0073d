//! Read-only inspection of a shell config.
//!
//! Detection runs on the *remainder*: the text with every generated block
//! deleted. A previous run's own bootstrap lines, plugin list or theme
//! therefore never count as pre-existing user configuration.

use crate::markers::{self, BlockSpan};
use crate::rewriter::{self, AssignmentKind};

/// Lines that show Oh-My-Zsh is already wired up by the user
pub const BOOTSTRAP_SIGNATURES: &[&str] = &["export ZSH=", "source $ZSH/oh-my-zsh.sh"];

#[derive(Debug, Clone)]
pub struct ShellConfigAnalyzer {
    blocks: Vec<BlockSpan>,
    remainder: String,
}

impl ShellConfigAnalyzer {
    pub fn new(text: &str) -> Self {
        let blocks = markers::find_blocks(text);
        let remainder = markers::without_blocks(text, &blocks);
        Self { blocks, remainder }
    }

    /// Generated blocks of the analyzed text, in document order
    pub fn blocks(&self) -> &[BlockSpan] {
        &self.blocks
    }

    /// The user-authored part of the text
    pub fn remainder(&self) -> &str {
        &self.remainder
    }

    /// True if a user-authored line starts with a bootstrap signature.
    pub fn has_bootstrap(&self) -> bool {
        self.remainder
            .lines()
            .any(|line| BOOTSTRAP_SIGNATURES.iter().any(|sig| line.starts_with(sig)))
    }

    /// The user's plugin list, or empty if there is none.
    pub fn existing_plugins(&self) -> Vec<String> {
        rewriter::scan(&self.remainder, AssignmentKind::Plugins)
            .first()
            .map(|m| rewriter::split_plugins(m.value(&self.remainder)))
            .unwrap_or_default()
    }

    /// The user's theme; `Some("")` means an explicitly empty theme.
    pub fn theme_setting(&self) -> Option<String> {
        rewriter::scan(&self.remainder, AssignmentKind::Theme)
            .first()
            .map(|m| m.value(&self.remainder).to_string())
    }

    /// The user's theme, or an empty string if unset.
    pub fn existing_theme(&self) -> String {
        self.theme_setting().unwrap_or_default()
    }
}
