//! Operator confirmation points.
//!
//! Each prompt is a value; deciding it is the job of a [`Prompter`]. The
//! terminal implementation falls back to the prompt's unattended default
//! when stdin is closed or not a terminal, so a run without an operator
//! never blocks.

use std::fmt;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Proceed with a setup run
    ConfirmSetup,
    /// Replace a user theme with Starship
    SwitchToStarship { current_theme: String },
    /// Restore the pre-setup `.zshrc` snapshot after stripping blocks
    RestoreOriginal { backup: PathBuf },
    /// Go ahead with a destructive full rollback
    ConfirmFullRollback,
    UninstallHomebrew,
}

impl Prompt {
    pub fn question(&self) -> String {
        match self {
            Self::ConfirmSetup => "Continue?".to_string(),
            Self::SwitchToStarship { current_theme } => format!(
                "Current theme is {current_theme:?}. Switch to the Starship prompt?"
            ),
            Self::RestoreOriginal { backup } => {
                format!("Restore the original .zshrc from {}?", backup.display())
            }
            Self::ConfirmFullRollback => {
                "This removes installed packages and environment directories. Continue?"
                    .to_string()
            }
            Self::UninstallHomebrew => "Uninstall Homebrew as well?".to_string(),
        }
    }

    /// Answer for an empty line
    pub const fn default_on_enter(&self) -> bool {
        matches!(self, Self::SwitchToStarship { .. })
    }

    /// Answer when nobody is there to ask
    pub const fn unattended_default(&self) -> bool {
        matches!(self, Self::ConfirmSetup | Self::SwitchToStarship { .. })
    }

    fn hint(&self) -> &'static str {
        if self.default_on_enter() { "[Y/n]" } else { "[y/N]" }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.question(), self.hint())
    }
}

/// Decides confirmation prompts
pub trait Prompter {
    fn ask(&self, prompt: &Prompt) -> bool;
}

/// Resolves every prompt to its unattended default
#[derive(Debug, Clone, Copy, Default)]
pub struct Unattended;

impl Prompter for Unattended {
    fn ask(&self, prompt: &Prompt) -> bool {
        let answer = prompt.unattended_default();
        info!("{} -> {} (non-interactive)", prompt.question(), yes_no(answer));
        answer
    }
}

/// Asks on stderr and reads one line from stdin
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&self, prompt: &Prompt) -> bool {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Unattended.ask(prompt);
        }

        eprint!("{prompt}: ");
        let _ = io::stderr().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => Unattended.ask(prompt),
            Ok(_) => parse_answer(&line, prompt.default_on_enter()),
        }
    }
}

/// Interpret a typed answer. Anything that is not an explicit opposite of
/// the default keeps the default.
pub fn parse_answer(input: &str, default: bool) -> bool {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}

fn yes_no(answer: bool) -> &'static str {
    if answer { "yes" } else { "no" }
}
