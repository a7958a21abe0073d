//! Final `.zshrc` configuration.
//!
//! If the user already bootstraps Oh-My-Zsh, their plugin list is merged
//! with ours and rewritten in place, and the theme is cleared when Starship
//! takes over. Otherwise a complete `AUTO-SETUP-CORE` block is appended.
//! Either way the zoxide and alias blocks are ensured last.

use crate::analyzer::ShellConfigAnalyzer;
use crate::document::ConfigDocument;
use crate::error::Result;
use crate::markers;
use crate::plugins;
use crate::prompt::{Prompt, Prompter};
use crate::rewriter::{self, Assignment};
use crate::types::{Marker, Position};
use std::fmt;
use tracing::info;

pub const STARSHIP_INIT: &str = "if command -v starship > /dev/null 2>&1; then
  eval \"$(starship init zsh)\"
fi";

pub const ZOXIDE_INIT: &str = "if command -v zoxide >/dev/null 2>&1; then
  eval \"$(zoxide init zsh)\"
fi";

pub const ALIASES: &str = "# Modern CLI replacements, only when installed
command -v bat >/dev/null && alias cat='bat --paging=never'
command -v fd >/dev/null && alias find='fd'
command -v rg >/dev/null && alias grep='rg'
command -v htop >/dev/null && alias top='htop'
command -v eza >/dev/null && alias ls='eza' && alias ll='eza -lah'";

/// Body of the `AUTO-SETUP-CORE` block for a config without Oh-My-Zsh
pub fn core_config(plugins: &[String]) -> String {
    format!(
        "export ZSH=\"$HOME/.oh-my-zsh\"\n{}\n{}\nsource $ZSH/oh-my-zsh.sh\n\n{STARSHIP_INIT}",
        Assignment::Theme(String::new()).render(),
        Assignment::Plugins(plugins.to_vec()).render(),
    )
}

/// Inputs for the Starship decision
#[derive(Debug, Clone, Copy, Default)]
pub struct StarshipChoice {
    /// `--no-starship`: always keep the user's theme
    pub force_off: bool,
    /// `--yes`: switch without asking
    pub assume_yes: bool,
}

impl StarshipChoice {
    /// Whether Starship replaces `current_theme`
    pub fn decide(self, current_theme: &str, prompter: &dyn Prompter) -> bool {
        if self.force_off {
            info!("--no-starship given, keeping the current theme");
            false
        } else if self.assume_yes || current_theme.is_empty() {
            true
        } else {
            prompter.ask(&Prompt::SwitchToStarship {
                current_theme: current_theme.to_string(),
            })
        }
    }
}

/// What [`configure_zsh`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZshReport {
    /// A user Oh-My-Zsh bootstrap was found and merged into
    pub merged: bool,
    pub plugins: Vec<String>,
    pub starship: bool,
    /// Generated blocks added by this call
    pub inserted: Vec<Marker>,
}

impl fmt::Display for ZshReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let how = if self.merged { "merged into existing Oh-My-Zsh config" } else { "full config block" };
        write!(
            f,
            "{how}, plugins: {}, starship: {}",
            self.plugins.join(" "),
            if self.starship { "on" } else { "off" }
        )
    }
}

/// Negotiate the final shell configuration. The caller takes the backup.
pub fn configure_zsh(
    doc: &mut ConfigDocument,
    default_plugins: &[String],
    choice: StarshipChoice,
    prompter: &dyn Prompter,
) -> Result<ZshReport> {
    let analyzer = ShellConfigAnalyzer::new(doc.content());
    let mut report = ZshReport::default();

    if analyzer.has_bootstrap() {
        info!("Existing Oh-My-Zsh configuration found, merging");
        let existing = analyzer.existing_plugins();
        let theme = analyzer.existing_theme();
        info!(
            "  existing plugins: {}",
            if existing.is_empty() { "none".to_string() } else { existing.join(" ") }
        );
        info!("  existing theme: {}", if theme.is_empty() { "none" } else { &theme });

        report.merged = true;
        report.plugins = plugins::merge(&existing, default_plugins);
        report.starship = choice.decide(&theme, prompter);
        info!("  merged plugins: {}", report.plugins.join(" "));

        // offsets shift after each rewrite, so blocks are located afresh
        let blocks = markers::find_blocks(doc.content());
        let plugin_list = Assignment::Plugins(report.plugins.clone());
        if !rewriter::rewrite(doc, &blocks, &plugin_list)? {
            info!("  no plugin list found, adding one above the Oh-My-Zsh source line");
            rewriter::insert(doc, &blocks, &plugin_list)?;
        }

        if report.starship {
            let blocks = markers::find_blocks(doc.content());
            rewriter::rewrite(doc, &blocks, &Assignment::Theme(String::new()))?;
            if markers::ensure_block(doc, Marker::SetupCore.as_str(), STARSHIP_INIT, Position::Append)? {
                report.inserted.push(Marker::SetupCore);
            }
        }
    } else {
        info!("No Oh-My-Zsh configuration found, adding the full config block");
        report.plugins = default_plugins.to_vec();
        report.starship = true;
        let body = core_config(default_plugins);
        if markers::ensure_block(doc, Marker::SetupCore.as_str(), &body, Position::Append)? {
            report.inserted.push(Marker::SetupCore);
        }
    }

    for (marker, body) in [(Marker::Zoxide, ZOXIDE_INIT), (Marker::Aliases, ALIASES)] {
        if markers::ensure_block(doc, marker.as_str(), body, Position::Append)? {
            report.inserted.push(marker);
        }
    }

    Ok(report)
}
