//! Type-safe vocabularies for mac-setup
//!
//! Marker names, rollback modes and language selections are enums rather
//! than strings so a typo is a compile error instead of a duplicate block.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum::{Display, EnumIter, EnumString};

/// Marker names this tool writes into `.zshrc`.
///
/// The marker engine accepts any name; this is the vocabulary the setup
/// steps actually use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum Marker {
    #[strum(serialize = "HOMEBREW-PATH")]
    HomebrewPath,
    #[strum(serialize = "MISE-ACTIVATE")]
    MiseActivate,
    #[strum(serialize = "AUTO-RUST")]
    Rust,
    #[strum(serialize = "AUTO-GO")]
    Go,
    #[strum(serialize = "AUTO-SETUP-CORE")]
    SetupCore,
    #[strum(serialize = "AUTO-ZOXIDE")]
    Zoxide,
    #[strum(serialize = "AUTO-ALIASES")]
    Aliases,
}

impl Marker {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HomebrewPath => "HOMEBREW-PATH",
            Self::MiseActivate => "MISE-ACTIVATE",
            Self::Rust => "AUTO-RUST",
            Self::Go => "AUTO-GO",
            Self::SetupCore => "AUTO-SETUP-CORE",
            Self::Zoxide => "AUTO-ZOXIDE",
            Self::Aliases => "AUTO-ALIASES",
        }
    }
}

/// Start-marker prefixes rewritten by a soft rollback.
pub const DISABLE_PREFIXES: &[&str] = &["AUTO-", "HOMEBREW-PATH", "MISE-ACTIVATE"];

/// Where a new generated block goes relative to existing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Append,
    Prepend,
}

/// Rollback level, in increasing order of destructiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[derive(clap::ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum RollbackMode {
    /// Disable generated blocks in place (nothing is deleted)
    #[value(alias = "disable")]
    Soft,
    /// Remove generated blocks, optionally restore the original file, delete env dirs
    #[value(alias = "restore")]
    Env,
    /// Everything `env` does plus uninstalling the packages setup installed
    #[value(alias = "purge")]
    Full,
}

/// Languages the setup can provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Language {
    Python,
    Node,
    Java,
    Rust,
    Go,
}

impl Language {
    /// Python, Node and Java are managed by Mise; Rust and Go have their own tooling.
    pub const fn is_mise_managed(self) -> bool {
        matches!(self, Self::Python | Self::Node | Self::Java)
    }
}

/// Mac CPU family, which decides where Homebrew lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CpuArch {
    #[strum(serialize = "Apple Silicon")]
    AppleSilicon,
    #[strum(serialize = "Intel")]
    Intel,
}

impl CpuArch {
    pub fn from_arch(arch: &str) -> Self {
        if arch == "aarch64" || arch == "arm64" {
            Self::AppleSilicon
        } else {
            Self::Intel
        }
    }

    /// Homebrew install prefix for this architecture
    pub fn brew_prefix(self) -> &'static Path {
        match self {
            Self::AppleSilicon => Path::new("/opt/homebrew"),
            Self::Intel => Path::new("/usr/local"),
        }
    }

    pub fn brew_binary(self) -> PathBuf {
        self.brew_prefix().join("bin").join("brew")
    }
}
