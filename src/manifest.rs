//! The packages file (`brew-packages.txt`).
//!
//! ```text
//! # ==== Formulae ====
//! git
//! ripgrep   # faster grep
//!
//! # ==== Casks ====
//! iterm2
//! ```
//!
//! Section headers are comment lines mentioning `Formulae` or `Casks`
//! (any case). Entries before the first header belong to no section and
//! are ignored.

use crate::config::SetupConfig;
use crate::error::Result;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packages {
    pub formulae: Vec<String>,
    pub casks: Vec<String>,
}

#[derive(Clone, Copy)]
enum Section {
    Formulae,
    Casks,
}

impl Packages {
    pub fn is_empty(&self) -> bool {
        self.formulae.is_empty() && self.casks.is_empty()
    }

    /// Brewfile text: `brew "x"` lines, then `cask "y"` lines
    pub fn to_brewfile(&self) -> String {
        let brews = self.formulae.iter().map(|f| format!("brew \"{f}\"\n"));
        let casks = self.casks.iter().map(|c| format!("cask \"{c}\"\n"));
        brews.chain(casks).collect()
    }
}

pub fn parse_packages(text: &str) -> Packages {
    let mut packages = Packages::default();
    let mut section = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with('#') {
            let lower = line.to_lowercase();
            if lower.contains("formulae") {
                section = Some(Section::Formulae);
            } else if lower.contains("casks") {
                section = Some(Section::Casks);
            }
            continue;
        }

        let name = line.split('#').next().unwrap_or_default().trim();
        if name.is_empty() {
            continue;
        }

        match section {
            Some(Section::Formulae) => packages.formulae.push(name.to_string()),
            Some(Section::Casks) => packages.casks.push(name.to_string()),
            None => {}
        }
    }

    packages
}

/// Read the packages file, falling back to the configured defaults when it
/// does not exist.
pub fn load_packages(path: &Path, config: &SetupConfig) -> Result<Packages> {
    if !path.exists() {
        warn!("{} not found, using the default package list", path.display());
        return Ok(Packages {
            formulae: config.default_formulae.clone(),
            casks: config.default_casks.clone(),
        });
    }

    let packages = parse_packages(&fs::read_to_string(path)?);
    info!(
        "Read {} formulae and {} casks from {}",
        packages.formulae.len(),
        packages.casks.len(),
        path.display()
    );
    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Development packages
orphan

# ==== Formulae ====
git
ripgrep   # faster grep
# jq

# ==== CASKS ====
iterm2
  zed
";

    #[test]
    fn test_parse_sections() {
        let packages = parse_packages(SAMPLE);
        assert_eq!(packages.formulae, vec!["git", "ripgrep"]);
        assert_eq!(packages.casks, vec!["iterm2", "zed"]);
    }

    #[test]
    fn test_brewfile_rendering() {
        let packages = Packages {
            formulae: vec!["git".into()],
            casks: vec!["iterm2".into()],
        };
        assert_eq!(packages.to_brewfile(), "brew \"git\"\ncask \"iterm2\"\n");
        assert!(!packages.is_empty());
        assert!(Packages::default().is_empty());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SetupConfig::default();
        let packages = load_packages(&dir.path().join("brew-packages.txt"), &config).unwrap();
        assert_eq!(packages.formulae, config.default_formulae);
        assert_eq!(packages.casks, config.default_casks);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brew-packages.txt");
        fs::write(&path, SAMPLE).unwrap();
        let packages = load_packages(&path, &SetupConfig::default()).unwrap();
        assert_eq!(packages.formulae.len(), 2);
    }
}
