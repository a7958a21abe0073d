//! Configuration for a setup or rollback run.
//!
//! Every path the tool touches hangs off [`Paths`], and every tool list off
//! [`SetupConfig`]. Both are passed explicitly to the components that need
//! them, so tests can point a whole run at a temporary home directory.

use crate::error::{Result, SetupError};
use crate::types::Language;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Name of the backup directory under `$HOME`
pub const BACKUP_DIR_NAME: &str = ".mac-setup-backup";

/// Filesystem locations used by a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub home: PathBuf,
    /// The managed shell startup file
    pub zshrc: PathBuf,
    pub backup_dir: PathBuf,
    /// Package manifest (`brew-packages.txt`)
    pub packages_file: PathBuf,
    /// Per-run log file; `None` disables file logging
    pub log_file: Option<PathBuf>,
}

impl Paths {
    /// Derive every path from a home directory
    pub fn for_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let backup_dir = home.join(BACKUP_DIR_NAME);
        Self {
            zshrc: home.join(".zshrc"),
            packages_file: PathBuf::from("brew-packages.txt"),
            log_file: None,
            backup_dir,
            home,
        }
    }

    /// Paths for the current user
    pub fn from_env() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| SetupError::config("could not determine the home directory"))?;
        Ok(Self::for_home(home))
    }

    /// Enable the per-run log file `setup-<timestamp>.log` in the backup directory
    pub fn with_run_log(mut self, prefix: &str) -> Self {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
        self.log_file = Some(self.backup_dir.join(format!("{prefix}-{stamp}.log")));
        self
    }

    pub fn with_packages_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.packages_file = path.into();
        self
    }
}

/// A plugin cloned into `~/.oh-my-zsh/custom/plugins`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomPlugin {
    pub name: String,
    pub url: String,
}

/// Tool selections and versions. Every field falls back to its default
/// when omitted from a JSON config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// Versions installed through `mise use --global`
    pub mise_versions: BTreeMap<Language, String>,
    /// Build dependencies installed before the Brewfile bundle
    pub base_packages: Vec<String>,
    /// Used when the packages file is missing
    pub default_formulae: Vec<String>,
    pub default_casks: Vec<String>,
    /// Plugins merged into the Oh-My-Zsh plugin list
    pub omz_plugins: Vec<String>,
    pub custom_plugins: Vec<CustomPlugin>,
    /// Directories (relative to home) deleted by `env` and `full` rollbacks
    pub env_dirs: Vec<PathBuf>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for SetupConfig {
    fn default() -> Self {
        let mise_versions = BTreeMap::from([
            (Language::Python, "3.12".to_string()),
            (Language::Node, "22".to_string()),
            (Language::Java, "temurin-21".to_string()),
        ]);

        Self {
            mise_versions,
            base_packages: strings(&[
                "git", "curl", "wget", "openssl@3", "readline", "sqlite3", "xz", "zlib",
                "tcl-tk", "go", "rustup",
            ]),
            default_formulae: strings(&[
                "git", "wget", "ripgrep", "fd", "fzf", "jq", "bat", "htop", "zoxide", "cmake",
                "pkg-config", "starship",
            ]),
            default_casks: strings(&[
                "keka",
                "iina",
                "appcleaner",
                "warp",
                "raycast",
                "openinterminal",
                "popclip",
                "google-chrome",
                "betterdisplay",
                "visual-studio-code",
                "zed",
                "iterm2",
                "switchhosts",
                "jordanbaird-ice",
                "battery-toolkit",
                "font-maple-mono-nf-cn",
            ]),
            omz_plugins: strings(&[
                "git",
                "sudo",
                "extract",
                "fzf",
                "colored-man-pages",
                "zsh-syntax-highlighting",
                "zsh-autosuggestions",
            ]),
            custom_plugins: vec![
                CustomPlugin {
                    name: "zsh-syntax-highlighting".to_string(),
                    url: "https://github.com/zsh-users/zsh-syntax-highlighting.git".to_string(),
                },
                CustomPlugin {
                    name: "zsh-autosuggestions".to_string(),
                    url: "https://github.com/zsh-users/zsh-autosuggestions.git".to_string(),
                },
            ],
            env_dirs: vec![
                PathBuf::from(".oh-my-zsh"),
                PathBuf::from(".cargo"),
                PathBuf::from("go"),
                PathBuf::from(".local/share/mise"),
                PathBuf::from(".config/mise"),
            ],
        }
    }
}

impl SetupConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SetupError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reject values that would corrupt the generated shell code
    pub fn validate(&self) -> Result<()> {
        for (lang, version) in &self.mise_versions {
            if !lang.is_mise_managed() {
                return Err(SetupError::config(format!("{lang} is not managed by mise")));
            }
            if version.trim().is_empty() || version.contains(char::is_whitespace) {
                return Err(SetupError::config(format!("invalid {lang} version {version:?}")));
            }
        }

        let bad_plugin = self
            .omz_plugins
            .iter()
            .chain(self.custom_plugins.iter().map(|p| &p.name))
            .find(|p| p.is_empty() || p.contains(|c: char| c.is_whitespace() || c == ')'));
        if let Some(plugin) = bad_plugin {
            return Err(SetupError::config(format!("invalid plugin name {plugin:?}")));
        }

        if let Some(dir) = self.env_dirs.iter().find(|d| !is_below_home(d)) {
            return Err(SetupError::config(format!(
                "environment directory {:?} must be a plain path inside the home directory",
                dir
            )));
        }

        Ok(())
    }

    /// Environment directories resolved against `home`. Entries that could
    /// name `home` itself or leave it are dropped.
    pub fn env_dirs_in(&self, home: &Path) -> Vec<PathBuf> {
        self.env_dirs
            .iter()
            .filter(|d| is_below_home(d))
            .map(|d| home.join(d))
            .collect()
    }

    /// `lang@version` specs for `mise use`, minus skipped languages
    pub fn mise_tools(&self, skip: &BTreeSet<Language>) -> Vec<String> {
        self.mise_versions
            .iter()
            .filter(|(lang, _)| !skip.contains(lang))
            .map(|(lang, version)| format!("{lang}@{version}"))
            .collect()
    }
}

/// Non-empty and made only of normal components: no root, `.` or `..`
fn is_below_home(dir: &Path) -> bool {
    dir.components().next().is_some()
        && dir.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Choices made on the command line for a setup run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Stop after the confirmation step; external commands are only logged
    pub dry_run: bool,
    /// Skip the confirmation prompt and accept Starship
    pub assume_yes: bool,
    /// Keep the existing theme and never add the Starship block
    pub no_starship: bool,
    pub skip_langs: BTreeSet<Language>,
}

impl RunOptions {
    /// Parse a comma-separated `--skip-langs` value; unknown names are an error
    pub fn parse_skip_langs(raw: &str) -> Result<BTreeSet<Language>> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<Language>()
                    .map_err(|_| SetupError::config(format!("unknown language {s:?}")))
            })
            .collect()
    }

    pub fn skips(&self, lang: Language) -> bool {
        self.skip_langs.contains(&lang)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_for_home() {
        let paths = Paths::for_home("/Users/dev");
        assert_eq!(paths.zshrc, PathBuf::from("/Users/dev/.zshrc"));
        assert_eq!(paths.backup_dir, PathBuf::from("/Users/dev/.mac-setup-backup"));
        assert!(paths.log_file.is_none());
    }

    #[test]
    fn test_run_log_lives_in_backup_dir() {
        let paths = Paths::for_home("/Users/dev").with_run_log("setup");
        let log = paths.log_file.unwrap();
        assert!(log.starts_with("/Users/dev/.mac-setup-backup"));
        let name = log.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("setup-") && name.ends_with(".log"));
    }

    #[test]
    fn test_default_config_is_valid() {
        SetupConfig::default().validate().unwrap();
    }

    #[test]
    fn test_mise_tools_respects_skip() {
        let config = SetupConfig::default();
        let skip = BTreeSet::from([Language::Node]);
        assert_eq!(
            config.mise_tools(&skip),
            vec!["python@3.12".to_string(), "java@temurin-21".to_string()]
        );
    }

    #[test]
    fn test_parse_skip_langs() {
        let langs = RunOptions::parse_skip_langs(" python, Rust ,,go").unwrap();
        assert_eq!(
            langs,
            BTreeSet::from([Language::Python, Language::Rust, Language::Go])
        );
        assert!(RunOptions::parse_skip_langs("python,perl").is_err());
        assert!(RunOptions::parse_skip_langs("").unwrap().is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_plugin() {
        let mut config = SetupConfig::default();
        config.omz_plugins.push("two words".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_absolute_env_dir() {
        let mut config = SetupConfig::default();
        config.env_dirs.push(PathBuf::from("/usr"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_env_dirs_naming_home() {
        for dir in ["", ".", "..", "../other", ".cargo/../..", "./go"] {
            let mut config = SetupConfig::default();
            config.env_dirs.push(PathBuf::from(dir));
            assert!(config.validate().is_err(), "{dir:?} should be rejected");
        }
    }

    #[test]
    fn test_env_dirs_in_never_yields_home_or_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "env_dirs": ["", ".."] }"#).unwrap();
        assert!(SetupConfig::load_from_file(&path).is_err());

        let config = SetupConfig {
            env_dirs: vec![PathBuf::new(), PathBuf::from(".."), PathBuf::from("go")],
            ..SetupConfig::default()
        };
        let home = Path::new("/Users/dev");
        assert_eq!(config.env_dirs_in(home), vec![home.join("go")]);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "omz_plugins": ["git", "docker"] }"#).unwrap();

        let config = SetupConfig::load_from_file(&path).unwrap();
        assert_eq!(config.omz_plugins, vec!["git", "docker"]);
        assert_eq!(config.default_casks, SetupConfig::default().default_casks);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = SetupConfig::default();
        config.save_to_file(&path).unwrap();
        assert_eq!(SetupConfig::load_from_file(&path).unwrap(), config);
    }
}
