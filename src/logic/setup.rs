//! Forward configuration of a Mac.
//!
//! # Failure Policy
//!
//! Bulk steps (package bundles, updates, fzf bindings) are **non-fatal**: a
//! failure is logged with its diagnostic, recorded as a warning and the run
//! continues. Foundational steps that later steps depend on (installing
//! Homebrew, Mise and Oh-My-Zsh plugins, `mise use`) abort the run.
//! Every `.zshrc` write is persisted immediately, so an aborted run can be
//! re-run safely.

use crate::backup::{BackupManager, ORIGINAL_PREFIX};
use crate::config::{Paths, RunOptions, SetupConfig};
use crate::document::ConfigDocument;
use crate::error::{Result, SetupError};
use crate::logic::zsh::{self, StarshipChoice, ZshReport};
use crate::manifest;
use crate::markers;
use crate::prompt::{Prompt, Prompter};
use crate::runner::{CommandRunner, ToolOutput};
use crate::tools::{
    BrewBundle, BrewInstall, BrewPrefix, BrewUpdate, FzfInstall, GitClone, MiseUse,
    RemoteScript, RustupInit, RustupUpdate, ToolCommand,
};
use crate::types::{CpuArch, Language, Marker, Position};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// Generated block bodies
// ============================================================================

pub const MISE_ACTIVATE: &str = "eval \"$(mise activate zsh)\"";
pub const RUST_PATH: &str = "export PATH=\"$HOME/.cargo/bin:$PATH\"";
pub const GO_ENV: &str = "export GOPATH=\"$HOME/go\"\nexport PATH=\"$GOPATH/bin:$PATH\"";

/// `HOMEBREW-PATH` body for the given CPU family
pub fn homebrew_shellenv(arch: CpuArch) -> String {
    format!(
        "# Homebrew ({arch})\neval \"$({} shellenv)\"",
        arch.brew_binary().display()
    )
}

// ============================================================================
// Environment check
// ============================================================================

/// Refuse to run anywhere but macOS; report the CPU family.
pub fn check_environment() -> Result<CpuArch> {
    check_platform(std::env::consts::OS, std::env::consts::ARCH)
}

pub fn check_platform(os: &str, arch: &str) -> Result<CpuArch> {
    if os != "macos" {
        return Err(SetupError::UnsupportedPlatform(format!(
            "only macOS is supported (running on {os})"
        )));
    }
    let arch = CpuArch::from_arch(arch);
    info!("Detected {} CPU", arch);
    Ok(arch)
}

// ============================================================================
// Outcome
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// All steps ran; non-fatal failures are listed
    Completed { warnings: Vec<String> },
    /// The operator declined the confirmation prompt
    Cancelled,
    /// `--dry-run`: stopped after confirmation without changing anything
    DryRun,
}

impl fmt::Display for SetupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { warnings } if warnings.is_empty() => {
                write!(f, "All tasks completed")
            }
            Self::Completed { warnings } => {
                write!(f, "Completed with {} warning(s)", warnings.len())
            }
            Self::Cancelled => write!(f, "Cancelled by user"),
            Self::DryRun => write!(f, "Dry run: no changes made"),
        }
    }
}

// ============================================================================
// Setup run
// ============================================================================

pub struct Setup<'a> {
    paths: &'a Paths,
    config: &'a SetupConfig,
    options: &'a RunOptions,
    runner: &'a mut dyn CommandRunner,
    prompter: &'a dyn Prompter,
    arch: CpuArch,
    backups: BackupManager,
    /// Where Homebrew is expected; defaults to the architecture's prefix
    brew_prefix: PathBuf,
    original_saved: bool,
    warnings: Vec<String>,
}

impl<'a> Setup<'a> {
    pub fn new(
        paths: &'a Paths,
        config: &'a SetupConfig,
        options: &'a RunOptions,
        runner: &'a mut dyn CommandRunner,
        prompter: &'a dyn Prompter,
        arch: CpuArch,
    ) -> Self {
        Self {
            backups: BackupManager::new(&paths.backup_dir),
            brew_prefix: arch.brew_prefix().to_path_buf(),
            paths,
            config,
            options,
            runner,
            prompter,
            arch,
            original_saved: false,
            warnings: Vec::new(),
        }
    }

    /// Look for Homebrew under `prefix` instead of the standard location
    pub fn with_brew_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.brew_prefix = prefix.into();
        self
    }

    pub fn run(mut self) -> Result<SetupOutcome> {
        if self.options.assume_yes {
            info!("--yes given, skipping confirmation");
        } else {
            self.print_plan();
            if !self.prompter.ask(&Prompt::ConfirmSetup) {
                warn!("Cancelled by user");
                return Ok(SetupOutcome::Cancelled);
            }
        }

        if self.options.dry_run {
            warn!("Dry run: stopping before any change is made");
            return Ok(SetupOutcome::DryRun);
        }

        self.backup_original()?;
        self.install_homebrew()?;
        self.install_packages()?;
        self.install_oh_my_zsh()?;

        let mise_tools = self.config.mise_tools(&self.options.skip_langs);
        if mise_tools.is_empty() {
            warn!("All Mise managed languages skipped");
        } else {
            self.setup_mise(&mise_tools)?;
        }

        if self.options.skips(Language::Rust) {
            warn!("Skipping Rust (--skip-langs rust)");
        } else {
            self.setup_rust()?;
        }

        if self.options.skips(Language::Go) {
            warn!("Skipping Go (--skip-langs go)");
        } else {
            self.setup_go()?;
        }

        let report = self.configure_zsh()?;
        info!("Shell configured: {}", report);

        self.configure_fzf()?;

        info!("Backups saved to {}", self.paths.backup_dir.display());
        info!("Open a new terminal (or run `exec zsh`) to load the new environment");
        Ok(SetupOutcome::Completed {
            warnings: self.warnings,
        })
    }

    fn print_plan(&self) {
        let mut out = std::io::stderr().lock();
        let _ = writeln!(out, "This will:");
        let _ = writeln!(out, "  - install or update Homebrew");
        let _ = writeln!(out, "  - install the packages from {}", self.paths.packages_file.display());
        let _ = writeln!(out, "  - install and configure Oh-My-Zsh");
        for (lang, version) in &self.config.mise_versions {
            if !self.options.skips(*lang) {
                let _ = writeln!(out, "  - install {lang} {version} (Mise)");
            }
        }
        if !self.options.skips(Language::Go) {
            let _ = writeln!(out, "  - configure Go (Homebrew)");
        }
        if !self.options.skips(Language::Rust) {
            let _ = writeln!(out, "  - install Rust (rustup)");
        }
    }

    /// Snapshot `.zshrc` as `original-` once per run, before the first write.
    fn backup_original(&mut self) -> Result<()> {
        if !self.original_saved {
            self.backups.snapshot(&self.paths.zshrc, ORIGINAL_PREFIX)?;
            self.original_saved = true;
        }
        Ok(())
    }

    fn ensure_block(&mut self, marker: Marker, body: &str, position: Position) -> Result<bool> {
        self.backup_original()?;
        let mut doc = ConfigDocument::load(&self.paths.zshrc)?;
        markers::ensure_block(&mut doc, marker.as_str(), body, position)
    }

    /// Run a foundational command; failure aborts the run.
    fn run_fatal(&mut self, cmd: &dyn ToolCommand, context: &str) -> Result<ToolOutput> {
        let output = self.runner.run(cmd)?;
        output.ensure_success(context)?;
        Ok(output)
    }

    /// Run a bulk command; failure becomes a warning.
    fn run_lenient(&mut self, cmd: &dyn ToolCommand, context: &str) -> Option<ToolOutput> {
        match self.runner.run(cmd).and_then(|out| out.ensure_success(context).map(|_| out)) {
            Ok(out) => Some(out),
            Err(e) => {
                warn!("{} (continuing)", e);
                self.warnings.push(e.to_string());
                None
            }
        }
    }

    // ------------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------------

    pub fn install_homebrew(&mut self) -> Result<()> {
        info!("Checking Homebrew...");
        if self.runner.which("brew").is_some() {
            info!("Homebrew already installed");
            self.run_lenient(&BrewUpdate, "brew update");
        } else {
            info!("Installing Homebrew...");
            self.run_fatal(&RemoteScript::homebrew_install(), "Homebrew installation")?;
        }

        let brew = self.brew_prefix.join("bin").join("brew");
        if brew.exists() {
            let bin = self.brew_prefix.join("bin");
            let sbin = self.brew_prefix.join("sbin");
            self.runner.prepend_path(&sbin);
            self.runner.prepend_path(&bin);
            self.ensure_block(Marker::HomebrewPath, &homebrew_shellenv(self.arch), Position::Prepend)?;
        } else {
            warn!("{} not found, not adding Homebrew to the shell PATH", brew.display());
        }
        Ok(())
    }

    pub fn install_packages(&mut self) -> Result<()> {
        info!("Installing build dependencies...");
        let base = BrewInstall {
            packages: self.config.base_packages.clone(),
        };
        self.run_lenient(&base, "brew install (build dependencies)");

        let packages = manifest::load_packages(&self.paths.packages_file, self.config)?;
        if packages.is_empty() {
            warn!("Package list is empty, skipping brew bundle");
            return Ok(());
        }

        let mut brewfile = tempfile::Builder::new().prefix("Brewfile-").tempfile()?;
        brewfile.write_all(packages.to_brewfile().as_bytes())?;
        brewfile.flush()?;

        info!("Running brew bundle...");
        let bundle = BrewBundle {
            file: brewfile.path().to_path_buf(),
        };
        self.run_lenient(&bundle, "brew bundle");
        Ok(())
    }

    pub fn install_oh_my_zsh(&mut self) -> Result<()> {
        info!("Checking Oh-My-Zsh...");
        let omz = self.paths.home.join(".oh-my-zsh");
        if omz.exists() {
            info!("Oh-My-Zsh already installed");
        } else {
            info!("Installing Oh-My-Zsh...");
            self.run_fatal(&RemoteScript::oh_my_zsh_install(), "Oh-My-Zsh installation")?;
        }

        let config = self.config;
        let plugin_dir = omz.join("custom").join("plugins");
        for plugin in &config.custom_plugins {
            let dest = plugin_dir.join(&plugin.name);
            if dest.exists() {
                continue;
            }
            info!("Cloning {}...", plugin.name);
            let clone = GitClone {
                url: plugin.url.clone(),
                dest,
            };
            self.run_fatal(&clone, &format!("cloning {}", plugin.name))?;
        }
        Ok(())
    }

    pub fn setup_mise(&mut self, tools: &[String]) -> Result<()> {
        info!("Installing Mise...");
        if self.runner.which("mise").is_none() {
            let install = BrewInstall {
                packages: vec!["mise".to_string()],
            };
            self.run_fatal(&install, "brew install mise")?;
        }

        self.ensure_block(Marker::MiseActivate, MISE_ACTIVATE, Position::Append)?;

        info!("Installing {} with Mise (this may take a while)...", tools.join(", "));
        let use_global = MiseUse {
            tools: tools.to_vec(),
        };
        self.run_fatal(&use_global, "mise use --global")?;
        Ok(())
    }

    pub fn setup_rust(&mut self) -> Result<()> {
        info!("Configuring Rust (rustup)...");
        if self.runner.which("rustc").is_none() {
            self.run_fatal(&RustupInit, "rustup-init")?;
        } else {
            info!("Rust already installed, updating stable");
            self.run_lenient(&RustupUpdate, "rustup update");
        }
        self.ensure_block(Marker::Rust, RUST_PATH, Position::Append)?;
        Ok(())
    }

    pub fn setup_go(&mut self) -> Result<()> {
        info!("Configuring Go environment...");
        self.ensure_block(Marker::Go, GO_ENV, Position::Append)?;
        Ok(())
    }

    pub fn configure_zsh(&mut self) -> Result<ZshReport> {
        info!("Final .zshrc configuration...");
        self.backup_original()?;
        let mut doc = ConfigDocument::load(&self.paths.zshrc)?;
        let choice = StarshipChoice {
            force_off: self.options.no_starship,
            assume_yes: self.options.assume_yes,
        };
        zsh::configure_zsh(&mut doc, &self.config.omz_plugins, choice, self.prompter)
    }

    pub fn configure_fzf(&mut self) -> Result<()> {
        info!("Configuring fzf key bindings...");
        let Some(output) = self.run_lenient(&BrewPrefix, "brew --prefix") else {
            return Ok(());
        };
        let prefix = output.stdout.trim();
        if prefix.is_empty() {
            return Ok(());
        }

        let script = Path::new(prefix).join("opt").join("fzf").join("install");
        if !is_executable(&script) {
            info!("fzf installer not found at {}", script.display());
            return Ok(());
        }
        self.run_lenient(&FzfInstall { script }, "fzf install");
        Ok(())
    }
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}
