//! Reversal of a setup run.
//!
//! Three independent modes of increasing destructiveness. None of them
//! chains into another, and no state is kept between runs: each invocation
//! works from what is on disk right now.
//!
//! | Mode   | Effect                                                          |
//! |--------|-----------------------------------------------------------------|
//! | `soft` | start markers renamed to `DISABLED-...`; nothing is deleted      |
//! | `env`  | blocks removed, original `.zshrc` optionally restored, env dirs deleted |
//! | `full` | `env`, plus setup's packages removed and Homebrew optionally uninstalled |
//!
//! # Failure Policy
//!
//! Failing to snapshot or rewrite `.zshrc` aborts. Deleting an environment
//! directory or an uninstall command failing only produces a warning.

use crate::backup::{BackupManager, BEFORE_ENV_PREFIX, BEFORE_FULL_PREFIX, ORIGINAL_PREFIX};
use crate::config::{Paths, SetupConfig};
use crate::document::ConfigDocument;
use crate::error::Result;
use crate::manifest;
use crate::markers;
use crate::prompt::{Prompt, Prompter};
use crate::runner::CommandRunner;
use crate::tools::{BrewUninstall, RemoteScript, ToolCommand};
use crate::types::{RollbackMode, DISABLE_PREFIXES};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What a rollback did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    pub mode: RollbackMode,
    /// Snapshots taken before changing anything
    pub snapshots: Vec<PathBuf>,
    /// Start markers disabled (`soft`)
    pub disabled: usize,
    /// Markers of the blocks removed (`env`, `full`)
    pub removed: Vec<String>,
    /// Snapshot `.zshrc` was restored from, if the operator chose to
    pub restored: Option<PathBuf>,
    pub deleted_dirs: Vec<PathBuf>,
    pub packages_removed: bool,
    pub homebrew_uninstalled: bool,
    pub warnings: Vec<String>,
}

impl RollbackReport {
    fn new(mode: RollbackMode) -> Self {
        Self {
            mode,
            snapshots: Vec::new(),
            disabled: 0,
            removed: Vec::new(),
            restored: None,
            deleted_dirs: Vec::new(),
            packages_removed: false,
            homebrew_uninstalled: false,
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

impl fmt::Display for RollbackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            RollbackMode::Soft => write!(f, "soft rollback: {} block(s) disabled", self.disabled),
            mode => {
                write!(
                    f,
                    "{mode} rollback: {} block(s) removed, {} env dir(s) deleted",
                    self.removed.len(),
                    self.deleted_dirs.len()
                )?;
                if self.restored.is_some() {
                    write!(f, ", original .zshrc restored")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    Completed(RollbackReport),
    /// The operator declined a destructive rollback
    Cancelled,
}

pub struct Rollback<'a> {
    paths: &'a Paths,
    config: &'a SetupConfig,
    runner: &'a dyn CommandRunner,
    prompter: &'a dyn Prompter,
    backups: BackupManager,
}

impl<'a> Rollback<'a> {
    pub fn new(
        paths: &'a Paths,
        config: &'a SetupConfig,
        runner: &'a dyn CommandRunner,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            backups: BackupManager::new(&paths.backup_dir),
            paths,
            config,
            runner,
            prompter,
        }
    }

    pub fn run(&self, mode: RollbackMode) -> Result<RollbackOutcome> {
        info!("Starting {} rollback", mode);
        let outcome = match mode {
            RollbackMode::Soft => RollbackOutcome::Completed(self.disable()?),
            RollbackMode::Env => RollbackOutcome::Completed(self.remove_and_restore()?),
            RollbackMode::Full => self.full()?,
        };
        if let RollbackOutcome::Completed(report) = &outcome {
            info!("{}", report);
            info!("Open a new terminal to load the restored environment");
        }
        Ok(outcome)
    }

    /// `soft`: rename the start markers in place.
    pub fn disable(&self) -> Result<RollbackReport> {
        let mut report = RollbackReport::new(RollbackMode::Soft);
        let mut doc = ConfigDocument::load(&self.paths.zshrc)?;
        if !doc.exists() {
            info!("{} does not exist, nothing to disable", self.paths.zshrc.display());
            return Ok(report);
        }

        let (text, count) = markers::disable_blocks(doc.content(), DISABLE_PREFIXES);
        if count > 0 {
            doc.save(text)?;
        }
        report.disabled = count;
        Ok(report)
    }

    /// `env`: strip blocks, offer the original snapshot, delete env dirs.
    pub fn remove_and_restore(&self) -> Result<RollbackReport> {
        let mut report = RollbackReport::new(RollbackMode::Env);
        self.strip_zshrc(BEFORE_ENV_PREFIX, &mut report)?;
        self.offer_original(&mut report)?;
        self.delete_env_dirs(&mut report);
        Ok(report)
    }

    /// `full`: confirm, then everything `env` does plus package removal.
    pub fn full(&self) -> Result<RollbackOutcome> {
        warn!("Full rollback uninstalls the setup packages and deletes environment directories");
        if !self.prompter.ask(&Prompt::ConfirmFullRollback) {
            warn!("Full rollback cancelled");
            return Ok(RollbackOutcome::Cancelled);
        }

        let mut report = RollbackReport::new(RollbackMode::Full);
        self.strip_zshrc(BEFORE_FULL_PREFIX, &mut report)?;
        self.offer_original(&mut report)?;

        self.remove_packages(&mut report);
        self.delete_env_dirs(&mut report);

        if self.prompter.ask(&Prompt::UninstallHomebrew) {
            info!("Uninstalling Homebrew...");
            let uninstalled = self.run_lenient(&RemoteScript::homebrew_uninstall(), &mut report);
            report.homebrew_uninstalled = uninstalled;
        }

        Ok(RollbackOutcome::Completed(report))
    }

    /// Uninstall the formulae and casks setup bundled, read from the same
    /// packages file (or the same defaults).
    fn remove_packages(&self, report: &mut RollbackReport) {
        let packages = match manifest::load_packages(&self.paths.packages_file, self.config) {
            Ok(packages) => packages,
            Err(e) => {
                report.warn(format!("cannot read the package list, skipping package removal: {e}"));
                return;
            }
        };
        if packages.is_empty() {
            report.warn("package list is empty, nothing to uninstall".to_string());
            return;
        }

        info!("Uninstalling the packages installed by setup...");
        let mut removed = true;
        for (names, cask) in [(&packages.formulae, false), (&packages.casks, true)] {
            if names.is_empty() {
                continue;
            }
            let uninstall = BrewUninstall {
                packages: names.clone(),
                cask,
            };
            removed &= self.run_lenient(&uninstall, report);
        }
        report.packages_removed = removed;
    }

    fn strip_zshrc(&self, prefix: &str, report: &mut RollbackReport) -> Result<()> {
        if let Some(snapshot) = self.backups.snapshot(&self.paths.zshrc, prefix)? {
            report.snapshots.push(snapshot);
        }

        let mut doc = ConfigDocument::load(&self.paths.zshrc)?;
        let (text, removed) = markers::strip_blocks(doc.content());
        if !removed.is_empty() {
            doc.save(text)?;
        }
        info!("Removed {} generated block(s)", removed.len());
        report.removed = removed.into_iter().map(|b| b.marker).collect();
        Ok(())
    }

    fn offer_original(&self, report: &mut RollbackReport) -> Result<()> {
        let Some(original) = self.backups.latest(&self.paths.zshrc, ORIGINAL_PREFIX) else {
            return Ok(());
        };
        let prompt = Prompt::RestoreOriginal {
            backup: original.clone(),
        };
        if self.prompter.ask(&prompt) {
            self.backups.restore(&original, &self.paths.zshrc)?;
            report.restored = Some(original);
        }
        Ok(())
    }

    fn delete_env_dirs(&self, report: &mut RollbackReport) {
        for dir in self.config.env_dirs_in(&self.paths.home) {
            let Ok(meta) = dir.symlink_metadata() else {
                continue;
            };
            info!("Deleting {}", dir.display());
            match remove_path(&dir, meta.file_type().is_dir()) {
                Ok(()) => report.deleted_dirs.push(dir),
                Err(e) => report.warn(format!("failed to delete {}: {e}", dir.display())),
            }
        }
    }

    fn run_lenient(&self, cmd: &dyn ToolCommand, report: &mut RollbackReport) -> bool {
        match self.runner.run(cmd) {
            Ok(out) if out.success => true,
            Ok(out) => {
                report.warn(format!("{} failed: {}", cmd.describe(), out.diagnostic()));
                false
            }
            Err(e) => {
                report.warn(e.to_string());
                false
            }
        }
    }
}

/// Remove a directory tree, or just the link/file when it is not a real directory
fn remove_path(path: &Path, is_dir: bool) -> std::io::Result<()> {
    if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
