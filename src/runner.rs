//! Execution of typed external commands.
//!
//! Orchestration code only talks to the [`CommandRunner`] trait, so tests
//! can substitute a recording fake. [`SystemRunner`] is the real thing:
//! every child is registered with the [`ChildRegistry`] for the lifetime of
//! the call, so an interrupt never leaves an installer running.

use crate::error::{Result, SetupError};
use crate::process_guard::ChildRegistry;
use crate::tools::ToolCommand;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

/// Longest diagnostic excerpt carried into logs and errors
pub const DIAGNOSTIC_LIMIT: usize = 500;

/// Output from an external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` if terminated by a signal or never started
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl ToolOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            exit_code: Some(0),
            success: true,
            ..Self::default()
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            exit_code: Some(exit_code),
            success: false,
            ..Self::default()
        }
    }

    /// Result reported for a command that was only logged (dry run)
    pub fn skipped() -> Self {
        Self::success("")
    }

    /// Bounded excerpt of stderr, or stdout when stderr is empty
    pub fn diagnostic(&self) -> String {
        let text = match self.stderr.trim() {
            "" => self.stdout.trim(),
            stderr => stderr,
        };
        text.chars().take(DIAGNOSTIC_LIMIT).collect()
    }

    /// Turn a failed run into [`SetupError::Command`].
    pub fn ensure_success(&self, context: &str) -> Result<()> {
        if self.success {
            return Ok(());
        }
        let code = self.exit_code.unwrap_or(-1);
        Err(SetupError::command(format!(
            "{context} failed (exit code {code}): {}",
            self.diagnostic()
        )))
    }
}

/// Runs external commands on behalf of setup and rollback
pub trait CommandRunner {
    /// Run to completion. A non-zero exit is `Ok` with `success == false`;
    /// `Err` means the command could not be started at all.
    fn run(&self, cmd: &dyn ToolCommand) -> Result<ToolOutput>;

    /// Locate a program on the runner's search path
    fn which(&self, program: &str) -> Option<PathBuf>;

    /// Make `dir` take precedence for later commands and lookups
    fn prepend_path(&mut self, dir: &Path);
}

/// Spawns real processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    dry_run: bool,
    extra_path: Vec<PathBuf>,
}

impl SystemRunner {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            extra_path: Vec::new(),
        }
    }

    /// `PATH` for children: extra entries first, then the inherited value
    fn search_path(&self) -> Option<OsString> {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let dirs = self
            .extra_path
            .iter()
            .cloned()
            .chain(std::env::split_paths(&inherited));
        std::env::join_paths(dirs).ok()
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &dyn ToolCommand) -> Result<ToolOutput> {
        let line = cmd.describe();
        if self.dry_run {
            info!("[dry-run] {}", line);
            return Ok(ToolOutput::skipped());
        }

        let env = cmd.env();
        info!("Running: {}", line);
        if !env.is_empty() {
            debug!("  env={:?}", env);
        }

        let program = self.which(&cmd.program()).unwrap_or_else(|| cmd.program().into());
        let mut command = Command::new(program);
        command
            .args(cmd.args())
            .envs(env)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(path) = self.search_path() {
            command.env("PATH", path);
        }

        let child = command
            .spawn()
            .map_err(|e| SetupError::command(format!("failed to start {line}: {e}")))?;
        let pid = child.id();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid);
        }
        let waited = child.wait_with_output();
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(pid);
        }
        let output =
            waited.map_err(|e| SetupError::command(format!("failed waiting for {line}: {e}")))?;

        let result = ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
            success: output.status.success(),
        };

        if result.success {
            debug!("{} finished successfully", line);
        } else {
            error!("Command failed: {}", line);
            let diagnostic = result.diagnostic();
            if !diagnostic.is_empty() {
                error!("  details: {}", diagnostic);
            }
        }

        Ok(result)
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        which::which_in(program, self.search_path(), cwd).ok()
    }

    fn prepend_path(&mut self, dir: &Path) {
        if !self.extra_path.iter().any(|p| p == dir) {
            self.extra_path.insert(0, dir.to_path_buf());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolCommand;

    struct Sh(&'static str);

    impl ToolCommand for Sh {
        fn program(&self) -> String {
            "sh".into()
        }

        fn args(&self) -> Vec<String> {
            vec!["-c".into(), self.0.into()]
        }

        fn env(&self) -> Vec<(String, String)> {
            vec![("GREETING".into(), "hello".into())]
        }
    }

    #[test]
    fn test_run_captures_output_and_env() {
        let out = SystemRunner::new(false).run(&Sh("echo $GREETING")).unwrap();
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.exit_code, Some(0));
    }

    #[test]
    fn test_nonzero_exit_is_not_an_error() {
        let out = SystemRunner::new(false).run(&Sh("echo boom >&2; exit 3")).unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.diagnostic(), "boom");

        let err = out.ensure_success("boom step").unwrap_err();
        assert!(err.to_string().contains("exit code 3"));
    }

    #[test]
    fn test_dry_run_does_not_spawn() {
        let out = SystemRunner::new(true).run(&Sh("exit 1")).unwrap();
        assert!(out.success);
        assert!(out.stdout.is_empty());
    }

    #[test]
    fn test_diagnostic_is_bounded() {
        let out = ToolOutput::failure(1, "x".repeat(2000));
        assert_eq!(out.diagnostic().chars().count(), DIAGNOSTIC_LIMIT);

        let out = ToolOutput {
            stdout: "only stdout\n".into(),
            success: false,
            ..ToolOutput::default()
        };
        assert_eq!(out.diagnostic(), "only stdout");
    }

    #[cfg(unix)]
    #[test]
    fn test_prepended_path_wins() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("mac-setup-test-tool");
        std::fs::write(&tool, "#!/bin/sh\necho from-extra\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut runner = SystemRunner::new(false);
        assert!(runner.which("mac-setup-test-tool").is_none());

        runner.prepend_path(dir.path());
        assert_eq!(runner.which("mac-setup-test-tool"), Some(tool));
        let out = runner.run(&Sh("mac-setup-test-tool")).unwrap();
        assert_eq!(out.stdout.trim(), "from-extra");
    }
}
