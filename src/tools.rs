//! Typed external commands.
//!
//! Every program the setup or rollback invokes is a struct implementing
//! [`ToolCommand`]. The struct is the contract: flag spellings and
//! environment variables live here and nowhere else, so call sites cannot
//! get them wrong.

use std::path::PathBuf;

pub const HOMEBREW_INSTALL_URL: &str =
    "https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh";
pub const HOMEBREW_UNINSTALL_URL: &str =
    "https://raw.githubusercontent.com/Homebrew/install/HEAD/uninstall.sh";
pub const OH_MY_ZSH_INSTALL_URL: &str =
    "https://raw.githubusercontent.com/ohmyzsh/ohmyzsh/master/tools/install.sh";

/// An external command with a fixed argument contract.
pub trait ToolCommand {
    /// Program name or path, resolved through `PATH` by the runner
    fn program(&self) -> String;

    /// Arguments exactly as the program expects them
    fn args(&self) -> Vec<String>;

    /// Extra environment variables for the child
    fn env(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Human readable command line for logs
    fn describe(&self) -> String {
        std::iter::once(self.program())
            .chain(self.args())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// `brew update`
#[derive(Debug, Clone, Default)]
pub struct BrewUpdate;

impl ToolCommand for BrewUpdate {
    fn program(&self) -> String {
        "brew".into()
    }

    fn args(&self) -> Vec<String> {
        owned(&["update"])
    }
}

/// `brew install <packages...>`
#[derive(Debug, Clone)]
pub struct BrewInstall {
    pub packages: Vec<String>,
}

impl ToolCommand for BrewInstall {
    fn program(&self) -> String {
        "brew".into()
    }

    fn args(&self) -> Vec<String> {
        let mut args = owned(&["install"]);
        args.extend(self.packages.iter().cloned());
        args
    }
}

/// `brew bundle --file <file>`
#[derive(Debug, Clone)]
pub struct BrewBundle {
    pub file: PathBuf,
}

impl ToolCommand for BrewBundle {
    fn program(&self) -> String {
        "brew".into()
    }

    fn args(&self) -> Vec<String> {
        vec![
            "bundle".into(),
            "--file".into(),
            self.file.display().to_string(),
        ]
    }
}

/// `brew uninstall [--cask] <packages...>`
#[derive(Debug, Clone)]
pub struct BrewUninstall {
    pub packages: Vec<String>,
    pub cask: bool,
}

impl ToolCommand for BrewUninstall {
    fn program(&self) -> String {
        "brew".into()
    }

    fn args(&self) -> Vec<String> {
        let mut args = owned(&["uninstall"]);
        if self.cask {
            args.push("--cask".into());
        }
        args.extend(self.packages.iter().cloned());
        args
    }
}

/// `brew --prefix`
#[derive(Debug, Clone, Default)]
pub struct BrewPrefix;

impl ToolCommand for BrewPrefix {
    fn program(&self) -> String {
        "brew".into()
    }

    fn args(&self) -> Vec<String> {
        owned(&["--prefix"])
    }
}

/// `mise use --global <lang@version...>`
#[derive(Debug, Clone)]
pub struct MiseUse {
    pub tools: Vec<String>,
}

impl ToolCommand for MiseUse {
    fn program(&self) -> String {
        "mise".into()
    }

    fn args(&self) -> Vec<String> {
        let mut args = owned(&["use", "--global"]);
        args.extend(self.tools.iter().cloned());
        args
    }
}

/// First-time toolchain install. PATH wiring is done by the `AUTO-RUST` block.
#[derive(Debug, Clone, Default)]
pub struct RustupInit;

impl ToolCommand for RustupInit {
    fn program(&self) -> String {
        "rustup-init".into()
    }

    fn args(&self) -> Vec<String> {
        owned(&["-y", "--no-modify-path"])
    }
}

#[derive(Debug, Clone, Default)]
pub struct RustupUpdate;

impl ToolCommand for RustupUpdate {
    fn program(&self) -> String {
        "rustup".into()
    }

    fn args(&self) -> Vec<String> {
        owned(&["update", "stable"])
    }
}

#[derive(Debug, Clone)]
pub struct GitClone {
    pub url: String,
    pub dest: PathBuf,
}

impl ToolCommand for GitClone {
    fn program(&self) -> String {
        "git".into()
    }

    fn args(&self) -> Vec<String> {
        vec![
            "clone".into(),
            self.url.clone(),
            self.dest.display().to_string(),
        ]
    }
}

/// fzf's own installer, limited to zsh key bindings and completion
#[derive(Debug, Clone)]
pub struct FzfInstall {
    pub script: PathBuf,
}

impl ToolCommand for FzfInstall {
    fn program(&self) -> String {
        self.script.display().to_string()
    }

    fn args(&self) -> Vec<String> {
        // .zshrc is managed by the fzf Oh-My-Zsh plugin
        owned(&[
            "--key-bindings",
            "--completion",
            "--no-update-rc",
            "--no-bash",
            "--no-fish",
        ])
    }
}

/// An installer script fetched with curl and piped into a shell
#[derive(Debug, Clone)]
pub struct RemoteScript {
    pub shell: String,
    pub url: String,
    pub env: Vec<(String, String)>,
}

impl RemoteScript {
    pub fn homebrew_install() -> Self {
        Self {
            shell: "/bin/bash".into(),
            url: HOMEBREW_INSTALL_URL.into(),
            env: Vec::new(),
        }
    }

    pub fn homebrew_uninstall() -> Self {
        Self {
            shell: "/bin/bash".into(),
            url: HOMEBREW_UNINSTALL_URL.into(),
            env: Vec::new(),
        }
    }

    /// Oh-My-Zsh installer that neither starts zsh, changes the login
    /// shell, nor replaces an existing `.zshrc`
    pub fn oh_my_zsh_install() -> Self {
        Self {
            shell: "sh".into(),
            url: OH_MY_ZSH_INSTALL_URL.into(),
            env: vec![
                ("RUNZSH".into(), "no".into()),
                ("CHSH".into(), "no".into()),
                ("KEEP_ZSHRC".into(), "yes".into()),
            ],
        }
    }
}

impl ToolCommand for RemoteScript {
    fn program(&self) -> String {
        "/bin/sh".into()
    }

    fn args(&self) -> Vec<String> {
        vec![
            "-c".into(),
            format!("{} -c \"$(curl -fsSL {})\"", self.shell, self.url),
        ]
    }

    fn env(&self) -> Vec<(String, String)> {
        self.env.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brew_install_args() {
        let cmd = BrewInstall {
            packages: vec!["git".into(), "mise".into()],
        };
        assert_eq!(cmd.program(), "brew");
        assert_eq!(cmd.args(), vec!["install", "git", "mise"]);
        assert_eq!(cmd.describe(), "brew install git mise");
    }

    #[test]
    fn test_brew_uninstall_args() {
        let formulae = BrewUninstall {
            packages: vec!["ripgrep".into(), "fd".into()],
            cask: false,
        };
        assert_eq!(formulae.describe(), "brew uninstall ripgrep fd");

        let casks = BrewUninstall {
            packages: vec!["iterm2".into()],
            cask: true,
        };
        assert_eq!(casks.args(), vec!["uninstall", "--cask", "iterm2"]);
    }

    #[test]
    fn test_mise_use_is_global() {
        let cmd = MiseUse {
            tools: vec!["python@3.12".into(), "node@22".into()],
        };
        assert_eq!(cmd.args(), vec!["use", "--global", "python@3.12", "node@22"]);
    }

    #[test]
    fn test_rustup_init_does_not_modify_path() {
        assert_eq!(RustupInit.args(), vec!["-y", "--no-modify-path"]);
        assert_eq!(RustupUpdate.args(), vec!["update", "stable"]);
    }

    #[test]
    fn test_fzf_install_leaves_rc_files_alone() {
        let cmd = FzfInstall {
            script: PathBuf::from("/opt/homebrew/opt/fzf/install"),
        };
        assert_eq!(cmd.program(), "/opt/homebrew/opt/fzf/install");
        assert!(cmd.args().contains(&"--no-update-rc".to_string()));
    }

    #[test]
    fn test_oh_my_zsh_installer_env() {
        let cmd = RemoteScript::oh_my_zsh_install();
        let env = cmd.env();
        assert!(env.contains(&("RUNZSH".into(), "no".into())));
        assert!(env.contains(&("CHSH".into(), "no".into())));
        assert!(env.contains(&("KEEP_ZSHRC".into(), "yes".into())));
        assert_eq!(
            cmd.args()[1],
            format!("sh -c \"$(curl -fsSL {OH_MY_ZSH_INSTALL_URL})\"")
        );
    }

    #[test]
    fn test_homebrew_scripts_use_bash() {
        assert!(RemoteScript::homebrew_install().args()[1].starts_with("/bin/bash -c"));
        assert!(RemoteScript::homebrew_uninstall()
            .args()[1]
            .contains(HOMEBREW_UNINSTALL_URL));
        assert!(RemoteScript::homebrew_install().env().is_empty());
    }
}
