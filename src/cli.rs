use crate::config::RunOptions;
use crate::error::Result;
use crate::types::RollbackMode;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// mac-setup - idempotent macOS developer environment setup
#[derive(Parser, Debug)]
#[command(name = "mac-setup")]
#[command(about = "Set up a macOS developer environment, and roll it back")]
#[command(version)]
pub struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON file overriding tool versions, packages and plugins
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Never prompt; every question takes its unattended default
    #[arg(long, global = true)]
    pub non_interactive: bool,

    /// Package list installed by setup and removed by a full rollback,
    /// instead of ./brew-packages.txt
    #[arg(long, global = true)]
    pub packages: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install Homebrew, Oh-My-Zsh, language toolchains and configure ~/.zshrc
    Setup(SetupArgs),
    /// Undo a previous setup
    Rollback {
        /// soft: disable generated blocks; env: remove blocks and environment
        /// directories; full: env plus uninstall packages
        #[arg(short, long, value_enum)]
        mode: RollbackMode,
    },
}

#[derive(Args, Debug, Default)]
pub struct SetupArgs {
    /// Skip the confirmation prompt and switch to Starship without asking
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Keep the current Oh-My-Zsh theme
    #[arg(long)]
    pub no_starship: bool,

    /// Stop after confirmation without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Languages to skip, comma separated (e.g. python,rust,go)
    #[arg(long, default_value = "")]
    pub skip_langs: String,
}

impl SetupArgs {
    pub fn run_options(&self) -> Result<RunOptions> {
        Ok(RunOptions {
            dry_run: self.dry_run,
            assume_yes: self.yes,
            no_starship: self.no_starship,
            skip_langs: RunOptions::parse_skip_langs(&self.skip_langs)?,
        })
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Name used for the per-run log file
    pub fn log_prefix(&self) -> &'static str {
        match self.command {
            Commands::Setup(_) => "setup",
            Commands::Rollback { .. } => "rollback",
        }
    }
}
