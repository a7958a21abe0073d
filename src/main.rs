//! mac-setup - entry point

use anyhow::{Context, Result};
use macsetup::cli::{Cli, Commands};
use macsetup::config::{Paths, SetupConfig};
use macsetup::logging;
use macsetup::logic::rollback::{Rollback, RollbackOutcome};
use macsetup::logic::setup::{self, Setup, SetupOutcome};
use macsetup::process_guard::{self, ProcessGuard};
use macsetup::prompt::{Prompter, TerminalPrompter, Unattended};
use macsetup::runner::SystemRunner;
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let mut paths = Paths::from_env()?.with_run_log(cli.log_prefix());
    if let Some(file) = &cli.packages {
        paths = paths.with_packages_file(file);
    }
    logging::init(cli.verbose, paths.log_file.as_deref())?;

    // Children are still terminated on drop if this fails
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    let _guard = ProcessGuard::new();

    let config = match &cli.config {
        Some(path) => SetupConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => SetupConfig::default(),
    };
    debug!("Configuration: {:?}", config);

    let prompter: Box<dyn Prompter> = if cli.non_interactive {
        Box::new(Unattended)
    } else {
        Box::new(TerminalPrompter)
    };

    match cli.command {
        Commands::Setup(args) => {
            let options = args.run_options()?;
            let arch = setup::check_environment()?;

            info!("Starting macOS environment setup");
            let mut runner = SystemRunner::new(options.dry_run);
            let outcome = Setup::new(&paths, &config, &options, &mut runner, prompter.as_ref(), arch)
                .run()
                .context("Setup aborted")?;

            if let SetupOutcome::Completed { warnings } = &outcome {
                for warning in warnings {
                    warn!("{}", warning);
                }
            }
            info!("{}", outcome);
        }
        Commands::Rollback { mode } => {
            let runner = SystemRunner::new(false);
            let rollback = Rollback::new(&paths, &config, &runner, prompter.as_ref());
            match rollback.run(mode).with_context(|| format!("{mode} rollback aborted"))? {
                RollbackOutcome::Completed(report) => {
                    info!("Backups are kept in {}", paths.backup_dir.display());
                    if !report.warnings.is_empty() {
                        warn!("Finished with {} warning(s)", report.warnings.len());
                    }
                }
                RollbackOutcome::Cancelled => info!("Rollback cancelled, nothing changed"),
            }
        }
    }

    Ok(())
}
