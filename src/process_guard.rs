//! Child process lifecycle
//!
//! Installers run for minutes. If the operator interrupts the tool or it is
//! killed, any installer still running must not be left behind.
//!
//! - Every spawned child PID is tracked in a global registry
//! - On SIGINT, SIGTERM or SIGHUP (and when the [`ProcessGuard`] drops) all
//!   tracked children get SIGTERM, then SIGKILL after a grace period
//!
//! Children stay in the terminal's foreground process group so installers
//! can prompt for a password, which means they are signalled by PID only.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry of running child processes
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    /// Set once termination started, so cleanup runs at most once
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!("Registered child process PID {}", pid);
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!("Unregistered child process PID {}", pid);
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate all tracked children.
    /// Sends SIGTERM, waits up to `grace_period`, then SIGKILLs survivors.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            debug!("Cleanup already initiated, skipping");
            return;
        }
        self.cleanup_initiated = true;

        if self.count() == 0 {
            return;
        }

        info!("Terminating {} child process(es)...", self.count());

        let pids: Vec<u32> = self.pids.iter().copied().collect();
        for &pid in &pids {
            if let Err(e) = send_signal(pid, Signal::SIGTERM) {
                warn!("Failed to send SIGTERM to PID {}: {}", pid, e);
            }
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if !pids.iter().any(|&pid| is_process_alive(pid)) {
                info!("All child processes terminated");
                self.pids.clear();
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in &pids {
            if is_process_alive(pid) {
                warn!("PID {} did not terminate, sending SIGKILL", pid);
                let _ = send_signal(pid, Signal::SIGKILL);
            }
        }

        self.pids.clear();
    }
}

fn send_signal(pid: u32, signal: Signal) -> Result<(), nix::Error> {
    let pid = i32::try_from(pid).map_err(|_| nix::Error::EINVAL)?;
    signal::kill(Pid::from_raw(pid), signal)
}

/// True while `pid` exists. A zombie still counts until it is reaped.
fn is_process_alive(pid: u32) -> bool {
    match i32::try_from(pid) {
        Ok(pid) => signal::kill(Pid::from_raw(pid), None).is_ok(),
        Err(_) => false,
    }
}

/// Terminates all tracked children when dropped.
/// Held by `main` for the lifetime of a run.
pub struct ProcessGuard {
    registry: Arc<Mutex<ChildRegistry>>,
}

impl ProcessGuard {
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
        }
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.terminate_all(Duration::from_secs(5));
        }
    }
}

/// Exit status for a terminating signal. An interrupt is an operator
/// cancel and exits cleanly.
pub fn exit_code_for(sig: i32) -> i32 {
    if sig == signal_hook::consts::signal::SIGINT {
        0
    } else {
        128 + sig
    }
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP.
/// Call once at program start.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            if sig == SIGINT {
                warn!("Cancelled by user");
            } else {
                info!("Received signal {}, cleaning up...", sig);
            }

            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(3));
            }

            std::process::exit(exit_code_for(sig));
        }
    });

    Ok(())
}
