//! mac-setup library
//!
//! Idempotent, marker-delimited editing of `~/.zshrc` plus the setup and
//! rollback orchestration built on it.

pub mod analyzer;
pub mod backup;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod logging;
pub mod logic;
pub mod manifest;
pub mod markers;
pub mod plugins;
pub mod process_guard;
pub mod prompt;
pub mod rewriter;
pub mod runner;
pub mod tools;
pub mod types;

// Re-export main types for convenience
pub use analyzer::ShellConfigAnalyzer;
pub use backup::BackupManager;
pub use config::{Paths, RunOptions, SetupConfig};
pub use document::ConfigDocument;
pub use error::{Result, SetupError};
pub use logic::rollback::{Rollback, RollbackOutcome, RollbackReport};
pub use logic::setup::{Setup, SetupOutcome};
pub use markers::{BlockSpan, ensure_block, find_blocks, strip_blocks};
pub use process_guard::{ChildRegistry, ProcessGuard};
pub use prompt::{Prompt, Prompter};
pub use rewriter::{Assignment, AssignmentKind};
pub use runner::{CommandRunner, SystemRunner, ToolOutput};
pub use tools::ToolCommand;
pub use types::{CpuArch, Language, Marker, Position, RollbackMode};
