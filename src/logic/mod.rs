//! Orchestration: turns the text engine and the external tools into the
//! `setup` and `rollback` commands.
//!
//! - `setup` - forward configuration, step by step
//! - `zsh` - final `.zshrc` negotiation (plugin merge, theme, Starship)
//! - `rollback` - the three reversal modes

pub mod rollback;
pub mod setup;
pub mod zsh;
