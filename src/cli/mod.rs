//! Command-line interface.
//!
//! - `args`: clap definitions
//! - `run`: entry point, configuration, runtime and dispatch
//! - `commands`: one module per subcommand

pub mod args;
mod commands;
mod run;

pub use args::{Cli, Commands, ConfigCommands};
pub use run::run;
