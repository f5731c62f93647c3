//! Command-line interface for httpstash.
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, GetArgs, KeyArgs, ShowArgs};
pub use commands::{Command, CommandDispatcher, CommandResult};
