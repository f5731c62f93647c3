//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::io::Write;

use crate::cli::args::{Cli, Commands};
use crate::config::CacheConfig;
use crate::error::Result;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command, writing its output to `out`.
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult>;
}

/// Result of command execution.
///
/// Commands that cannot complete return an error instead, which the binary
/// maps to exit code 1.
#[derive(Debug)]
pub struct CommandResult {
    /// Exit code to use.
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self { exit_code: 0 }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    config: CacheConfig,
}

impl CommandDispatcher {
    /// Create a new dispatcher with resolved configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Route the CLI subcommand to its implementation and execute it.
    pub fn dispatch(&self, cli: &Cli, out: &mut dyn Write) -> Result<CommandResult> {
        match &cli.command {
            Commands::Get(args) => {
                let cmd = super::get::GetCommand::new(&self.config, args.clone());
                cmd.execute(out)
            }
            Commands::Key(args) => {
                let cmd = super::key::KeyCommand::new(&self.config, args.clone());
                cmd.execute(out)
            }
            Commands::Show(args) => {
                let cmd = super::show::ShowCommand::new(&self.config, args.clone());
                cmd.execute(out)
            }
        }
    }
}
