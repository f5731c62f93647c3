//! httpstash CLI entry point.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use httpstash::cli::{Cli, CommandDispatcher};
use httpstash::config::load_config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
///
/// Logs go to stderr so fetched bodies on stdout stay clean.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("httpstash=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("httpstash=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("httpstash starting with args: {:?}", cli);

    let cwd = std::env::current_dir().unwrap_or_default();
    let mut config = match load_config(cli.config.as_deref(), &cwd) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(1);
        }
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }

    let dispatcher = CommandDispatcher::new(config);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let code = match dispatcher.dispatch(&cli, &mut out) {
        Ok(result) => ExitCode::from(result.exit_code as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    };
    let _ = out.flush();
    code
}
