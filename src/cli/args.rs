//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// httpstash - Fetch URLs through a disk-backed response cache.
#[derive(Debug, Parser)]
#[command(name = "httpstash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides ./httpstash.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Cache root directory (overrides the config file)
    #[arg(short, long, global = true, env = "HTTPSTASH_ROOT")]
    pub root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch a URL, serving it from cache when possible
    Get(GetArgs),

    /// Print the cache file path for a URL
    Key(KeyArgs),

    /// Print the stored response for a URL
    Show(ShowArgs),
}

/// Arguments for the `get` command.
#[derive(Debug, Clone, clap::Args)]
pub struct GetArgs {
    /// URL to fetch
    pub url: String,

    /// Revalidate entries older than this (e.g. 7d, 24h, 30m, 45s)
    #[arg(long, value_name = "TTL", conflicts_with = "since")]
    pub max_age: Option<String>,

    /// Revalidate entries written at or before this RFC 3339 time
    #[arg(long, value_name = "TIME")]
    pub since: Option<String>,

    /// Revalidate regardless of age
    #[arg(long, conflicts_with_all = ["max_age", "since"])]
    pub fresh: bool,

    /// Do not persist the fetched response
    #[arg(long)]
    pub no_store: bool,

    /// Print the status line and headers before the body
    #[arg(short = 'i', long)]
    pub include_headers: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Arguments for the `key` command.
#[derive(Debug, Clone, clap::Args)]
pub struct KeyArgs {
    /// URL to derive the cache path for
    pub url: String,
}

/// Arguments for the `show` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ShowArgs {
    /// URL whose stored entry to print
    pub url: String,
}
