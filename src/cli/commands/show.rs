//! Show command implementation.
//!
//! Prints the decompressed wire bytes stored for a URL.

use std::io::Write;

use anyhow::Context;
use url::Url;

use crate::cache::{read_raw, StorageKey};
use crate::cli::args::ShowArgs;
use crate::config::CacheConfig;
use crate::error::StashError;

use super::dispatcher::{Command, CommandResult};

/// The show command implementation.
pub struct ShowCommand<'a> {
    config: &'a CacheConfig,
    args: ShowArgs,
}

impl<'a> ShowCommand<'a> {
    /// Create a new show command.
    pub fn new(config: &'a CacheConfig, args: ShowArgs) -> Self {
        Self { config, args }
    }

    fn read_entry(&self) -> anyhow::Result<Vec<u8>> {
        let url = Url::parse(&self.args.url)
            .with_context(|| format!("Invalid URL {}", self.args.url))?;
        let key = StorageKey::for_url(&self.config.root, &url);

        read_raw(&key).map_err(|e| match e {
            StashError::Io(_) => {
                anyhow::Error::new(e).context(format!("No cache entry for {} at {}", url, key))
            }
            _ => anyhow::Error::new(e).context(format!("Cache entry {} is not valid gzip", key)),
        })
    }
}

impl Command for ShowCommand<'_> {
    fn execute(&self, out: &mut dyn Write) -> crate::error::Result<CommandResult> {
        let wire = self.read_entry()?;
        out.write_all(&wire)?;
        out.flush()?;
        Ok(CommandResult::success())
    }
}
