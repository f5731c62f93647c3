//! Get command implementation.
//!
//! Fetches a URL through the cache and writes the body to the output.

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use http::Method;

use crate::cache::{codec, parse_ttl, CacheStore, FreshnessCutoff};
use crate::cli::args::GetArgs;
use crate::config::CacheConfig;
use crate::transport::FetchRequest;

use super::dispatcher::{Command, CommandResult};

/// The get command implementation.
pub struct GetCommand<'a> {
    config: &'a CacheConfig,
    args: GetArgs,
}

impl<'a> GetCommand<'a> {
    /// Create a new get command.
    pub fn new(config: &'a CacheConfig, args: GetArgs) -> Self {
        Self { config, args }
    }

    /// Resolve the freshness flags into a cutoff.
    fn cutoff(&self) -> anyhow::Result<FreshnessCutoff> {
        if self.args.fresh {
            return Ok(FreshnessCutoff::now());
        }
        if let Some(ttl) = &self.args.max_age {
            let age = parse_ttl(ttl).with_context(|| format!("Invalid --max-age {}", ttl))?;
            return Ok(FreshnessCutoff::max_age(age));
        }
        if let Some(since) = &self.args.since {
            let instant = DateTime::parse_from_rfc3339(since)
                .with_context(|| format!("Invalid --since {}", since))?;
            return Ok(FreshnessCutoff::at(instant.with_timezone(&Utc)));
        }
        Ok(FreshnessCutoff::any())
    }
}

impl Command for GetCommand<'_> {
    fn execute(&self, out: &mut dyn Write) -> crate::error::Result<CommandResult> {
        let cutoff = self.cutoff()?;
        let store = CacheStore::from_config(self.config)?;

        let mut request = FetchRequest::parse(Method::GET, &self.args.url)?;
        if let Some(secs) = self.args.timeout {
            request = request.with_timeout(Duration::from_secs(secs));
        }

        let (response, outcome, pending) = store.fetch(&request, cutoff)?;
        tracing::info!("{} {} ({})", response.status(), request.url(), outcome);

        if self.args.no_store {
            tracing::debug!("Skipping cache write for {}", request.url());
        } else {
            pending.commit()?;
        }

        if self.args.include_headers {
            out.write_all(&codec::serialize(&response))?;
        } else {
            out.write_all(response.body())?;
        }
        out.flush()?;

        Ok(CommandResult::success())
    }
}
