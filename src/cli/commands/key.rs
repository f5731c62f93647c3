//! Key command implementation.
//!
//! Prints where `httpstash get` would store a URL.

use std::io::Write;

use anyhow::Context;
use url::Url;

use crate::cache::StorageKey;
use crate::cli::args::KeyArgs;
use crate::config::CacheConfig;

use super::dispatcher::{Command, CommandResult};

/// The key command implementation.
pub struct KeyCommand<'a> {
    config: &'a CacheConfig,
    args: KeyArgs,
}

impl<'a> KeyCommand<'a> {
    /// Create a new key command.
    pub fn new(config: &'a CacheConfig, args: KeyArgs) -> Self {
        Self { config, args }
    }
}

impl Command for KeyCommand<'_> {
    fn execute(&self, out: &mut dyn Write) -> crate::error::Result<CommandResult> {
        let url = Url::parse(&self.args.url)
            .with_context(|| format!("Invalid URL {}", self.args.url))?;
        let key = StorageKey::for_url(&self.config.root, &url);

        writeln!(out, "{}", key)?;
        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> CacheConfig {
        CacheConfig {
            root: PathBuf::from("/srv/cache"),
            ..Default::default()
        }
    }

    #[test]
    fn prints_storage_path() {
        let config = config();
        let cmd = KeyCommand::new(
            &config,
            KeyArgs {
                url: "https://Example.com/Docs/Page?Lang=EN".to_string(),
            },
        );
        let mut out = Vec::new();
        cmd.execute(&mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "/srv/cache/example.com/docs-page?lang=en.gz\n"
        );
    }

    #[test]
    fn rejects_invalid_url() {
        let config = config();
        let cmd = KeyCommand::new(
            &config,
            KeyArgs {
                url: "not a url".to_string(),
            },
        );
        let mut out = Vec::new();
        let err = cmd.execute(&mut out).unwrap_err();
        assert!(err.to_string().contains("Invalid URL"));
    }
}
