//! Configuration file discovery and loading.

use crate::config::schema::CacheConfig;
use crate::error::{Result, StashError};
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory when no path is given.
pub const CONFIG_FILE_NAME: &str = "httpstash.yml";

/// Find `httpstash.yml` in `dir`.
pub fn find_config(dir: &Path) -> Option<PathBuf> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.is_file() {
        Some(path)
    } else {
        None
    }
}

/// Load a single config file and parse it into CacheConfig.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_config_file(path: &Path) -> Result<CacheConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StashError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            StashError::Io(e)
        }
    })?;

    parse_config(&content, path)
}

/// Parse YAML content into CacheConfig.
///
/// An empty document yields the defaults.
pub fn parse_config(content: &str, source_path: &Path) -> Result<CacheConfig> {
    if content.trim().is_empty() {
        return Ok(CacheConfig::default());
    }

    serde_yaml::from_str(content).map_err(|e| StashError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load the explicit config file, or `httpstash.yml` from `dir` if present,
/// or fall back to defaults. The result is validated.
pub fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<CacheConfig> {
    let config = match explicit.map(Path::to_path_buf).or_else(|| find_config(dir)) {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            load_config_file(&path)?
        }
        None => CacheConfig::default(),
    };

    config.validate()?;
    Ok(config)
}
