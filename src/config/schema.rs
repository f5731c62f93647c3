//! Configuration schema for httpstash.yml.

use http::header::HeaderName;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::freshness::{
    DEFAULT_ERROR_STATUSES, DEFAULT_MAX_ERROR_VERSION, DEFAULT_TIMESTAMP_HEADER,
    DEFAULT_VERSION_HEADER,
};
use crate::cache::{default_cache_root, FreshnessPolicy};
use crate::error::{Result, StashError};

/// Root configuration structure for httpstash.yml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding cached entries
    pub root: PathBuf,

    /// Highest stored version at which an error response is refetched
    pub max_error_version: u32,

    /// Header carrying the write timestamp
    pub timestamp_header: String,

    /// Header carrying the version counter
    pub version_header: String,

    /// Statuses subject to bounded retry
    pub error_statuses: Vec<u16>,

    /// Request timeout in seconds for the HTTP transport
    pub timeout_secs: u64,

    /// User agent for the HTTP transport
    pub user_agent: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
            max_error_version: DEFAULT_MAX_ERROR_VERSION,
            timestamp_header: DEFAULT_TIMESTAMP_HEADER.to_string(),
            version_header: DEFAULT_VERSION_HEADER.to_string(),
            error_statuses: DEFAULT_ERROR_STATUSES.to_vec(),
            timeout_secs: 30,
            user_agent: "httpstash".to_string(),
        }
    }
}

impl CacheConfig {
    /// Check header names, status codes and timeout.
    pub fn validate(&self) -> Result<()> {
        self.policy().map(|_| ())?;

        if self.timeout_secs == 0 {
            return Err(StashError::ConfigValidationError {
                message: "timeout_secs must be greater than zero".to_string(),
            });
        }

        if self.timestamp_header.eq_ignore_ascii_case(&self.version_header) {
            return Err(StashError::ConfigValidationError {
                message: format!(
                    "timestamp_header and version_header must differ (both are {:?})",
                    self.timestamp_header
                ),
            });
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Freshness policy described by this configuration.
    pub fn policy(&self) -> Result<FreshnessPolicy> {
        let statuses = self
            .error_statuses
            .iter()
            .map(|code| {
                StatusCode::from_u16(*code).map_err(|_| StashError::ConfigValidationError {
                    message: format!("invalid status code in error_statuses: {}", code),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FreshnessPolicy::new()
            .with_max_error_version(self.max_error_version)
            .with_timestamp_header(header_name("timestamp_header", &self.timestamp_header)?)
            .with_version_header(header_name("version_header", &self.version_header)?)
            .with_error_statuses(statuses))
    }
}

fn header_name(field: &str, value: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(value.as_bytes()).map_err(|_| StashError::ConfigValidationError {
        message: format!("{} is not a valid header name: {:?}", field, value),
    })
}
