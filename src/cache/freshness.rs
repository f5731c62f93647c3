//! Freshness policy: decides whether a stored entry may be served.
//!
//! The decision uses only the entry's own metadata headers, its status and a
//! caller-supplied cutoff. Standard cache-control directives are ignored.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use http::header::HeaderName;
use http::StatusCode;

use super::entry::CachedResponse;

/// Entries declaring a shorter body are treated as broken captures.
pub const MIN_CONTENT_LENGTH: u64 = 10;

/// Default number of times an error response is refetched before it sticks.
pub const DEFAULT_MAX_ERROR_VERSION: u32 = 3;

/// Default header carrying the write timestamp (epoch seconds).
pub const DEFAULT_TIMESTAMP_HEADER: &str = "x-httpstash-time";

/// Default header carrying the version counter.
pub const DEFAULT_VERSION_HEADER: &str = "x-httpstash-version";

/// Statuses treated as transient failures by default.
pub const DEFAULT_ERROR_STATUSES: [u16; 6] = [401, 403, 500, 502, 503, 504];

/// Point in time a cached entry must be newer than.
///
/// The default (unset) cutoff accepts any entry regardless of age.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreshnessCutoff(Option<DateTime<Utc>>);

impl FreshnessCutoff {
    /// Accept any previously cached entry.
    pub fn any() -> Self {
        Self(None)
    }

    /// Accept entries written strictly after `instant`.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(Some(instant))
    }

    /// Only entries written after this moment; forces revalidation of
    /// everything already stored.
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Accept entries younger than `age`.
    pub fn max_age(age: Duration) -> Self {
        Self::at(Utc::now() - age)
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        self.0
    }

    /// Whether an entry written at `written_at` passes this cutoff.
    pub fn admits(&self, written_at: DateTime<Utc>) -> bool {
        match self.0 {
            Some(cutoff) => written_at > cutoff,
            None => true,
        }
    }
}

/// Outcome of evaluating a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Metadata missing or malformed, or the capture looks truncated.
    Unusable,
    /// Transient error still within its retry budget.
    RetryError { version: u32 },
    /// Transient error past its retry budget; served whatever the cutoff.
    ErrorCapped { version: u32 },
    /// Written after the cutoff.
    Fresh { version: u32 },
    /// Written at or before the cutoff.
    Stale { version: u32 },
}

impl Verdict {
    /// Version the next write continues from.
    pub fn version(&self) -> u32 {
        match *self {
            Verdict::Unusable => 0,
            Verdict::RetryError { version }
            | Verdict::ErrorCapped { version }
            | Verdict::Fresh { version }
            | Verdict::Stale { version } => version,
        }
    }

    /// Whether the stored entry may be returned without a network call.
    pub fn is_hit(&self) -> bool {
        matches!(self, Verdict::Fresh { .. } | Verdict::ErrorCapped { .. })
    }
}

/// Hit/miss rules for stored entries.
#[derive(Debug, Clone)]
pub struct FreshnessPolicy {
    max_error_version: u32,
    error_statuses: HashSet<StatusCode>,
    timestamp_header: HeaderName,
    version_header: HeaderName,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            max_error_version: DEFAULT_MAX_ERROR_VERSION,
            error_statuses: DEFAULT_ERROR_STATUSES
                .iter()
                .filter_map(|code| StatusCode::from_u16(*code).ok())
                .collect(),
            timestamp_header: HeaderName::from_static(DEFAULT_TIMESTAMP_HEADER),
            version_header: HeaderName::from_static(DEFAULT_VERSION_HEADER),
        }
    }
}

impl FreshnessPolicy {
    /// Create a policy with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest stored version at which an error response is still refetched.
    pub fn with_max_error_version(mut self, max_error_version: u32) -> Self {
        self.max_error_version = max_error_version;
        self
    }

    /// Replace the set of statuses subject to bounded retry.
    pub fn with_error_statuses(mut self, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        self.error_statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_timestamp_header(mut self, header: HeaderName) -> Self {
        self.timestamp_header = header;
        self
    }

    pub fn with_version_header(mut self, header: HeaderName) -> Self {
        self.version_header = header;
        self
    }

    pub fn max_error_version(&self) -> u32 {
        self.max_error_version
    }

    pub fn timestamp_header(&self) -> &HeaderName {
        &self.timestamp_header
    }

    pub fn version_header(&self) -> &HeaderName {
        &self.version_header
    }

    pub fn is_error_status(&self, status: StatusCode) -> bool {
        self.error_statuses.contains(&status)
    }

    /// Evaluate a stored entry against `cutoff`.
    pub fn evaluate(&self, stored: &CachedResponse, cutoff: FreshnessCutoff) -> Verdict {
        if let Some(length) = stored.content_length() {
            if length < MIN_CONTENT_LENGTH {
                tracing::debug!("Entry declares {} bytes, below minimum", length);
                return Verdict::Unusable;
            }
        }

        let written_at = match stored.write_timestamp(&self.timestamp_header) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!("Entry unusable: {}", e);
                return Verdict::Unusable;
            }
        };

        let version = match stored.version(&self.version_header) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!("Entry unusable: {}", e);
                return Verdict::Unusable;
            }
        };

        if self.is_error_status(stored.status()) {
            return if version <= self.max_error_version {
                Verdict::RetryError { version }
            } else {
                Verdict::ErrorCapped { version }
            };
        }

        if cutoff.admits(written_at) {
            Verdict::Fresh { version }
        } else {
            Verdict::Stale { version }
        }
    }
}

/// Parse a TTL string like "7d", "24h", "30m".
pub fn parse_ttl(ttl: &str) -> Result<Duration> {
    let ttl = ttl.trim().to_lowercase();

    if let Some(days) = ttl.strip_suffix('d') {
        let n: i64 = days.parse()?;
        Ok(Duration::days(n))
    } else if let Some(hours) = ttl.strip_suffix('h') {
        let n: i64 = hours.parse()?;
        Ok(Duration::hours(n))
    } else if let Some(mins) = ttl.strip_suffix('m') {
        let n: i64 = mins.parse()?;
        Ok(Duration::minutes(n))
    } else if let Some(secs) = ttl.strip_suffix('s') {
        let n: i64 = secs.parse()?;
        Ok(Duration::seconds(n))
    } else {
        // Assume seconds if no suffix
        let n: i64 = ttl.parse()?;
        Ok(Duration::seconds(n))
    }
}
