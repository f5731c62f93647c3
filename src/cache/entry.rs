//! Cached response type and its metadata headers.

use chrono::{DateTime, Utc};
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, ETAG};
use http::StatusCode;
use thiserror::Error;

/// A full response: the unit of storage and retrieval.
///
/// Once persisted an entry is never patched; a re-fetch writes a new
/// `CachedResponse` over the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

/// Reasons a stored entry's metadata headers cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// No write-timestamp header was stored.
    #[error("missing write timestamp header {header}")]
    MissingTimestamp { header: String },

    /// The write-timestamp header is not decimal epoch seconds.
    #[error("invalid write timestamp {value:?}")]
    InvalidTimestamp { value: String },

    /// The version header is not a non-negative integer.
    #[error("invalid version {value:?}")]
    InvalidVersion { value: String },
}

impl CachedResponse {
    /// Create a response from its parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the response, returning the body.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Body as UTF-8 text, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// First value of a header, if present and visible ASCII.
    pub fn header_str(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Entity tag, if the origin sent one.
    pub fn etag(&self) -> Option<&str> {
        self.header_str(&ETAG)
    }

    /// Explicit `Content-Length`, if declared.
    pub fn content_length(&self) -> Option<u64> {
        self.header_str(&CONTENT_LENGTH)
            .and_then(|v| v.trim().parse().ok())
    }

    /// Read the write timestamp stored under `header`.
    pub fn write_timestamp(&self, header: &HeaderName) -> Result<DateTime<Utc>, MetadataError> {
        let raw = match self.headers.get(header) {
            Some(value) if !value.is_empty() => value,
            _ => {
                return Err(MetadataError::MissingTimestamp {
                    header: header.to_string(),
                })
            }
        };

        let text = raw.to_str().unwrap_or_default();
        text.parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| MetadataError::InvalidTimestamp {
                value: String::from_utf8_lossy(raw.as_bytes()).into_owned(),
            })
    }

    /// Read the version counter stored under `header`.
    ///
    /// Entries written before versioning carry no header and count as
    /// version 1.
    pub fn version(&self, header: &HeaderName) -> Result<u32, MetadataError> {
        match self.headers.get(header) {
            Some(value) if !value.is_empty() => value
                .to_str()
                .ok()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| MetadataError::InvalidVersion {
                    value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                }),
            _ => Ok(1),
        }
    }

    /// Stamp the write timestamp and version headers, replacing old values.
    pub fn stamp(
        &mut self,
        timestamp_header: &HeaderName,
        version_header: &HeaderName,
        written_at: DateTime<Utc>,
        version: u32,
    ) {
        self.headers.insert(
            timestamp_header.clone(),
            HeaderValue::from(written_at.timestamp()),
        );
        self.headers
            .insert(version_header.clone(), HeaderValue::from(version));
    }
}
