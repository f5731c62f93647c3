//! Error types for httpstash operations.
//!
//! This module defines [`StashError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Cache misses caused by absent or undecodable entries never surface here;
//!   the store recovers from them locally
//! - Transport failures propagate verbatim via [`StashError::Transport`]
//! - Write failures surface only from [`PendingWrite::commit`](crate::cache::PendingWrite::commit)

use std::path::PathBuf;
use thiserror::Error;

use crate::cache::CodecError;
use crate::transport::TransportError;

/// Core error type for httpstash operations.
#[derive(Debug, Error)]
pub enum StashError {
    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// The underlying transport failed to produce a response.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Persisting a cache entry failed.
    #[error("Failed to write cache entry {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored entry could not be decoded.
    #[error("Failed to decode cache entry: {0}")]
    Decode(#[from] CodecError),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for httpstash operations.
pub type Result<T> = std::result::Result<T, StashError>;
