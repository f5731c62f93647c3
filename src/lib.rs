//! httpstash - A transparent disk-backed cache for HTTP responses.
//!
//! Responses are stored gzip-compressed in their HTTP/1.1 wire form, one file
//! per URL, and served back while they pass a caller-chosen freshness cutoff.
//! Stale entries carrying an entity tag are revalidated with
//! `If-None-Match`. Error responses are refetched a bounded number of times
//! before they are cached like any other response.
//!
//! # Modules
//!
//! - [`cache`] - Storage keys, wire codec, freshness policy and the store
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Error types and result aliases
//! - [`transport`] - The request abstraction and its HTTP implementation
//!
//! # Example
//!
//! ```
//! use httpstash::cache::StorageKey;
//! use std::path::Path;
//! use url::Url;
//!
//! let url = Url::parse("https://Example.com/api/Items?page=2").unwrap();
//! let key = StorageKey::for_url(Path::new("/var/cache/httpstash"), &url);
//! assert!(key.path().ends_with("example.com/api-items?page=2.gz"));
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod transport;

pub use error::{Result, StashError};
