//! Response caching.
//!
//! This module provides the disk-backed cache: storage key derivation, the
//! gzip wire codec for stored entries, the freshness policy with bounded
//! error retry, and the [`CacheStore`] that ties them to a transport.

pub mod codec;
pub mod entry;
pub mod freshness;
pub mod key;
pub mod store;

pub use codec::CodecError;
pub use entry::{CachedResponse, MetadataError};
pub use freshness::{parse_ttl, FreshnessCutoff, FreshnessPolicy, Verdict};
pub use key::StorageKey;
pub use store::{read_raw, CacheOutcome, CacheStore, CacheStoreBuilder, PendingWrite};

/// Get the default cache directory, relative to the working directory.
pub fn default_cache_root() -> std::path::PathBuf {
    std::path::PathBuf::from(".httpstash")
}
