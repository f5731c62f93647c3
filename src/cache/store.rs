//! Cache store: the fetch-through orchestrator.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use dashmap::DashSet;
use http::header::{HeaderName, HeaderValue, ETAG, IF_NONE_MATCH};
use http::StatusCode;
use tracing::{debug, warn};
use url::Url;

use super::codec;
use super::entry::CachedResponse;
use super::freshness::{FreshnessCutoff, FreshnessPolicy};
use super::key::StorageKey;
use crate::config::CacheConfig;
use crate::error::{Result, StashError};
use crate::transport::{FetchRequest, HttpTransport, Transport, TransportError};

/// How a fetch was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Served from disk without contacting the transport.
    Hit,
    /// The origin answered `304 Not Modified`; the stored body was served.
    Revalidated,
    /// A new response came from the transport.
    Miss,
}

impl CacheOutcome {
    /// Whether the returned response is the stored one.
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheOutcome::Hit | CacheOutcome::Revalidated)
    }
}

impl fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Revalidated => "revalidated",
            CacheOutcome::Miss => "miss",
        };
        f.write_str(label)
    }
}

/// A serialized response waiting to be persisted.
///
/// Returned by [`CacheStore::fetch`]. Nothing touches the disk until
/// [`commit`](PendingWrite::commit) is called, so callers can skip writing
/// responses they intend to discard.
#[must_use = "a pending write is discarded unless committed"]
#[derive(Debug, Default)]
pub struct PendingWrite {
    target: Option<PendingTarget>,
}

#[derive(Debug)]
struct PendingTarget {
    key: StorageKey,
    wire: Vec<u8>,
    create_parent: bool,
}

impl PendingWrite {
    /// A write that does nothing.
    pub fn noop() -> Self {
        Self { target: None }
    }

    fn new(key: StorageKey, wire: Vec<u8>, create_parent: bool) -> Self {
        Self {
            target: Some(PendingTarget {
                key,
                wire,
                create_parent,
            }),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.target.is_none()
    }

    /// Where the entry will be written, if anywhere.
    pub fn key(&self) -> Option<&StorageKey> {
        self.target.as_ref().map(|t| &t.key)
    }

    /// Compress and write the entry, replacing whatever is stored.
    pub fn commit(self) -> Result<()> {
        let Some(target) = self.target else {
            return Ok(());
        };
        let path = target.key.path();
        let write_error = |source: std::io::Error| StashError::Write {
            path: path.to_path_buf(),
            source,
        };

        if target.create_parent {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(write_error)?;
            }
        }

        let compressed =
            codec::compress(&target.wire).map_err(|e| write_error(std::io::Error::other(e)))?;
        fs::write(path, compressed).map_err(write_error)?;

        debug!("Stored cache entry {}", target.key);
        Ok(())
    }
}

/// Decompressed wire bytes stored at `key`.
///
/// A missing file is [`StashError::Io`]; bytes that are not gzip are
/// [`StashError::Decode`].
pub fn read_raw(key: &StorageKey) -> Result<Vec<u8>> {
    let bytes = fs::read(key.path())?;
    Ok(codec::decompress(&bytes)?)
}

/// Transparent disk cache in front of a [`Transport`].
///
/// # Example
///
/// ```no_run
/// use httpstash::cache::{CacheStore, FreshnessCutoff};
/// use httpstash::transport::FetchRequest;
/// use http::Method;
///
/// let store = CacheStore::builder("/tmp/httpstash")
///     .max_error_version(2)
///     .build()
///     .unwrap();
///
/// let request = FetchRequest::parse(Method::GET, "https://example.com/feed?page=2").unwrap();
/// let (response, outcome, pending) = store.fetch(&request, FreshnessCutoff::any()).unwrap();
/// if response.status().is_success() {
///     pending.commit().unwrap();
/// }
/// println!("{:?}: {} bytes", outcome, response.body().len());
/// ```
pub struct CacheStore {
    root: PathBuf,
    transport: Box<dyn Transport>,
    policy: FreshnessPolicy,
    seen_dirs: DashSet<PathBuf>,
}

/// Builder for [`CacheStore`].
pub struct CacheStoreBuilder {
    root: PathBuf,
    transport: Option<Box<dyn Transport>>,
    policy: FreshnessPolicy,
}

impl CacheStoreBuilder {
    /// Use a custom transport instead of [`HttpTransport`].
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Replace the whole freshness policy.
    pub fn policy(mut self, policy: FreshnessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_error_version(mut self, max_error_version: u32) -> Self {
        self.policy = self.policy.with_max_error_version(max_error_version);
        self
    }

    pub fn timestamp_header(mut self, header: HeaderName) -> Self {
        self.policy = self.policy.with_timestamp_header(header);
        self
    }

    pub fn version_header(mut self, header: HeaderName) -> Self {
        self.policy = self.policy.with_version_header(header);
        self
    }

    pub fn error_statuses(mut self, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        self.policy = self.policy.with_error_statuses(statuses);
        self
    }

    /// Build the store. Without a custom transport this creates an
    /// [`HttpTransport`] with default settings.
    pub fn build(self) -> Result<CacheStore> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Box::new(HttpTransport::new()?),
        };

        Ok(CacheStore {
            root: self.root,
            transport,
            policy: self.policy,
            seen_dirs: DashSet::new(),
        })
    }
}

impl CacheStore {
    /// Start building a store rooted at `root`.
    pub fn builder(root: impl Into<PathBuf>) -> CacheStoreBuilder {
        CacheStoreBuilder {
            root: root.into(),
            transport: None,
            policy: FreshnessPolicy::default(),
        }
    }

    /// Create a store with default settings and the HTTP transport.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::builder(root).build()
    }

    /// Create a store from validated configuration, using the HTTP
    /// transport with the configured timeout and user agent.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::with_options(config.timeout(), &config.user_agent)?;

        Self::builder(&config.root)
            .policy(config.policy()?)
            .transport(transport)
            .build()
    }

    /// Get the cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> &FreshnessPolicy {
        &self.policy
    }

    /// Storage key for a URL under this store's root.
    pub fn key_for(&self, url: &Url) -> StorageKey {
        StorageKey::for_url(&self.root, url)
    }

    /// Serve `request` from cache when the stored entry passes `cutoff`,
    /// otherwise fetch it (conditionally, when an entity tag is stored).
    ///
    /// Undecodable or missing entries are treated as absent. Transport
    /// failures are returned as errors and nothing is written. A fresh
    /// response comes back with a [`PendingWrite`] the caller commits to
    /// persist it.
    pub fn fetch(
        &self,
        request: &FetchRequest,
        cutoff: FreshnessCutoff,
    ) -> Result<(CachedResponse, CacheOutcome, PendingWrite)> {
        let key = self.key_for(request.url());
        let dir_ready = self.ensure_parent(&key);

        let (cached, version) = match self.read_entry(&key, request) {
            Some(stored) => {
                let verdict = self.policy.evaluate(&stored, cutoff);
                if verdict.is_hit() {
                    debug!("Cache hit for {} ({:?})", request.url(), verdict);
                    return Ok((stored, CacheOutcome::Hit, PendingWrite::noop()));
                }
                debug!("Cache entry for {} not usable ({:?})", request.url(), verdict);
                (Some(stored), verdict.version())
            }
            None => (None, 0),
        };

        let etag = cached
            .as_ref()
            .and_then(|stored| stored.headers().get(ETAG).cloned())
            .unwrap_or_else(|| HeaderValue::from_static(""));

        let mut outbound = request.clone();
        outbound.headers_mut().insert(IF_NONE_MATCH, etag);

        let mut response = self.transport.execute(outbound)?;

        if response.status() == StatusCode::NOT_MODIFIED {
            if let Some(stored) = cached {
                debug!("{} not modified, serving stored entry", request.url());
                return Ok((stored, CacheOutcome::Revalidated, PendingWrite::noop()));
            }
            // Nothing stored to stand in for the missing body.
            return Ok((response, CacheOutcome::Miss, PendingWrite::noop()));
        }

        let next_version = version.saturating_add(1);
        response.stamp(
            self.policy.timestamp_header(),
            self.policy.version_header(),
            Utc::now(),
            next_version,
        );
        debug!(
            "Cache miss for {} -> {} (version {})",
            request.url(),
            response.status(),
            next_version
        );

        let wire = codec::serialize(&response);
        Ok((
            response,
            CacheOutcome::Miss,
            PendingWrite::new(key, wire, !dir_ready),
        ))
    }

    /// Like [`fetch`](Self::fetch) but commits the pending write immediately.
    pub fn fetch_and_store(
        &self,
        request: &FetchRequest,
        cutoff: FreshnessCutoff,
    ) -> Result<(CachedResponse, CacheOutcome)> {
        let (response, outcome, pending) = self.fetch(request, cutoff)?;
        pending.commit()?;
        Ok((response, outcome))
    }

    /// Decompressed wire bytes of the entry stored for `url`.
    pub fn raw_entry(&self, url: &Url) -> Result<Vec<u8>> {
        read_raw(&self.key_for(url))
    }

    /// Create the entry's directory once per distinct parent.
    fn ensure_parent(&self, key: &StorageKey) -> bool {
        let Some(dir) = key.parent() else {
            return true;
        };
        if self.seen_dirs.contains(dir) {
            return true;
        }

        match fs::create_dir_all(dir) {
            Ok(()) => {
                self.seen_dirs.insert(dir.to_path_buf());
                true
            }
            Err(e) => {
                warn!("Failed to create cache directory {}: {}", dir.display(), e);
                false
            }
        }
    }

    fn read_entry(&self, key: &StorageKey, request: &FetchRequest) -> Option<CachedResponse> {
        let bytes = match fs::read(key.path()) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("No cache entry at {}: {}", key, e);
                return None;
            }
        };

        match codec::decode(&bytes, request) {
            Ok(stored) => Some(stored),
            Err(e) => {
                debug!("Ignoring undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("root", &self.root)
            .field("policy", &self.policy)
            .field("seen_dirs", &self.seen_dirs.len())
            .finish_non_exhaustive()
    }
}

/// A store is itself a transport: every request is served with the unset
/// cutoff and stored immediately, so stale data is never refreshed.
impl Transport for CacheStore {
    fn execute(&self, request: FetchRequest) -> std::result::Result<CachedResponse, TransportError> {
        match self.fetch_and_store(&request, FreshnessCutoff::any()) {
            Ok((response, _)) => Ok(response),
            Err(StashError::Transport(e)) => Err(e),
            Err(e) => Err(TransportError::Failed {
                url: request.url().to_string(),
                message: e.to_string(),
            }),
        }
    }
}
