//! Storage key derivation.
//!
//! One gzip file per distinct (host, path, query), laid out as
//! `root/<host>/<path>?<query>.gz` so entries sort by host then path and
//! stay readable on disk.

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

/// Location of a cached entry on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    path: PathBuf,
}

impl StorageKey {
    /// Derive the key for a request target.
    ///
    /// Leading slashes are stripped from `path`, every `/` in path and query
    /// becomes `-`, and the file name is lower-cased. Query strings are used
    /// verbatim otherwise.
    pub fn derive(root: &Path, host: &str, path: &str, query: &str) -> Self {
        let cleaned_path = path.trim_start_matches('/').replace('/', "-");
        let cleaned_query = query.replace('/', "-");
        let file_name = format!("{}?{}.gz", cleaned_path, cleaned_query).to_lowercase();

        Self {
            path: root.join(host).join(file_name),
        }
    }

    /// Derive the key for a URL. The host segment keeps an explicit port.
    pub fn for_url(root: &Path, url: &Url) -> Self {
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };

        Self::derive(root, &host, url.path(), url.query().unwrap_or_default())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding this entry (the per-host directory).
    pub fn parent(&self) -> Option<&Path> {
        self.path.parent()
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl AsRef<Path> for StorageKey {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_joins_root_host_and_cleaned_target() {
        let key = StorageKey::derive(Path::new("/cache"), "example.com", "/a/b/c", "x=1");
        assert_eq!(key.path(), Path::new("/cache/example.com/a-b-c?x=1.gz"));
    }

    #[test]
    fn derive_lowercases_file_name() {
        let key = StorageKey::derive(Path::new("/cache"), "example.com", "/Docs/Index", "Q=ABC");
        assert_eq!(key.path(), Path::new("/cache/example.com/docs-index?q=abc.gz"));
    }

    #[test]
    fn derive_replaces_slashes_in_query() {
        let key = StorageKey::derive(Path::new("/c"), "h", "/p", "next=/a/b");
        assert_eq!(key.path(), Path::new("/c/h/p?next=-a-b.gz"));
    }

    #[test]
    fn derive_strips_all_leading_slashes() {
        let key = StorageKey::derive(Path::new("/c"), "h", "//double", "");
        assert_eq!(key.path(), Path::new("/c/h/double?.gz"));
    }

    #[test]
    fn derive_empty_path_and_query() {
        let key = StorageKey::derive(Path::new("/c"), "h", "", "");
        assert_eq!(key.path(), Path::new("/c/h/?.gz"));
    }

    #[test]
    fn derive_is_deterministic() {
        let a = StorageKey::derive(Path::new("/c"), "h", "/x/y", "z=1");
        let b = StorageKey::derive(Path::new("/c"), "h", "/x/y", "z=1");
        assert_eq!(a, b);
    }

    #[test]
    fn different_queries_have_different_keys() {
        let a = StorageKey::derive(Path::new("/c"), "h", "/x", "page=1");
        let b = StorageKey::derive(Path::new("/c"), "h", "/x", "page=2");
        assert_ne!(a, b);
    }

    #[test]
    fn query_order_is_not_canonicalized() {
        let a = StorageKey::derive(Path::new("/c"), "h", "/x", "a=1&b=2");
        let b = StorageKey::derive(Path::new("/c"), "h", "/x", "b=2&a=1");
        assert_ne!(a, b);
    }

    #[test]
    fn for_url_uses_host_path_and_query() {
        let url = Url::parse("https://Example.com/Search/Results?q=rust").unwrap();
        let key = StorageKey::for_url(Path::new("/cache"), &url);
        assert_eq!(
            key.path(),
            Path::new("/cache/example.com/search-results?q=rust.gz")
        );
    }

    #[test]
    fn for_url_keeps_explicit_port() {
        let url = Url::parse("http://127.0.0.1:8080/status").unwrap();
        let key = StorageKey::for_url(Path::new("/cache"), &url);
        assert_eq!(key.path(), Path::new("/cache/127.0.0.1:8080/status?.gz"));
    }

    #[test]
    fn for_url_root_path() {
        let url = Url::parse("http://example.com").unwrap();
        let key = StorageKey::for_url(Path::new("/cache"), &url);
        assert_eq!(key.path(), Path::new("/cache/example.com/?.gz"));
        assert_eq!(key.parent(), Some(Path::new("/cache/example.com")));
    }
}
