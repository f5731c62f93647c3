//! Integration tests for the cache store public API.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use http::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, ETAG, IF_NONE_MATCH};
use http::{Method, StatusCode};
use httpstash::cache::{CacheOutcome, CacheStore, CachedResponse, FreshnessCutoff};
use httpstash::transport::{FetchRequest, HttpTransport, Transport, TransportError};
use httpstash::StashError;
use tempfile::TempDir;

/// Origin stand-in that counts requests and answers with a fixed response.
/// Requests carrying its entity tag get `304 Not Modified`.
struct CountingOrigin {
    status: StatusCode,
    body: String,
    etag: Option<&'static str>,
    declares_length: bool,
    calls: AtomicUsize,
    conditional: Mutex<Vec<String>>,
}

impl CountingOrigin {
    fn new(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
            etag: None,
            declares_length: false,
            calls: AtomicUsize::new(0),
            conditional: Mutex::new(Vec::new()),
        })
    }

    fn with_etag(status: u16, body: &str, etag: &'static str) -> Arc<Self> {
        Arc::new(Self {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
            etag: Some(etag),
            declares_length: false,
            calls: AtomicUsize::new(0),
            conditional: Mutex::new(Vec::new()),
        })
    }

    /// Like [`CountingOrigin::new`] but sends a `Content-Length` header.
    fn declaring_length(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
            etag: None,
            declares_length: true,
            calls: AtomicUsize::new(0),
            conditional: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for CountingOrigin {
    fn execute(&self, request: FetchRequest) -> Result<CachedResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let sent = request
            .headers()
            .get(IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.conditional.lock().unwrap().push(sent.clone());

        let mut headers = HeaderMap::new();
        if let Some(etag) = self.etag {
            headers.insert(ETAG, HeaderValue::from_static(etag));
            if sent == etag {
                return Ok(CachedResponse::new(StatusCode::NOT_MODIFIED, headers, Vec::new()));
            }
        }
        if self.declares_length {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(self.body.len()));
        }
        Ok(CachedResponse::new(self.status, headers, self.body.clone()))
    }
}

struct FailingOrigin;

impl Transport for FailingOrigin {
    fn execute(&self, request: FetchRequest) -> Result<CachedResponse, TransportError> {
        Err(TransportError::Failed {
            url: request.url().to_string(),
            message: "connection refused".to_string(),
        })
    }
}

fn store(temp: &TempDir, origin: Arc<CountingOrigin>, max_error_version: u32) -> CacheStore {
    CacheStore::builder(temp.path())
        .transport(origin)
        .max_error_version(max_error_version)
        .build()
        .unwrap()
}

fn get(url: &str) -> FetchRequest {
    FetchRequest::parse(Method::GET, url).unwrap()
}

#[test]
fn second_fetch_is_served_from_disk() {
    let temp = TempDir::new().unwrap();
    let origin = CountingOrigin::new(200, "hello, world");
    let store = store(&temp, Arc::clone(&origin), 3);
    let req = get("http://example.com/greeting");

    let (first, outcome) = store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap();
    assert_eq!(outcome, CacheOutcome::Miss);

    let (second, outcome) = store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap();
    assert_eq!(outcome, CacheOutcome::Hit);
    assert_eq!(second.body(), first.body());
    assert_eq!(origin.calls(), 1);
}

#[test]
fn cutoff_of_now_forces_refetch() {
    let temp = TempDir::new().unwrap();
    let origin = CountingOrigin::new(200, "hello, world");
    let store = store(&temp, Arc::clone(&origin), 3);
    let req = get("http://example.com/greeting");

    store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap();
    let (response, outcome) = store.fetch_and_store(&req, FreshnessCutoff::now()).unwrap();

    assert_eq!(outcome, CacheOutcome::Miss);
    assert_eq!(origin.calls(), 2);
    // A stale refetch continues the stored version.
    assert_eq!(response.version(store.policy().version_header()), Ok(2));
}

#[test]
fn endpoints_are_cached_independently() {
    let temp = TempDir::new().unwrap();
    let origin = CountingOrigin::new(200, "hello, world");
    let store = store(&temp, Arc::clone(&origin), 3);

    store
        .fetch_and_store(&get("http://example.com/a"), FreshnessCutoff::any())
        .unwrap();
    store
        .fetch_and_store(&get("http://example.com/b"), FreshnessCutoff::any())
        .unwrap();
    assert_eq!(origin.calls(), 2);

    store
        .fetch_and_store(&get("http://example.com/a"), FreshnessCutoff::any())
        .unwrap();
    store
        .fetch_and_store(&get("http://example.com/b"), FreshnessCutoff::any())
        .unwrap();
    assert_eq!(origin.calls(), 2);
}

#[test]
fn error_responses_are_retried_until_capped() {
    let temp = TempDir::new().unwrap();
    let origin = CountingOrigin::new(500, "Internal Server Error");
    let store = store(&temp, Arc::clone(&origin), 2);
    let req = get("http://example.com/flaky");

    for expected_version in 1..=3 {
        let (response, outcome) = store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap();
        assert_eq!(outcome, CacheOutcome::Miss);
        assert_eq!(
            response.version(store.policy().version_header()),
            Ok(expected_version)
        );
    }

    // Past the cap the error sticks, whatever the cutoff.
    let (response, outcome) = store.fetch_and_store(&req, FreshnessCutoff::now()).unwrap();
    assert_eq!(outcome, CacheOutcome::Hit);
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(origin.calls(), 3);
}

#[test]
fn non_error_statuses_are_not_retried() {
    let temp = TempDir::new().unwrap();
    let origin = CountingOrigin::new(404, "Not Found: no such page");
    let store = store(&temp, Arc::clone(&origin), 2);
    let req = get("http://example.com/missing");

    store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap();
    let (_, outcome) = store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap();

    assert_eq!(outcome, CacheOutcome::Hit);
    assert_eq!(origin.calls(), 1);
}

#[test]
fn corrupted_entry_is_refetched() {
    let temp = TempDir::new().unwrap();
    let origin = CountingOrigin::new(200, "hello, world");
    let store = store(&temp, Arc::clone(&origin), 3);
    let req = get("http://example.com/corrupt");

    let key = store.key_for(req.url());
    fs::create_dir_all(key.parent().unwrap()).unwrap();
    fs::write(key.path(), b"definitely not gzip").unwrap();

    let (response, outcome) = store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap();
    assert_eq!(outcome, CacheOutcome::Miss);
    assert_eq!(response.body(), b"hello, world");
    assert_eq!(origin.calls(), 1);

    let (_, outcome) = store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap();
    assert_eq!(outcome, CacheOutcome::Hit);
}

#[test]
fn short_error_body_without_length_is_capped() {
    let temp = TempDir::new().unwrap();
    let origin = CountingOrigin::new(502, "oops");
    let store = store(&temp, Arc::clone(&origin), 2);
    let req = get("http://example.com/gateway");

    let outcomes: Vec<_> = (0..6)
        .map(|_| store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap().1)
        .collect();

    assert_eq!(
        outcomes,
        vec![
            CacheOutcome::Miss,
            CacheOutcome::Miss,
            CacheOutcome::Miss,
            CacheOutcome::Hit,
            CacheOutcome::Hit,
            CacheOutcome::Hit,
        ]
    );
    assert_eq!(origin.calls(), 3);
}

#[test]
fn short_body_without_length_is_served_from_cache() {
    let temp = TempDir::new().unwrap();
    let origin = CountingOrigin::new(200, "tiny");
    let store = store(&temp, Arc::clone(&origin), 3);
    let req = get("http://example.com/tiny");

    store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap();
    let (response, outcome) = store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap();

    assert_eq!(outcome, CacheOutcome::Hit);
    assert_eq!(response.body(), b"tiny");
    assert_eq!(origin.calls(), 1);
}

#[test]
fn short_declared_length_is_never_served_from_cache() {
    let temp = TempDir::new().unwrap();
    let origin = CountingOrigin::declaring_length(200, "tiny");
    let store = store(&temp, Arc::clone(&origin), 3);
    let req = get("http://example.com/tiny");

    store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap();
    let (_, outcome) = store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap();

    assert_eq!(outcome, CacheOutcome::Miss);
    assert_eq!(origin.calls(), 2);
}

#[test]
fn not_modified_serves_stored_body() {
    let temp = TempDir::new().unwrap();
    let origin = CountingOrigin::with_etag(200, "versioned content", "\"v1\"");
    let store = store(&temp, Arc::clone(&origin), 3);
    let req = get("http://example.com/etagged");

    store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap();
    let (response, outcome) = store.fetch_and_store(&req, FreshnessCutoff::now()).unwrap();

    assert_eq!(outcome, CacheOutcome::Revalidated);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body(), b"versioned content");
    assert_eq!(*origin.conditional.lock().unwrap(), vec!["", "\"v1\""]);
}

#[test]
fn not_modified_without_stored_entry_is_a_miss() {
    let temp = TempDir::new().unwrap();
    // An empty tag matches the empty If-None-Match sent for an empty cache.
    let origin = CountingOrigin::with_etag(200, "never returned", "");
    let store = store(&temp, Arc::clone(&origin), 3);
    let req = get("http://example.com/odd");

    let (response, outcome, pending) = store.fetch(&req, FreshnessCutoff::any()).unwrap();

    assert_eq!(outcome, CacheOutcome::Miss);
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert!(response.body().is_empty());
    assert!(pending.is_noop());
    pending.commit().unwrap();
    assert!(!store.key_for(req.url()).path().exists());
}

#[test]
fn transport_errors_propagate_and_write_nothing() {
    let temp = TempDir::new().unwrap();
    let store = CacheStore::builder(temp.path())
        .transport(FailingOrigin)
        .build()
        .unwrap();
    let req = get("http://example.com/down");

    let result = store.fetch(&req, FreshnessCutoff::any());

    assert!(matches!(
        result,
        Err(StashError::Transport(TransportError::Failed { .. }))
    ));
    assert!(!store.key_for(req.url()).path().exists());
}

#[test]
fn uncommitted_response_is_not_cached() {
    let temp = TempDir::new().unwrap();
    let origin = CountingOrigin::new(200, "hello, world");
    let store = store(&temp, Arc::clone(&origin), 3);
    let req = get("http://example.com/discarded");

    let (_, _, pending) = store.fetch(&req, FreshnessCutoff::any()).unwrap();
    drop(pending);

    let (_, outcome, _) = store.fetch(&req, FreshnessCutoff::any()).unwrap();
    assert_eq!(outcome, CacheOutcome::Miss);
    assert_eq!(origin.calls(), 2);
}

#[test]
fn concurrent_fetches_share_one_store() {
    let temp = TempDir::new().unwrap();
    let origin = CountingOrigin::new(200, "hello, world");
    let store = Arc::new(store(&temp, Arc::clone(&origin), 3));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let req = get(&format!("http://host{}.example.com/item?n={}", i % 2, i));
                store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap()
            })
        })
        .collect();

    for handle in handles {
        let (response, outcome) = handle.join().unwrap();
        assert_eq!(outcome, CacheOutcome::Miss);
        assert_eq!(response.body(), b"hello, world");
    }
    assert_eq!(origin.calls(), 8);
    assert!(temp.path().join("host0.example.com").is_dir());
    assert!(temp.path().join("host1.example.com").is_dir());
}

#[test]
fn http_transport_revalidates_with_etag() {
    use httpmock::prelude::*;

    let server = MockServer::start();
    let mut first = server.mock(|when, then| {
        when.method(GET).path("/doc");
        then.status(200)
            .header("etag", "\"rev-7\"")
            .body("document body v7");
    });

    let temp = TempDir::new().unwrap();
    let store = CacheStore::builder(temp.path())
        .transport(HttpTransport::new().unwrap())
        .build()
        .unwrap();
    let req = get(&server.url("/doc"));

    let (_, outcome) = store.fetch_and_store(&req, FreshnessCutoff::any()).unwrap();
    assert_eq!(outcome, CacheOutcome::Miss);
    first.assert();
    first.delete();

    let revalidate = server.mock(|when, then| {
        when.method(GET)
            .path("/doc")
            .header("if-none-match", "\"rev-7\"");
        then.status(304);
    });

    let (response, outcome) = store.fetch_and_store(&req, FreshnessCutoff::now()).unwrap();
    assert_eq!(outcome, CacheOutcome::Revalidated);
    assert_eq!(response.text(), "document body v7");
    revalidate.assert();
}
