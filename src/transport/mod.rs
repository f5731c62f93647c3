//! Outbound request execution.
//!
//! The cache never talks to the network directly. It hands a [`FetchRequest`]
//! to a [`Transport`] and gets back a [`CachedResponse`] or a
//! [`TransportError`]. [`HttpTransport`] is the default implementation; tests
//! and callers that need retries or mocking plug in their own.

pub mod http;

use std::sync::Arc;
use std::time::Duration;

use ::http::header::{HeaderMap, HeaderName, HeaderValue};
use ::http::Method;
use thiserror::Error;
use url::Url;

use crate::cache::CachedResponse;

pub use self::http::HttpTransport;

/// Errors produced while executing a request.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request target could not be parsed.
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// The request deadline elapsed before a response arrived.
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// The transport failed for another reason.
    #[error("Request to {url} failed: {message}")]
    Failed { url: String, message: String },

    /// Error reported by the HTTP client.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Executes a request and returns the full response.
///
/// Non-2xx statuses are responses, not errors. Implementations only return
/// `Err` when no response could be obtained at all.
pub trait Transport: Send + Sync {
    /// Execute the request.
    fn execute(&self, request: FetchRequest) -> Result<CachedResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: FetchRequest) -> Result<CachedResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: FetchRequest) -> Result<CachedResponse, TransportError> {
        (**self).execute(request)
    }
}

/// An outbound request as seen by the cache layer.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Vec<u8>,
    timeout: Option<Duration>,
}

impl FetchRequest {
    /// Create a request for an already-parsed URL.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Vec::new(),
            timeout: None,
        }
    }

    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Parse `url` and create a request, rejecting malformed targets.
    pub fn parse(method: Method, url: &str) -> Result<Self, TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if parsed.host_str().is_none() {
            return Err(TransportError::InvalidUrl {
                url: url.to_string(),
                message: "URL has no host".to_string(),
            });
        }

        Ok(Self::new(method, parsed))
    }

    /// Set a header, replacing any existing values.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach a deadline for the outbound call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
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

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Responses to HEAD requests never carry a body.
    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    pub(crate) fn into_parts(self) -> (Method, Url, HeaderMap, Vec<u8>, Option<Duration>) {
        (self.method, self.url, self.headers, self.body, self.timeout)
    }
}
