//! Blocking HTTP transport.
//!
//! Executes [`FetchRequest`]s with a `reqwest` blocking client. Every status
//! is returned as a response; only connection-level failures are errors.

use reqwest::blocking::Client;
use std::time::Duration;

use ::http::header::TRANSFER_ENCODING;

use super::{FetchRequest, Transport, TransportError};
use crate::cache::CachedResponse;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes requests over HTTP/HTTPS.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with the default 30-second timeout.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a transport with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        Self::with_options(timeout, "httpstash")
    }

    /// Create a transport with a custom timeout and user agent.
    pub fn with_options(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, timeout })
    }

    /// Get the configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: FetchRequest) -> Result<CachedResponse, TransportError> {
        let (method, url, headers, body, timeout) = request.into_parts();
        let target = url.to_string();

        let mut builder = self.client.request(method, url).headers(headers);
        if !body.is_empty() {
            builder = builder.body(body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().map_err(|e| classify(e, &target))?;

        let status = response.status();
        let mut headers = response.headers().clone();
        // The body below is already de-framed.
        headers.remove(TRANSFER_ENCODING);

        let body = response.bytes().map_err(|e| classify(e, &target))?;

        tracing::debug!("Fetched {} -> {}", target, status);

        Ok(CachedResponse::new(status, headers, body.to_vec()))
    }
}

fn classify(error: reqwest::Error, url: &str) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Http(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::http::{Method, StatusCode};
    use httpmock::prelude::*;

    #[test]
    fn default_timeout_is_30_seconds() {
        let transport = HttpTransport::new().unwrap();
        assert_eq!(transport.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn custom_timeout() {
        let transport = HttpTransport::with_timeout(Duration::from_secs(60)).unwrap();
        assert_eq!(transport.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn execute_returns_status_headers_and_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/page").query_param("q", "1");
            then.status(200)
                .header("etag", "\"v1\"")
                .body("page contents here");
        });

        let transport = HttpTransport::new().unwrap();
        let request = FetchRequest::parse(Method::GET, &server.url("/page?q=1")).unwrap();
        let response = transport.execute(request).unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.etag(), Some("\"v1\""));
        assert_eq!(response.body(), b"page contents here");
        mock.assert();
    }

    #[test]
    fn execute_returns_error_statuses_as_responses() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/broken");
            then.status(503).body("Service Unavailable");
        });

        let transport = HttpTransport::new().unwrap();
        let request = FetchRequest::parse(Method::GET, &server.url("/broken")).unwrap();
        let response = transport.execute(request).unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body(), b"Service Unavailable");
    }

    #[test]
    fn execute_forwards_request_headers() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/conditional")
                .header("if-none-match", "\"abc\"");
            then.status(304);
        });

        let transport = HttpTransport::new().unwrap();
        let request = FetchRequest::parse(Method::GET, &server.url("/conditional"))
            .unwrap()
            .with_header(
                ::http::header::IF_NONE_MATCH,
                ::http::HeaderValue::from_static("\"abc\""),
            );
        let response = transport.execute(request).unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        mock.assert();
    }

    #[test]
    fn execute_reports_connection_failure() {
        let transport = HttpTransport::with_timeout(Duration::from_secs(2)).unwrap();
        // Port 9 (discard) is not expected to accept HTTP on loopback.
        let request = FetchRequest::parse(Method::GET, "http://127.0.0.1:9/").unwrap();

        assert!(transport.execute(request).is_err());
    }
}
