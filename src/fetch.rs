//! Upstream byte fetching.
//!
//! [`Fetch`] is the capability the interception controller uses to reach the
//! origin and the caption hosts. [`HttpFetcher`] is the reqwest-backed
//! implementation: every attempt runs under a deadline, and failed attempts
//! can optionally be retried with a fixed backoff.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header::HeaderMap};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default number of fetch attempts. Retrying is left to the player.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

/// Default backoff between attempts in milliseconds.
pub const DEFAULT_BACKOFF_MS: u64 = 500;

/// Default per-attempt deadline in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Transport-level fetch failure.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} did not respond within {timeout:?}")]
    Timeout { url: String, timeout: Duration },
}

/// A single upstream GET: target URL plus the headers to send with it.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub headers: HeaderMap,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Asynchronous byte fetch, completed exactly once per call.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<Bytes, FetchError>;
}

/// Configuration for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts (minimum 1; 0 is treated as 1).
    pub max_attempts: u32,
    /// Sleep duration between consecutive attempts.
    pub backoff: Duration,
    /// Deadline applied to each individual attempt, body included.
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// [`Fetch`] over a shared, pooled reqwest [`Client`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry: RetryConfig,
}

impl HttpFetcher {
    /// Build a fetcher with its own connection pool.
    pub fn new(retry: RetryConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self::with_client(client, retry))
    }

    pub fn with_client(client: Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    async fn attempt(&self, request: &FetchRequest) -> Result<Bytes, FetchError> {
        let classify = |source: reqwest::Error| {
            if source.is_timeout() {
                FetchError::Timeout {
                    url: request.url.clone(),
                    timeout: self.retry.timeout,
                }
            } else {
                FetchError::Request {
                    url: request.url.clone(),
                    source,
                }
            }
        };

        let response = self
            .client
            .get(&request.url)
            .headers(request.headers.clone())
            .timeout(self.retry.timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(classify)
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Bytes, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(request).await {
                Ok(body) => {
                    debug!("Fetched {} bytes from {}", body.len(), request.url);
                    return Ok(body);
                }
                Err(e) if attempt < max_attempts => {
                    warn!(
                        "HTTP fetch failed (attempt {}/{}): {}; retrying in {}ms",
                        attempt,
                        max_attempts,
                        e,
                        self.retry.backoff.as_millis()
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        "HTTP fetch failed (attempt {}/{}): {}",
                        attempt, max_attempts, e
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            backoff: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn retry_config_defaults() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(cfg.backoff, Duration::from_millis(DEFAULT_BACKOFF_MS));
        assert_eq!(cfg.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[tokio::test]
    async fn returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/en.vtt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("WEBVTT"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(fast_retry(1)).unwrap();
        let body = fetcher
            .fetch(&FetchRequest::get(format!("{}/en.vtt", server.uri())))
            .await
            .unwrap();
        assert_eq!(&body[..], b"WEBVTT");
    }

    #[tokio::test]
    async fn forwards_request_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("x-playback-token", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U"))
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-playback-token", HeaderValue::from_static("abc123"));

        let fetcher = HttpFetcher::new(fast_retry(1)).unwrap();
        let body = fetcher
            .fetch(&FetchRequest::get(server.uri()).with_headers(headers))
            .await
            .unwrap();
        assert_eq!(&body[..], b"#EXTM3U");
    }

    #[tokio::test]
    async fn non_success_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(fast_retry(1)).unwrap();
        let err = fetcher
            .fetch(&FetchRequest::get(server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn retries_on_server_error_then_succeeds() {
        let server = MockServer::start().await;

        // 200 fallback (lower priority, mounted first)
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        // 500 on first hit (higher priority, deactivates after 1)
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(fast_retry(2)).unwrap();
        let body = fetcher
            .fetch(&FetchRequest::get(server.uri()))
            .await
            .unwrap();
        assert_eq!(&body[..], b"recovered");
    }

    #[tokio::test]
    async fn deadline_expiry_is_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(RetryConfig {
            max_attempts: 1,
            backoff: Duration::from_millis(1),
            timeout: Duration::from_millis(50),
        })
        .unwrap();

        let err = fetcher
            .fetch(&FetchRequest::get(server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }), "got {:?}", err);
    }
}
