//! HTTP client wrapper for fetching a single resource into memory.
//!
//! This module provides the `HttpClient` struct which performs one GET per
//! call with a per-attempt timeout and a hard byte ceiling. Retrying is the
//! caller's job (see [`super::retry`]).

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CONTENT_TYPE, DEFAULT_MAX_FILE_SIZE, DEFAULT_TIMEOUT,
};
use super::error::DownloadError;
use super::filename::parse_content_disposition;
use crate::user_agent;

/// Per-request settings for [`HttpClient::fetch`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Time allowed for the whole attempt, connect through last body byte.
    pub timeout: Duration,
    /// Maximum body size in bytes. Larger responses are aborted.
    pub max_size: u64,
    /// Extra headers sent with the request; they override client defaults.
    pub headers: HeaderMap,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_size: DEFAULT_MAX_FILE_SIZE,
            headers: HeaderMap::new(),
        }
    }
}

/// A fully buffered successful response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Response body.
    pub bytes: Vec<u8>,
    /// `Content-Type` header, or `application/octet-stream` when absent.
    pub content_type: String,
    /// HTTP status code (always 2xx).
    pub status: u16,
    /// URL after redirects.
    pub final_url: String,
    /// Filename from `Content-Disposition`, if the server sent one.
    pub disposition_filename: Option<String>,
}

/// HTTP client for fetching resources with size and time limits.
///
/// This client is designed to be created once and reused for every fetch in
/// a batch, taking advantage of connection pooling. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with the default connect timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. Use [`HttpClient::try_new`] to handle that case.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::try_new().expect("failed to build HTTP client with static configuration")
    }

    /// Creates a new HTTP client, surfacing builder failures.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest::Error` when the TLS backend or system
    /// configuration cannot be initialized.
    pub fn try_new() -> Result<Self, reqwest::Error> {
        Self::with_connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
    }

    /// Creates a new HTTP client with an explicit connect timeout.
    ///
    /// The total per-attempt timeout is not set here; it comes from
    /// [`FetchConfig::timeout`] on each call.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest::Error` if the client cannot be built.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self { client })
    }

    /// Fetches `url` into memory.
    ///
    /// The request is abandoned as soon as `config.timeout` elapses or the
    /// body would exceed `config.max_size`. A `Content-Length` above the cap
    /// is rejected before any body is read.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The attempt times out
    /// - The connection or body stream fails
    /// - The server returns a non-success status
    /// - The body exceeds the size cap
    #[instrument(skip(self, config), fields(url = %url))]
    pub async fn fetch(
        &self,
        url: &str,
        config: &FetchConfig,
    ) -> Result<FetchResponse, DownloadError> {
        match tokio::time::timeout(config.timeout, self.fetch_inner(url, config)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(timeout_ms = config.timeout.as_millis(), "attempt timed out");
                Err(DownloadError::timeout(url))
            }
        }
    }

    async fn fetch_inner(
        &self,
        url: &str,
        config: &FetchConfig,
    ) -> Result<FetchResponse, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(parsed)
            .headers(config.headers.clone())
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            return Err(DownloadError::http_status_with_retry_after(
                url,
                status.as_u16(),
                retry_after,
            ));
        }

        if let Some(length) = response.content_length()
            && length > config.max_size
        {
            debug!(length, max = config.max_size, "content-length exceeds cap");
            return Err(DownloadError::size_exceeded(url, config.max_size, length));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let disposition_filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_disposition);
        let final_url = response.url().to_string();
        let capacity = response
            .content_length()
            .map_or(0, |len| usize::try_from(len).unwrap_or(0));

        let bytes = read_capped(response, url, config.max_size, capacity).await?;

        debug!(bytes = bytes.len(), content_type = %content_type, "fetch complete");

        Ok(FetchResponse {
            bytes,
            content_type,
            status: status.as_u16(),
            final_url,
            disposition_filename,
        })
    }
}

/// Streams the body into memory, aborting once the running total crosses `max_size`.
async fn read_capped(
    response: reqwest::Response,
    url: &str,
    max_size: u64,
    capacity: usize,
) -> Result<Vec<u8>, DownloadError> {
    let mut stream = response.bytes_stream();
    let mut body = Vec::with_capacity(capacity);
    let mut received: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| map_reqwest_error(url, e))?;
        received += chunk.len() as u64;
        if received > max_size {
            debug!(received, max = max_size, "body exceeded cap mid-stream");
            return Err(DownloadError::size_exceeded(url, max_size, received));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

fn map_reqwest_error(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(url)
    } else if error.is_builder() {
        DownloadError::invalid_url(url)
    } else {
        DownloadError::network(url, error)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::test_support::socket_guard::{
        should_skip_socket_bound_test, start_mock_server_or_skip,
    };
    use reqwest::header::{HeaderName, HeaderValue};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn small_config(max_size: u64) -> FetchConfig {
        FetchConfig {
            max_size,
            ..FetchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_success_returns_body_and_metadata() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.7 body".to_vec()),
            )
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = format!("{}/doc.pdf", mock_server.uri());
        let response = client.fetch(&url, &FetchConfig::default()).await.unwrap();

        assert_eq!(response.bytes, b"%PDF-1.7 body");
        assert_eq!(response.content_type, "application/pdf");
        assert_eq!(response.status, 200);
        assert_eq!(response.final_url, url);
        assert!(response.disposition_filename.is_none());
    }

    #[tokio::test]
    async fn test_fetch_missing_content_type_defaults_to_octet_stream() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/blob"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"abc".to_vec(), ""))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = format!("{}/blob", mock_server.uri());
        let response = client.fetch(&url, &FetchConfig::default()).await.unwrap();
        assert_eq!(response.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_fetch_captures_content_disposition() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/download"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Disposition", r#"attachment; filename="paper.pdf""#)
                    .set_body_bytes(b"PDF".to_vec()),
            )
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = format!("{}/download", mock_server.uri());
        let response = client.fetch(&url, &FetchConfig::default()).await.unwrap();
        assert_eq!(response.disposition_filename.as_deref(), Some("paper.pdf"));
    }

    #[tokio::test]
    async fn test_fetch_404_is_http_status() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/missing.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = format!("{}/missing.pdf", mock_server.uri());
        match client.fetch(&url, &FetchConfig::default()).await {
            Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_429_records_retry_after() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = format!("{}/busy", mock_server.uri());
        let error = client
            .fetch(&url, &FetchConfig::default())
            .await
            .unwrap_err();
        assert_eq!(error.status(), Some(429));
        assert_eq!(error.retry_after(), Some("3"));
    }

    #[tokio::test]
    async fn test_fetch_content_length_over_cap_rejected_up_front() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = format!("{}/big.bin", mock_server.uri());
        match client.fetch(&url, &small_config(1024)).await {
            Err(DownloadError::SizeExceeded { limit, received, .. }) => {
                assert_eq!(limit, 1024);
                assert_eq!(received, 4096);
            }
            other => panic!("Expected SizeExceeded, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_body_exactly_at_cap_succeeds() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 1024]))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = format!("{}/exact.bin", mock_server.uri());
        let response = client.fetch(&url, &small_config(1024)).await.unwrap();
        assert_eq!(response.bytes.len(), 1024);
    }

    #[tokio::test]
    async fn test_fetch_timeout_maps_to_timeout_error() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_bytes(b"late".to_vec()),
            )
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = format!("{}/slow", mock_server.uri());
        let config = FetchConfig {
            timeout: Duration::from_millis(100),
            ..FetchConfig::default()
        };
        let error = client.fetch(&url, &config).await.unwrap_err();
        assert!(
            matches!(error, DownloadError::Timeout { .. }),
            "Expected Timeout, got: {error:?}"
        );
    }

    #[tokio::test]
    async fn test_fetch_sends_caller_headers_and_user_agent() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(header("x-harvest-token", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-harvest-token"),
            HeaderValue::from_static("abc"),
        );
        let config = FetchConfig {
            headers,
            ..FetchConfig::default()
        };

        let client = HttpClient::new();
        let url = format!("{}/with-header", mock_server.uri());
        client.fetch(&url, &config).await.unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        let ua = requests[0]
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(ua.starts_with("resource-harvester/"), "unexpected UA: {ua}");
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let client = HttpClient::new();
        let result = client.fetch("not-a-url", &FetchConfig::default()).await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_network_error() {
        if should_skip_socket_bound_test() {
            return;
        }
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = HttpClient::new();
        let url = format!("http://127.0.0.1:{port}/gone.pdf");
        let result = client.fetch(&url, &FetchConfig::default()).await;
        assert!(
            matches!(result, Err(DownloadError::Network { .. })),
            "Expected Network error, got: {result:?}"
        );
    }

    const STREAM_CHUNK: usize = 512;
    const STREAM_TOTAL: usize = 10 * 1024 * 1024;

    /// Serves one chunked response of `STREAM_TOTAL` bytes with no
    /// Content-Length, pacing the chunks. Returns the payload bytes written
    /// before the peer went away.
    async fn serve_endless_chunked(listener: tokio::net::TcpListener) -> usize {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return 0;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let head = "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nTransfer-Encoding: chunked\r\n\r\n";
        if socket.write_all(head.as_bytes()).await.is_err() {
            return 0;
        }

        let chunk = format!("{STREAM_CHUNK:x}\r\n{}\r\n", "z".repeat(STREAM_CHUNK));
        let mut sent = 0;
        while sent < STREAM_TOTAL {
            if socket.write_all(chunk.as_bytes()).await.is_err() || socket.flush().await.is_err() {
                return sent;
            }
            sent += STREAM_CHUNK;
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let _ = socket.write_all(b"0\r\n\r\n").await;
        sent
    }

    #[tokio::test]
    async fn test_fetch_chunked_body_aborted_mid_stream() {
        if should_skip_socket_bound_test() {
            return;
        }
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_endless_chunked(listener));

        let client = HttpClient::new();
        let url = format!("http://127.0.0.1:{port}/stream.bin");
        let result = client.fetch(&url, &small_config(2048)).await;

        match result {
            Err(DownloadError::SizeExceeded {
                limit, received, ..
            }) => {
                assert_eq!(limit, 2048);
                assert!(received > 2048, "received {received} should pass the limit");
                assert!(
                    received <= 2048 + STREAM_CHUNK as u64,
                    "received {received} should stop within one chunk of the limit"
                );
            }
            other => panic!("Expected SizeExceeded, got: {other:?}"),
        }

        let Ok(joined) = tokio::time::timeout(Duration::from_secs(10), server).await else {
            panic!("server should notice the dropped connection");
        };
        let sent = joined.unwrap();
        assert!(
            sent < 1024 * 1024,
            "server wrote {sent} bytes; transfer should stop long before {STREAM_TOTAL}"
        );
    }
}
