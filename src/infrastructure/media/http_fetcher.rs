//! HTTP adapter for fetching media bytes.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA};
use tracing::debug;

use crate::domain::entities::MediaUrl;
use crate::domain::errors::MediaError;
use crate::domain::ports::MediaFetcherPort;

/// Default user agent sent with media requests.
pub const DEFAULT_USER_AGENT: &str = concat!("notimedia/", env!("CARGO_PKG_VERSION"));

/// Fetches images with `reqwest`.
///
/// Requests accept only image content, carry no cookies and bypass any
/// intermediate caches; the downloader keeps its own cache.
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: reqwest::Client,
}

impl HttpMediaFetcher {
    /// Creates a fetcher with the given request timeout and user agent.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, MediaError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("image/*"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| MediaError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl MediaFetcherPort for HttpMediaFetcher {
    async fn fetch(&self, url: &MediaUrl) -> Result<Bytes, MediaError> {
        debug!(url = %url, "Downloading media");

        let response = self
            .client
            .get(url.as_url().clone())
            .send()
            .await
            .map_err(|e| MediaError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Status {
                code: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| MediaError::network(format!("Failed to read body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpMediaFetcher {
        HttpMediaFetcher::new(Duration::from_secs(5), DEFAULT_USER_AGENT).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_image_only_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/avatar.png"))
            .and(header("accept", "image/*"))
            .and(header("cache-control", "no-cache"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png-bytes".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = MediaUrl::parse(&format!("{}/avatar.png", mock_server.uri())).unwrap();
        let bytes = fetcher().fetch(&url).await.unwrap();

        assert_eq!(&bytes[..], b"png-bytes");
    }

    #[tokio::test]
    async fn test_fetch_maps_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let url = MediaUrl::parse(&format!("{}/missing.png", mock_server.uri())).unwrap();
        let result = fetcher().fetch(&url).await;

        assert_eq!(result, Err(MediaError::Status { code: 404 }));
    }

    #[tokio::test]
    async fn test_fetch_reports_connection_failure() {
        // Nothing listens on a port that was just released.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = MediaUrl::parse(&format!("http://127.0.0.1:{port}/gone.png")).unwrap();
        let result = fetcher().fetch(&url).await;

        assert!(matches!(result, Err(MediaError::Network { .. })));
    }
}
