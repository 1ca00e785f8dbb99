// Feed fetcher: a single HTTP GET against the feed host, no retries

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Client error: {0}")]
    ClientError(String),

    #[error("Network error fetching {url}: {message}")]
    NetworkError { url: String, message: String },

    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Feed error: {status_code} from {url}")]
    StatusError { url: String, status_code: u16 },

    #[error("Could not read feed body from {url}: {message}")]
    BodyError { url: String, message: String },
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout_ms: u64,
    pub user_agent: String,
    // Skip HTTP(S)_PROXY from the environment
    pub no_proxy: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            user_agent: concat!("bbc_weather/", env!("CARGO_PKG_VERSION")).to_string(),
            no_proxy: false,
        }
    }
}

// Source of raw feed documents. Bodies are returned undecoded; the parser
// picks the text encoding from the XML declaration.
#[async_trait]
pub trait FeedFetcher: Send + Sync + 'static {
    async fn fetch(&self, host: &str, path: &str) -> Result<Bytes, FetchError>;
}

pub fn feed_url(host: &str, path: &str) -> String {
    format!("http://{}{}", host, path)
}

pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.as_str());
        if config.no_proxy {
            builder = builder.no_proxy();
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::ClientError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn transport_error(&self, url: &str, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_ms: self.config.timeout_ms,
            }
        } else {
            FetchError::NetworkError {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, host: &str, path: &str) -> Result<Bytes, FetchError> {
        let url = feed_url(host, path);
        debug!("Fetching feed {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::StatusError {
                url,
                status_code: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(&url, e)
            } else {
                FetchError::BodyError {
                    url: url.clone(),
                    message: e.to_string(),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed_parser::FeedParser;
    use crate::forecast::UnitSystem;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn http_response(status_line: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status_line,
            content_type,
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    const RSS_UTF8: &str = "application/rss+xml; charset=utf-8";

    // Serves one canned response, returns the address and the received request head
    async fn serve_once(response: Vec<u8>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
            }
            socket.write_all(&response).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).into_owned()
        });

        (addr, handle)
    }

    fn test_fetcher(timeout_ms: u64) -> HttpFetcher {
        HttpFetcher::new(FetcherConfig {
            timeout_ms,
            no_proxy: true,
            ..FetcherConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_feed_url() {
        assert_eq!(
            feed_url("open.live.bbc.co.uk", "/weather/feeds/en/2643743/3dayforecast.rss"),
            "http://open.live.bbc.co.uk/weather/feeds/en/2643743/3dayforecast.rss"
        );
    }

    #[test]
    fn test_default_timeout_is_ten_seconds() {
        assert_eq!(FetcherConfig::default().timeout_ms, 10_000);
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let body = "<rss><channel><title>London</title></channel></rss>";
        let (addr, server) = serve_once(http_response("200 OK", RSS_UTF8, body.as_bytes())).await;

        let fetched = test_fetcher(2_000)
            .fetch(&addr, "/weather/feeds/en/2643743/3dayforecast.rss")
            .await
            .unwrap();
        assert_eq!(&fetched[..], body.as_bytes());

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /weather/feeds/en/2643743/3dayforecast.rss HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_fetch_latin1_feed_without_charset() {
        let body = crate::feed_parser::latin1_sample_feed();
        let (addr, server) =
            serve_once(http_response("200 OK", "application/rss+xml", &body)).await;

        let fetched = test_fetcher(2_000)
            .fetch(&addr, "/weather/feeds/en/2644411/3dayforecast.rss")
            .await
            .unwrap();
        assert_eq!(&fetched[..], &body[..]);

        let record = FeedParser::new().parse(&fetched, UnitSystem::Metric).unwrap();
        assert_eq!(record.current.max_temp(), Some("20°C"));
        assert_eq!(record.current.min_temp(), Some("11°C"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let (addr, server) = serve_once(http_response("404 Not Found", RSS_UTF8, b"gone")).await;

        let err = test_fetcher(2_000)
            .fetch(&addr, "/missing.rss")
            .await
            .unwrap_err();
        match err {
            FetchError::StatusError { url, status_code } => {
                assert_eq!(status_code, 404);
                assert_eq!(url, format!("http://{}/missing.rss", addr));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = test_fetcher(2_000).fetch(&addr, "/feed.rss").await.unwrap_err();
        assert!(
            matches!(err, FetchError::NetworkError { .. }),
            "expected NetworkError, got {:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        // Accept but never answer
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let err = test_fetcher(100).fetch(&addr, "/slow.rss").await.unwrap_err();
        match err {
            FetchError::Timeout { timeout_ms, .. } => assert_eq!(timeout_ms, 100),
            other => panic!("unexpected error: {:?}", other),
        }
        server.abort();
    }
}
