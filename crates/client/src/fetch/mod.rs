//! Network facility used by the router and the install phase.
//!
//! ### Contract
//! - A response with any HTTP status is a successful fetch; callers decide
//!   what to do with non-200 statuses.
//! - Only transport failures (connect, TLS, timeout) are errors. Those are
//!   what trigger the offline fallback chain.
//! - Bodies are read in full whatever their size.
//!
//! ### Limits
//! - Max redirects: 5

pub mod url;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, header};

pub use self::url::{UrlError, resolve, same_origin};

use swcache_core::{Destination, Error, ResourceRequest, Response, WorkerConfig};

/// Issues requests on behalf of the worker.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &ResourceRequest) -> Result<Response, Error>;
}

/// Configuration for the HTTP network client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "swcache/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "swcache/0.1".to_string(),
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&WorkerConfig> for FetchConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// `Accept` header a browser would send for this destination.
fn accept_for(destination: Destination) -> &'static str {
    match destination {
        Destination::Document => "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        Destination::Image => "image/avif,image/webp,image/png,image/svg+xml,image/*;q=0.8,*/*;q=0.5",
        Destination::Style => "text/css,*/*;q=0.1",
        Destination::Manifest => "application/manifest+json,application/json;q=0.9,*/*;q=0.8",
        _ => "*/*",
    }
}

/// HTTP network backed by reqwest.
pub struct HttpNetwork {
    http: Client,
}

impl HttpNetwork {
    /// Create a new network client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

/// Header values that are not visible ASCII are kept, decoded lossily.
fn header_pairs(headers: &header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        .collect()
}

fn map_reqwest(err: reqwest::Error) -> Error {
    if err.is_timeout() { Error::FetchTimeout(err.to_string()) } else { Error::Network(err.to_string()) }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &ResourceRequest) -> Result<Response, Error> {
        let start = Instant::now();
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {}", request.method, e)))?;

        let response = self
            .http
            .request(method, request.url.clone())
            .header(header::ACCEPT, accept_for(request.destination))
            .send()
            .await
            .map_err(map_reqwest)?;

        let status = response.status().as_u16();

        let headers = header_pairs(response.headers());
        let bytes = response.bytes().await.map_err(map_reqwest)?;

        tracing::debug!(
            url = %request.url,
            status,
            bytes = bytes.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "network fetch complete"
        );

        Ok(Response::new(status, headers, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "swcache/0.1");
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_worker_config() {
        let worker = WorkerConfig { user_agent: "site-sw/2".into(), timeout_ms: 1500, ..Default::default() };
        let config = FetchConfig::from(&worker);
        assert_eq!(config.user_agent, "site-sw/2");
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_accept_for_document() {
        assert!(accept_for(Destination::Document).starts_with("text/html"));
        assert!(accept_for(Destination::Image).starts_with("image/"));
        assert_eq!(accept_for(Destination::Other), "*/*");
    }

    #[test]
    fn test_header_pairs_keeps_non_ascii_values() {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("image/jpeg"));
        headers.insert(
            header::CONTENT_DISPOSITION,
            header::HeaderValue::from_bytes("inline; filename=\"galeria-ç.jpg\"".as_bytes()).unwrap(),
        );

        let pairs = header_pairs(&headers);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().any(|(n, v)| n == "content-type" && v == "image/jpeg"));
        assert!(
            pairs
                .iter()
                .any(|(n, v)| n == "content-disposition" && v == "inline; filename=\"galeria-ç.jpg\"")
        );
    }

    #[tokio::test]
    async fn test_http_network_new() {
        let network = HttpNetwork::new(FetchConfig::default());
        assert!(network.is_ok());
    }

    /// Serve one canned `200 OK` image response on a local port.
    async fn serve_image_once(body: Vec<u8>) -> ::url::Url {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: image/jpeg\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            let _ = socket.shutdown().await;
        });
        ::url::Url::parse(&format!("http://{addr}/images/gallery/big.jpg")).unwrap()
    }

    #[tokio::test]
    async fn test_large_body_is_a_response() {
        let body = vec![7u8; 6 * 1024 * 1024];
        let url = serve_image_once(body.clone()).await;
        let network = HttpNetwork::new(FetchConfig::default()).unwrap();

        let response = network.fetch(&ResourceRequest::get(url, Destination::Image)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type(), Some("image/jpeg"));
        assert_eq!(response.body.len(), body.len());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let network = HttpNetwork::new(FetchConfig { timeout: Duration::from_millis(500), ..Default::default() })
            .unwrap();
        let request =
            ResourceRequest::get(::url::Url::parse("http://127.0.0.1:9/nothing").unwrap(), Destination::Other);
        let err = network.fetch(&request).await.unwrap_err();
        assert!(err.is_network());
    }
}
