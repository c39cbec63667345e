//! Upstream HTTP client

use crate::{RelayError, RelayResult};
use reqwest::{Client, ClientBuilder, Response};
use std::time::Duration;
use tracing::debug;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Connection timeout in seconds
    /// Note: no overall request timeout is set, it would cut long sessions mid-stream.
    pub connect_timeout_secs: u64,

    /// Maximum number of idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Idle connections are dropped from the pool after this many seconds
    pub pool_idle_timeout_secs: u64,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 32,
            pool_idle_timeout_secs: 90,
            user_agent: format!("StageRelay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Create a configured HTTP client with connection pooling
pub fn create_client(config: &HttpClientConfig) -> RelayResult<Client> {
    ClientBuilder::new()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
        .user_agent(&config.user_agent)
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Connection to the emitter's `/analyze` endpoint
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>, config: &HttpClientConfig) -> RelayResult<Self> {
        Ok(Self::with_client(create_client(config)?, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open one upstream session.
    ///
    /// Fails before any body bytes are read when the upstream is unreachable
    /// or answers with a non-success status.
    pub async fn connect(&self, text: &str) -> RelayResult<Response> {
        debug!("Opening upstream session at {}/analyze", self.base_url);

        let response = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .header("Accept", "text/event-stream")
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        debug!("Upstream status: {}", response.status());

        if !response.status().is_success() {
            return Err(RelayError::UpstreamStatus {
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_config() {
        let config = HttpClientConfig::default();
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.pool_max_idle_per_host, 32);
        assert_eq!(config.pool_idle_timeout_secs, 90);
        assert!(config.user_agent.starts_with("StageRelay/"));
    }

    #[test]
    fn test_create_client() {
        assert!(create_client(&HttpClientConfig::default()).is_ok());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = UpstreamClient::new("http://localhost:3002/", &HttpClientConfig::default()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3002");
    }

    #[tokio::test]
    async fn test_connect_posts_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(body_json(serde_json::json!({ "text": "hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_raw("event: done\ndata: {}\n\n", "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let client = UpstreamClient::new(server.uri(), &HttpClientConfig::default()).unwrap();
        let response = client.connect("hello").await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_connect_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = UpstreamClient::new(server.uri(), &HttpClientConfig::default()).unwrap();
        let err = client.connect("hello").await.unwrap_err();
        assert!(matches!(err, RelayError::UpstreamStatus { status: 500 }));
    }

    #[tokio::test]
    async fn test_connect_unreachable_upstream() {
        // Bind then release a port so nothing listens on it
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = UpstreamClient::new(
            format!("http://127.0.0.1:{}", port),
            &HttpClientConfig::default(),
        )
        .unwrap();
        let err = client.connect("hello").await.unwrap_err();
        assert!(matches!(err, RelayError::Connection(_)));
    }
}
