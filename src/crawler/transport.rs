//! Transport seam and its HTTP implementation
//!
//! The engine only needs `Fetch(reference) -> Document | FetchError`. The
//! bundled [`HttpTransport`] covers plain HTML catalogs:
//! - Identifying user agent string
//! - Redirect following (at most 10 hops)
//! - Content-Type check (HTML only)
//! - Optional robots.txt compliance
//! - Error classification into transient and permanent failures

use crate::config::{EngineConfig, UserAgentConfig};
use crate::crawler::task::Document;
use crate::robots::RobotsCache;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const MAX_REDIRECTS: usize = 10;

/// Why a fetch produced no document
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode response body: {0}")]
    Decode(String),

    #[error("expected HTML, got '{content_type}'")]
    ContentMismatch { content_type: String },

    #[error("too many redirects: {0}")]
    Redirect(String),

    #[error("disallowed by robots.txt")]
    Disallowed,

    #[error("invalid reference: {0}")]
    InvalidReference(String),
}

impl FetchError {
    /// Returns true if retrying the same reference may succeed
    ///
    /// | Condition | Class |
    /// |-----------|-------|
    /// | HTTP 5xx, 408, 429 | transient |
    /// | Timeout, network error | transient |
    /// | Other HTTP status | permanent |
    /// | Decode, content mismatch, redirect loop | permanent |
    /// | robots.txt denial, invalid reference | permanent |
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status } => *status >= 500 || *status == 408 || *status == 429,
            Self::Timeout | Self::Network(_) => true,
            Self::Decode(_)
            | Self::ContentMismatch { .. }
            | Self::Redirect(_)
            | Self::Disallowed
            | Self::InvalidReference(_) => false,
        }
    }
}

/// Raw transport used by the fetcher pool
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches the document a reference points at
    async fn fetch(&self, reference: &str) -> Result<Document, FetchError>;
}

/// Builds an HTTP client with the harvester's identity
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::config::UserAgentConfig;
/// use sumi_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "SumiHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// HTTP transport backed by reqwest
pub struct HttpTransport {
    client: Client,
    robots: Option<RobotsCache>,
}

impl HttpTransport {
    pub fn new(user_agent: &UserAgentConfig, engine: &EngineConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, engine.per_task_timeout())?;
        let robots = engine
            .respect_robots
            .then(|| RobotsCache::new(user_agent.crawler_name.clone()));
        Ok(Self { client, robots })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, reference: &str) -> Result<Document, FetchError> {
        let url =
            Url::parse(reference).map_err(|e| FetchError::InvalidReference(e.to_string()))?;

        if let Some(robots) = &self.robots {
            if !robots.is_allowed(&self.client, &url).await {
                tracing::info!("{} disallowed by robots.txt", reference);
                return Err(FetchError::Disallowed);
            }
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !is_html(&content_type) {
            return Err(FetchError::ContentMismatch { content_type });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Decode(e.to_string())
            }
        })?;

        Ok(Document {
            reference: reference.to_string(),
            final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

fn is_html(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
}

fn classify_request_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_redirect() {
        FetchError::Redirect(error.to_string())
    } else if error.is_connect() {
        FetchError::Network(format!("connection failed: {}", error))
    } else {
        FetchError::Network(error.to_string())
    }
}
