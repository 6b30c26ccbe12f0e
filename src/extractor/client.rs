//! Async HTTP client with browser-like headers, behind the [`Fetcher`] trait so tests can stub the network.

use crate::extractor::error::ScraperError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA};
use std::time::Duration;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/114.0";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

/// Minimal GET capability used by extractors, the fetch stage, and cover download.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url` and return the body as text. Non-2xx statuses are errors.
    async fn get_text(&self, url: &str) -> Result<String, ScraperError>;

    /// GET `url` and return the raw body bytes. Non-2xx statuses are errors.
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ScraperError>;
}

/// Shared reqwest client. Cheap to clone; safe to use from concurrent fetches.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    /// Build a client with default User-Agent and timeout.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, ScraperError> {
        let response = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|source| ScraperError::Network {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn get_text(&self, url: &str) -> Result<String, ScraperError> {
        tracing::debug!(url, "GET");
        self.send(url)
            .await?
            .text()
            .await
            .map_err(|source| ScraperError::BodyRead {
                url: url.to_string(),
                source,
            })
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ScraperError> {
        tracing::debug!(url, "GET (binary)");
        let bytes = self
            .send(url)
            .await?
            .bytes()
            .await
            .map_err(|source| ScraperError::BodyRead {
                url: url.to_string(),
                source,
            })?;
        Ok(bytes.to_vec())
    }
}

/// Builder for [`HttpClient`] with optional User-Agent and timeout.
#[derive(Debug)]
pub struct HttpClientBuilder {
    user_agent: Option<String>,
    timeout_secs: u64,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl HttpClientBuilder {
    /// Set a custom User-Agent. If not set, a browser-like default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .default_headers(browser_headers())
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(HttpClient { inner })
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.8,fr;q=0.5"),
    );
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_headers_present() {
        let headers = browser_headers();
        assert!(headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/html"))
            .unwrap_or(false));
        assert!(headers.contains_key(ACCEPT_LANGUAGE));
    }

    #[test]
    fn builder_defaults() {
        let builder = HttpClient::builder();
        assert!(builder.user_agent.is_none());
        assert_eq!(builder.timeout_secs, DEFAULT_TIMEOUT_SECS);
        let builder = builder.user_agent("Custom/1.0").timeout_secs(5);
        assert_eq!(builder.user_agent.as_deref(), Some("Custom/1.0"));
        assert_eq!(builder.timeout_secs, 5);
    }

    #[test]
    fn build_succeeds() {
        assert!(HttpClient::builder().timeout_secs(1).build().is_ok());
    }
}
