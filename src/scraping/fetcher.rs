//! HTTP fetching
//!
//! `PageFetcher` is the seam every network read goes through: pages,
//! robots.txt, sitemaps and live-site verification. Any HTTP response is a
//! successful fetch carrying its status; only transport failures are errors,
//! so callers decide whether a 404 means skip or abort.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

use crate::config::CrawlConfig;

/// Errors that can occur during fetching
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Content too large: {0} bytes")]
    ContentTooLarge(usize),
    #[error("Failed to parse URL: {0}")]
    InvalidUrl(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result of a completed HTTP exchange
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The fetched URL (may differ from request due to redirects)
    pub final_url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: String,
    /// Time taken to fetch
    pub fetch_duration: Duration,
}

impl FetchResult {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Get a header value (case-insensitive name)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("text/html")
    }
}

/// Issues a single GET request
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchResult, FetchError>;

    /// User agent the fetcher identifies with
    fn user_agent(&self) -> &str;
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    http_client: reqwest::Client,
    user_agent: String,
    max_content_size: usize,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            http_client,
            user_agent: config.user_agent.clone(),
            max_content_size: config.max_content_size,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResult, FetchError> {
        let start = Instant::now();

        let response = self.http_client.get(url.as_str()).send().await?;

        let status = response.status();
        let final_url = Url::parse(response.url().as_str())
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();

        if let Some(len) = response.content_length() {
            if len as usize > self.max_content_size {
                return Err(FetchError::ContentTooLarge(len as usize));
            }
        }

        let body = response.text().await?;
        if body.len() > self.max_content_size {
            return Err(FetchError::ContentTooLarge(body.len()));
        }

        tracing::debug!(url = %url, status = status.as_u16(), bytes = body.len(), "fetched");

        Ok(FetchResult {
            final_url,
            status_code: status.as_u16(),
            headers,
            body,
            fetch_duration: start.elapsed(),
        })
    }

    fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: u16, headers: Vec<(&str, &str)>) -> FetchResult {
        FetchResult {
            final_url: Url::parse("https://example.com/").unwrap(),
            status_code: status,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: String::new(),
            fetch_duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_success_range() {
        assert!(result(200, vec![]).is_success());
        assert!(result(204, vec![]).is_success());
        assert!(!result(301, vec![]).is_success());
        assert!(!result(404, vec![]).is_success());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let r = result(200, vec![("Content-Type", "text/xml"), ("X-Robots-Tag", "noindex")]);
        assert_eq!(r.header("content-type"), Some("text/xml"));
        assert_eq!(r.header("x-robots-tag"), Some("noindex"));
        assert_eq!(r.content_type(), "text/xml");
    }

    #[test]
    fn test_http_fetcher_builds_from_config() {
        let fetcher = HttpFetcher::new(&CrawlConfig::default()).unwrap();
        assert!(fetcher.user_agent().starts_with("BlockMineBot"));
    }
}
