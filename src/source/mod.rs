//! Source acquisition: turn a page URL or a feed URL into content items.

mod feed;
mod page;

pub use feed::parse_feed_items;
pub use page::{extract_page, PageContent};

use crate::storage::ContentItem;
use crate::util::{validate_url, UrlValidationError};
use futures::StreamExt;
use thiserror::Error;

const MAX_PAGE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while acquiring source content.
#[derive(Debug, Error)]
pub enum SourceError {
    /// URL failed validation (scheme, private host)
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Feed could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else {
            SourceError::Network(err)
        }
    }
}

/// Fetches pages and feeds from the source site.
///
/// Every request is a single GET with no retry. The underlying
/// `reqwest::Client` carries the timeout and user agent.
#[derive(Clone)]
pub struct SourceClient {
    client: reqwest::Client,
    allow_private_hosts: bool,
}

impl SourceClient {
    pub fn new(client: reqwest::Client, allow_private_hosts: bool) -> Self {
        Self {
            client,
            allow_private_hosts,
        }
    }

    /// Scrape one page into a content item, or `None` on any failure.
    pub async fn fetch_by_url(&self, url: &str) -> Option<ContentItem> {
        match self.try_fetch_by_url(url).await {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to fetch content from URL");
                None
            }
        }
    }

    /// Import every entry of a feed, or an empty list on any failure.
    pub async fn fetch_by_rss(&self, feed_url: &str) -> Vec<ContentItem> {
        match self.try_fetch_by_rss(feed_url).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(url = %feed_url, error = %e, "Failed to fetch RSS feed");
                Vec::new()
            }
        }
    }

    pub async fn try_fetch_by_url(&self, url: &str) -> Result<ContentItem, SourceError> {
        let parsed = validate_url(url, self.allow_private_hosts)?;
        let bytes = self.get_limited(parsed.as_str(), MAX_PAGE_SIZE).await?;
        // Pages in legacy encodings still scrape; stray bytes become U+FFFD.
        let html = String::from_utf8_lossy(&bytes);

        let page = extract_page(&html);
        tracing::debug!(url = %url, title = %page.title, content_len = page.content.len(), "Scraped page");

        Ok(ContentItem::new(
            "page",
            page.title,
            page.content,
            page.excerpt,
            url.trim(),
            chrono::Utc::now(),
        ))
    }

    pub async fn try_fetch_by_rss(&self, feed_url: &str) -> Result<Vec<ContentItem>, SourceError> {
        let parsed = validate_url(feed_url, self.allow_private_hosts)?;
        let bytes = self.get_limited(parsed.as_str(), MAX_FEED_SIZE).await?;

        let items = parse_feed_items(&bytes)?;
        tracing::debug!(url = %feed_url, count = items.len(), "Parsed feed");
        Ok(items)
    }

    async fn get_limited(&self, url: &str, limit: usize) -> Result<Vec<u8>, SourceError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(SourceError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, limit).await
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, SourceError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(SourceError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(SourceError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
