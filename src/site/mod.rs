// src/site/mod.rs
pub mod listing;
pub mod page;

use crate::utils::error::SiteError;
use async_trait::async_trait;
use std::time::Duration;

// The documents site serves a stripped page to unknown clients.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Loads the HTML of a page. Implementations report timeouts and missing
/// pages as `SiteError`s so callers can skip the record and move on.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn load(&self, url: &str) -> Result<String, SiteError>;
}

/// Plain HTTP page loader.
pub struct HttpPageSource {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPageSource {
    pub fn new(timeout: Duration) -> Result<Self, SiteError> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .cookie_store(true)
            .build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn load(&self, url: &str) -> Result<String, SiteError> {
        tracing::debug!("Navigating to {}", url);

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| navigation_error(e, url))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("HTTP error status: {} for URL: {}", status, url);
            return Err(SiteError::Http { status, url: url.to_string() });
        }

        let body = response.text().await.map_err(|e| navigation_error(e, url))?;
        tracing::debug!("Loaded {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

fn navigation_error(e: reqwest::Error, url: &str) -> SiteError {
    if e.is_timeout() {
        SiteError::Timeout(url.to_string())
    } else {
        SiteError::Network(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn loads_page_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/doc/acme")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body>ok</body></html>")
            .create_async()
            .await;

        let source = HttpPageSource::new(Duration::from_secs(5)).unwrap();
        let body = assert_ok!(source.load(&format!("{}/doc/acme", server.url())).await);
        assert!(body.contains("ok"));
    }

    #[tokio::test]
    async fn missing_page_is_an_http_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/gone").with_status(404).create_async().await;

        let source = HttpPageSource::new(Duration::from_secs(5)).unwrap();
        let err = assert_err!(source.load(&format!("{}/gone", server.url())).await);
        assert!(matches!(err, SiteError::Http { status, .. } if status.as_u16() == 404));
    }
}
