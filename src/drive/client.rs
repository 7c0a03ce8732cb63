// src/drive/client.rs
use crate::drive::DocumentFetcher;
use crate::utils::error::DriveError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{header, Response, Url};
use scraper::{Html, Selector};
use std::time::Duration;

/// Cookie set by the drive host on its "can't scan this file" interstitial.
pub const DOWNLOAD_WARNING_COOKIE_PREFIX: &str = "download_warning";

/// Large annual reports take a while; five minutes is the default ceiling.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

const DRIVE_USER_AGENT: &str = concat!("report-extractor/", env!("CARGO_PKG_VERSION"));

// Newer interstitials carry the token in a hidden form field instead of a cookie.
static CONFIRM_INPUT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"input[name="confirm"]"#).expect("Failed to compile CONFIRM_INPUT_SELECTOR")
});

/// Bytes of a downloaded document plus what the server said about them.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    /// Whether the confirmation retry was needed.
    pub confirmed: bool,
}

/// Downloads files from direct-download URLs, getting past the large-file
/// interstitial with a single confirmed retry.
#[derive(Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl DriveClient {
    /// Creates a client that follows redirects and keeps cookies between the
    /// first request and the confirmation retry.
    pub fn new(timeout: Duration) -> Result<Self, DriveError> {
        let http = reqwest::Client::builder()
            .user_agent(DRIVE_USER_AGENT)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { http, timeout })
    }

    /// Downloads `url`, using the client's default timeout.
    pub async fn download_default(&self, url: &str) -> Result<DownloadedFile, DriveError> {
        self.download(url, self.timeout).await
    }

    /// Downloads `url`. Each request is bounded by `timeout`.
    pub async fn download(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<DownloadedFile, DriveError> {
        let parsed = Url::parse(url).map_err(|_| DriveError::InvalidUrl(url.to_string()))?;

        // 1. Initial request, redirects handled by the client
        tracing::debug!("Requesting {}", parsed);
        let response = self.send(parsed.clone(), timeout).await?;

        // 2. Anything that is not an HTML page is the document itself
        if !is_html(&response) {
            return into_download(response, false).await;
        }

        // 3. HTML means the confirmation interstitial; find the token
        tracing::info!("Got a download warning page for {}, confirming", url);
        let token = confirmation_token(response)
            .await?
            .ok_or_else(|| DriveError::ConfirmationTokenMissing(url.to_string()))?;

        // 4. Exactly one retry with the token
        let mut confirmed_url = parsed;
        confirmed_url.query_pairs_mut().append_pair("confirm", &token);
        let response = self.send(confirmed_url, timeout).await?;

        if is_html(&response) {
            tracing::error!("Confirmed download of {} still returned HTML", url);
            return Err(DriveError::UnexpectedHtml(url.to_string()));
        }
        into_download(response, true).await
    }

    async fn send(&self, url: Url, timeout: Duration) -> Result<Response, DriveError> {
        let response = self
            .http
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await?; // Propagates reqwest::Error as DriveError::Network

        let status = response.status();
        if !status.is_success() {
            tracing::error!("HTTP error status: {} for URL: {}", status, url);
            return Err(DriveError::Http(status));
        }
        Ok(response)
    }
}

#[async_trait]
impl DocumentFetcher for DriveClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DriveError> {
        let file = self.download_default(url).await?;
        if file.confirmed {
            let content_type = file.content_type.as_deref().unwrap_or("unknown type");
            tracing::info!("Downloaded {} after confirming ({})", url, content_type);
        }
        Ok(file.bytes)
    }
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false)
}

/// Looks for the token in the warning cookie first, then in the page's form.
async fn confirmation_token(response: Response) -> Result<Option<String>, DriveError> {
    let from_cookie = response
        .cookies()
        .find(|c| c.name().starts_with(DOWNLOAD_WARNING_COOKIE_PREFIX))
        .map(|c| c.value().to_string());
    if let Some(token) = from_cookie {
        tracing::debug!("Using confirmation token from cookie");
        return Ok(Some(token));
    }

    let body = response.text().await?;
    let document = Html::parse_document(&body);
    let from_form = document
        .select(&CONFIRM_INPUT_SELECTOR)
        .filter_map(|input| input.value().attr("value"))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string);
    if from_form.is_some() {
        tracing::debug!("Using confirmation token from the warning form");
    }
    Ok(from_form)
}

async fn into_download(response: Response, confirmed: bool) -> Result<DownloadedFile, DriveError> {
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes().await?.to_vec();
    tracing::debug!("Downloaded {} bytes ({:?})", bytes.len(), content_type);
    Ok(DownloadedFile { bytes, content_type, confirmed })
}
