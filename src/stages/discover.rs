// src/stages/discover.rs
use crate::site::listing::{parse_listing, ListingCard};
use crate::site::PageSource;
use crate::storage::queue::{QueueRecord, QueueStore};
use crate::utils::error::{SiteError, StorageError};
use reqwest::Url;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_LISTING_URL: &str = "https://africanfinancials.com/kenya-listed-company-documents/";
pub const DEFAULT_DOCUMENT_TYPE: &str = "annual-reports";

/// Query parameter the listing's document-type dropdown submits.
const DOCUMENT_TYPE_PARAM: &str = "wpv-document-type";

#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    pub start_url: String,
    /// Stop after this many pages even if there is a next link.
    pub max_pages: Option<u32>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DiscoverSummary {
    pub pages: u32,
    pub records: usize,
}

/// Listing URL narrowed to one document type.
pub fn listing_start_url(
    listing_url: &str,
    document_type: Option<&str>,
) -> Result<String, SiteError> {
    let mut url =
        Url::parse(listing_url).map_err(|_| SiteError::InvalidUrl(listing_url.to_string()))?;
    if let Some(doc_type) = document_type.map(str::trim).filter(|t| !t.is_empty()) {
        url.query_pairs_mut().append_pair(DOCUMENT_TYPE_PARAM, doc_type);
    }
    Ok(url.into())
}

/// `annual_reports_queue_<timestamp>.csv` in `dir`.
pub fn default_queue_path(dir: &Path) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("annual_reports_queue_{}.csv", timestamp))
}

impl From<ListingCard> for QueueRecord {
    fn from(card: ListingCard) -> Self {
        QueueRecord::new(card.title, card.document_url, card.company_url, card.page_number)
    }
}

/// Walks the paginated listing and writes every card to a new queue file at
/// `output`, one page at a time. A page that fails to load ends the walk;
/// everything saved up to that point stays in the file.
pub async fn run_discovery(
    source: &dyn PageSource,
    output: &Path,
    options: &DiscoverOptions,
) -> Result<DiscoverSummary, StorageError> {
    QueueStore::create(output)?;
    tracing::info!("Created {}", output.display());

    let mut summary = DiscoverSummary::default();
    let mut visited = HashSet::new();
    let mut current = options.start_url.clone();
    let mut page_number: u32 = 1;

    loop {
        tracing::info!("--- Processing page {} ---", page_number);
        visited.insert(current.clone());

        let page_url = match Url::parse(&current) {
            Ok(url) => url,
            Err(_) => {
                tracing::error!("Invalid listing URL {}, ending discovery", current);
                break;
            }
        };
        let html = match source.load(&current).await {
            Ok(html) => html,
            Err(e) => {
                tracing::error!(
                    "Could not load page {} ({}): {}. Ending discovery",
                    page_number,
                    current,
                    e
                );
                break;
            }
        };

        let listing = parse_listing(&html, &page_url, page_number);
        if listing.cards.is_empty() {
            tracing::info!("No cards on page {}. Reached the end of the list", page_number);
            break;
        }

        let records: Vec<QueueRecord> = listing.cards.into_iter().map(QueueRecord::from).collect();
        QueueStore::append(output, &records)?;
        summary.pages += 1;
        summary.records += records.len();
        tracing::info!("Saved {} reports from page {}", records.len(), page_number);

        if options.max_pages.is_some_and(|max| summary.pages >= max) {
            tracing::info!("Reached the page limit ({})", summary.pages);
            break;
        }
        match listing.next_url {
            Some(next) if visited.contains(&next) => {
                tracing::warn!("Next link points back to {}, stopping", next);
                break;
            }
            Some(next) => {
                current = next;
                page_number += 1;
            }
            None => {
                tracing::info!("No 'Next' link found. Reached the end of the list");
                break;
            }
        }
    }

    tracing::info!("Harvest complete: {} records from {} pages", summary.records, summary.pages);
    Ok(summary)
}
