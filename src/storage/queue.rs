// src/storage/queue.rs
use crate::utils::error::StorageError;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

pub const COL_TITLE: &str = "title";
pub const COL_DOCUMENT_URL: &str = "document_url";
pub const COL_COMPANY_URL: &str = "company_url";
pub const COL_PAGE_NUMBER: &str = "page_number";
pub const COL_DIRECT_DOWNLOAD_URL: &str = "direct_download_url";
pub const COL_STATUS: &str = "status";

/// Column order of a queue written from scratch.
pub const CANONICAL_COLUMNS: [&str; 6] = [
    COL_TITLE,
    COL_DOCUMENT_URL,
    COL_COMPANY_URL,
    COL_PAGE_NUMBER,
    COL_DIRECT_DOWNLOAD_URL,
    COL_STATUS,
];

/// Where a record stands in the resolution stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// Not attempted yet.
    Pending,
    /// `direct_download_url` is set.
    Resolved,
    /// The page loaded but its viewer had no extractable file id.
    Unresolvable,
    /// Navigation or element lookup failed; worth another try.
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Resolved => "resolved",
            RecordStatus::Unresolvable => "unresolvable",
            RecordStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(RecordStatus::Pending),
            "resolved" => Some(RecordStatus::Resolved),
            "unresolvable" => Some(RecordStatus::Unresolvable),
            "failed" => Some(RecordStatus::Failed),
            _ => None,
        }
    }
}

/// One discovered document.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRecord {
    pub title: String,
    pub document_url: String,
    pub company_url: Option<String>,
    pub page_number: u32,
    pub direct_download_url: Option<String>,
    pub status: RecordStatus,
    /// Columns this tool does not know about, keyed by header.
    pub extra: BTreeMap<String, String>,
}

impl QueueRecord {
    pub fn new(
        title: impl Into<String>,
        document_url: impl Into<String>,
        company_url: Option<String>,
        page_number: u32,
    ) -> Self {
        Self {
            title: title.into(),
            document_url: document_url.into(),
            company_url,
            page_number,
            direct_download_url: None,
            status: RecordStatus::Pending,
            extra: BTreeMap::new(),
        }
    }

    /// A record with a download URL is never resolved again. Unresolvable
    /// ones are only retried on request.
    pub fn needs_resolution(&self, retry_unresolvable: bool) -> bool {
        if self.direct_download_url.is_some() {
            return false;
        }
        match self.status {
            RecordStatus::Unresolvable => retry_unresolvable,
            _ => true,
        }
    }

    fn field(&self, column: &str) -> String {
        match column {
            COL_TITLE => self.title.clone(),
            COL_DOCUMENT_URL => self.document_url.clone(),
            COL_COMPANY_URL => self.company_url.clone().unwrap_or_default(),
            COL_PAGE_NUMBER => self.page_number.to_string(),
            COL_DIRECT_DOWNLOAD_URL => self.direct_download_url.clone().unwrap_or_default(),
            COL_STATUS => self.status.as_str().to_string(),
            other => self.extra.get(other).cloned().unwrap_or_default(),
        }
    }
}

/// A queue file held in memory: header order plus records.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueTable {
    headers: Vec<String>,
    pub records: Vec<QueueRecord>,
}

impl Default for QueueTable {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl QueueTable {
    /// A table with the canonical column order.
    pub fn new(records: Vec<QueueRecord>) -> Self {
        Self {
            headers: CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            records,
        }
    }

    /// Same header as `self`, different records.
    pub fn with_records(&self, records: Vec<QueueRecord>) -> Self {
        Self { headers: self.headers.clone(), records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Input header order, with any canonical column it lacked appended.
    pub fn output_headers(&self) -> Vec<String> {
        let mut headers = self.headers.clone();
        for column in CANONICAL_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                headers.push(column.to_string());
            }
        }
        headers
    }
}

/// Reads and writes queue CSV files.
pub struct QueueStore;

impl QueueStore {
    /// Loads a queue file. A missing file is `StorageError::NotFound`.
    pub fn load(path: &Path) -> Result<QueueTable, StorageError> {
        if !path.exists() {
            return Err(StorageError::NotFound(path.to_path_buf()));
        }

        let mut reader = csv::Reader::from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

        let index_of = |name: &str| headers.iter().position(|h| h == name);
        let missing = |column: &str| {
            StorageError::SerializationError(format!(
                "{}: missing '{}' column",
                path.display(),
                column
            ))
        };
        let title_idx = index_of(COL_TITLE).ok_or_else(|| missing(COL_TITLE))?;
        let doc_idx = index_of(COL_DOCUMENT_URL).ok_or_else(|| missing(COL_DOCUMENT_URL))?;
        let company_idx = index_of(COL_COMPANY_URL);
        let page_idx = index_of(COL_PAGE_NUMBER);
        let url_idx = index_of(COL_DIRECT_DOWNLOAD_URL);
        let status_idx = index_of(COL_STATUS);

        let mut records = Vec::new();
        for (row_no, row) in reader.records().enumerate() {
            let row = row?;
            let get = |idx: Option<usize>| {
                idx.and_then(|i| row.get(i))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };

            let page_number = match get(page_idx) {
                Some(raw) => parse_page_number(&raw).ok_or_else(|| {
                    StorageError::SerializationError(format!(
                        "{}: row {}: invalid page_number '{}'",
                        path.display(),
                        row_no + 1,
                        raw
                    ))
                })?,
                None => 0,
            };

            let direct_download_url = get(url_idx);
            let status = match get(status_idx) {
                Some(raw) => RecordStatus::parse(&raw).unwrap_or_else(|| {
                    tracing::warn!(
                        "Row {}: unknown status '{}', inferring from the row",
                        row_no + 1,
                        raw
                    );
                    inferred_status(direct_download_url.is_some())
                }),
                None => inferred_status(direct_download_url.is_some()),
            };

            let extra = headers
                .iter()
                .enumerate()
                .filter(|(_, h)| !CANONICAL_COLUMNS.contains(&h.as_str()))
                .map(|(i, h)| (h.clone(), row.get(i).unwrap_or_default().to_string()))
                .collect();

            records.push(QueueRecord {
                title: get(Some(title_idx)).unwrap_or_default(),
                document_url: get(Some(doc_idx)).unwrap_or_default(),
                company_url: get(company_idx),
                page_number,
                direct_download_url,
                status,
                extra,
            });
        }

        tracing::debug!("Loaded {} records from {}", records.len(), path.display());
        Ok(QueueTable { headers, records })
    }

    /// Like [`QueueStore::load`], but reports the error and returns an empty table.
    pub fn load_or_empty(path: &Path) -> QueueTable {
        match Self::load(path) {
            Ok(table) => table,
            Err(e) => {
                tracing::error!("Could not read queue {}: {}", path.display(), e);
                QueueTable::default()
            }
        }
    }

    /// Rewrites the whole file. The new content goes to a sibling temp file
    /// first, so an interrupted save leaves the previous checkpoint intact.
    pub fn save(path: &Path, table: &QueueTable) -> Result<(), StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = temp_path_for(path);
        {
            let mut writer = csv::Writer::from_path(&tmp_path)?;
            let headers = table.output_headers();
            writer.write_record(&headers)?;
            for record in &table.records {
                writer.write_record(headers.iter().map(|h| record.field(h)))?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)?;

        tracing::debug!("Saved {} records to {}", table.len(), path.display());
        Ok(())
    }

    /// Starts a new queue file containing only the canonical header.
    pub fn create(path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(CANONICAL_COLUMNS)?;
        writer.flush()?;
        Ok(())
    }

    /// Appends records to a file started by [`QueueStore::create`].
    pub fn append(path: &Path, records: &[QueueRecord]) -> Result<(), StorageError> {
        let file = OpenOptions::new().append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        for record in records {
            writer.write_record(CANONICAL_COLUMNS.iter().map(|c| record.field(c)))?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn inferred_status(has_url: bool) -> RecordStatus {
    if has_url {
        RecordStatus::Resolved
    } else {
        RecordStatus::Pending
    }
}

// Spreadsheet round-trips turn `3` into `3.0`.
fn parse_page_number(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= u32::MAX as f64)
            .map(|v| v as u32)
    })
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
