// src/stages/download.rs
use crate::drive::DocumentFetcher;
use crate::storage::queue::QueueTable;
use crate::storage::StorageManager;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub already_present: usize,
    pub no_url: usize,
    pub failed: usize,
}

/// Saves the PDF of every resolved record into `storage`. Existing files are
/// kept; a failed download is logged and the run moves on.
pub async fn run_download(
    fetcher: &dyn DocumentFetcher,
    storage: &StorageManager,
    table: &QueueTable,
) -> DownloadSummary {
    let mut summary = DownloadSummary::default();
    let total = table.len();

    for (index, record) in table.records.iter().enumerate() {
        let Some(url) = record.direct_download_url.as_deref() else {
            summary.no_url += 1;
            continue;
        };
        if storage.has_document(&record.title) {
            tracing::debug!("Already downloaded: {}", record.title);
            summary.already_present += 1;
            continue;
        }

        tracing::info!("[{}/{}] Downloading: {}", index + 1, total, record.title);
        let bytes = match fetcher.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Download failed for {}: {}", record.title, e);
                summary.failed += 1;
                continue;
            }
        };
        match storage.save_document(&record.title, &bytes) {
            Ok(_) => summary.downloaded += 1,
            Err(e) => {
                tracing::error!("Could not save {}: {}", record.title, e);
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        "Download finished: {} new, {} already present, {} without URL, {} failed",
        summary.downloaded,
        summary.already_present,
        summary.no_url,
        summary.failed
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::fakes::FakeFetcher;
    use crate::storage::queue::{QueueRecord, RecordStatus};
    use std::fs;

    fn resolved(title: &str, url: &str) -> QueueRecord {
        let mut record = QueueRecord::new(title, "https://site.test/doc", None, 1);
        record.direct_download_url = Some(url.to_string());
        record.status = RecordStatus::Resolved;
        record
    }

    #[tokio::test]
    async fn downloads_new_files_and_skips_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        storage.save_document("Old Report", b"%PDF-old").unwrap();

        let fetcher = FakeFetcher::new().with_file("https://files.test/acme", b"%PDF-acme");
        let table = QueueTable::new(vec![
            resolved("ACME Annual Report 2024", "https://files.test/acme"),
            resolved("Old Report", "https://files.test/old"),
            QueueRecord::new("Pending Report", "https://site.test/doc", None, 1),
            resolved("Gone Report", "https://files.test/gone"),
        ]);

        let summary = run_download(&fetcher, &storage, &table).await;

        assert_eq!(
            summary,
            DownloadSummary { downloaded: 1, already_present: 1, no_url: 1, failed: 1 }
        );
        assert_eq!(fetcher.calls(), vec!["https://files.test/acme", "https://files.test/gone"]);
        let saved = fs::read(storage.document_path("ACME Annual Report 2024")).unwrap();
        assert_eq!(saved, b"%PDF-acme");
        assert!(!storage.has_document("Gone Report"));
    }
}
