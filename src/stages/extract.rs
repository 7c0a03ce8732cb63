// src/stages/extract.rs
use crate::drive::DocumentFetcher;
use crate::extractors::{
    ExtractionRecord, ExtractionService, FileState, FinancialReportExtraction, RemoteFile,
    EXTRACTION_PROMPT,
};
use crate::storage::jsonl::JsonlLog;
use crate::storage::queue::QueueRecord;
use crate::utils::error::ExtractError;
use crate::utils::poll::{poll_until, PollError, PollPolicy};

pub const DEFAULT_MIME_TYPE: &str = "application/pdf";
pub const DEFAULT_OUTPUT_JSONL: &str = "financial_data_extracted.jsonl";

/// Where a single document got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Pending,
    Skipped,
    FetchFailed,
    UploadFailed,
    Uploaded,
    Processing,
    ProcessingFailed,
    Ready,
    GenerationFailed,
    Extracted,
    ValidationFailed,
    PersistFailed,
    Persisted,
}

impl DocumentState {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            DocumentState::FetchFailed
                | DocumentState::UploadFailed
                | DocumentState::ProcessingFailed
                | DocumentState::GenerationFailed
                | DocumentState::ValidationFailed
                | DocumentState::PersistFailed
        )
    }
}

#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub poll: PollPolicy,
    pub mime_type: String,
    pub prompt: String,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            prompt: EXTRACTION_PROMPT.to_string(),
        }
    }
}

/// Final state of one document, with the reason when it failed.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutcome {
    pub title: String,
    pub state: DocumentState,
    pub error: Option<String>,
}

impl DocumentOutcome {
    fn new(title: &str, state: DocumentState) -> Self {
        Self { title: title.to_string(), state, error: None }
    }

    fn failed(title: &str, state: DocumentState, error: impl ToString) -> Self {
        Self { title: title.to_string(), state, error: Some(error.to_string()) }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtractSummary {
    pub persisted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failed_titles: Vec<String>,
}

/// Runs records through fetch, upload, processing, generation, validation and
/// persistence, one at a time.
pub struct Extractor<'a> {
    fetcher: &'a dyn DocumentFetcher,
    service: &'a dyn ExtractionService,
    log: JsonlLog,
    settings: ExtractSettings,
    schema: serde_json::Value,
}

impl<'a> Extractor<'a> {
    pub fn new(
        fetcher: &'a dyn DocumentFetcher,
        service: &'a dyn ExtractionService,
        log: JsonlLog,
        settings: ExtractSettings,
    ) -> Result<Self, ExtractError> {
        let schema = FinancialReportExtraction::response_schema()?;
        Ok(Self { fetcher, service, log, settings, schema })
    }

    /// Processes every record. Failures are logged and counted; the run always
    /// reaches the last record.
    pub async fn run(&self, records: &[QueueRecord]) -> ExtractSummary {
        let mut summary = ExtractSummary::default();
        let total = records.len();

        for (index, record) in records.iter().enumerate() {
            tracing::info!("[{}/{}] Processing: {}", index + 1, total, record.title);
            let outcome = self.process(record).await;
            if outcome.state.is_failure() {
                tracing::error!(
                    "{} ended in {:?}: {}",
                    outcome.title,
                    outcome.state,
                    outcome.error.as_deref().unwrap_or("no reason given")
                );
                summary.failed += 1;
                summary.failed_titles.push(outcome.title);
            } else if outcome.state == DocumentState::Persisted {
                summary.persisted += 1;
            } else {
                summary.skipped += 1;
            }
        }

        tracing::info!(
            "Extraction finished: {} persisted, {} skipped, {} failed",
            summary.persisted,
            summary.skipped,
            summary.failed
        );
        for title in &summary.failed_titles {
            tracing::warn!("  failed: {}", title);
        }
        summary
    }

    pub async fn process(&self, record: &QueueRecord) -> DocumentOutcome {
        let title = record.title.as_str();
        tracing::debug!("{}: {:?}", title, DocumentState::Pending);
        let url = record.direct_download_url.as_deref().filter(|u| !u.trim().is_empty());
        let Some(url) = url else {
            tracing::info!("Skipping {}: no download URL", title);
            return DocumentOutcome::new(title, DocumentState::Skipped);
        };

        let bytes = match self.fetcher.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => return DocumentOutcome::failed(title, DocumentState::FetchFailed, e),
        };
        tracing::debug!("Fetched {} bytes for {}", bytes.len(), title);

        let file = match self.service.upload(bytes, &self.settings.mime_type, title).await {
            Ok(file) => file,
            Err(e) => return DocumentOutcome::failed(title, DocumentState::UploadFailed, e),
        };
        tracing::info!("{}: {:?} as {}", title, DocumentState::Uploaded, file.name);

        let outcome = self.extract_uploaded(title, &file).await;

        // Uploaded files are removed whatever the outcome
        if let Err(e) = self.service.delete(&file.name).await {
            tracing::warn!("Could not delete remote file {}: {}", file.name, e);
        }
        outcome
    }

    async fn extract_uploaded(&self, title: &str, file: &RemoteFile) -> DocumentOutcome {
        tracing::debug!("{}: {:?}", title, DocumentState::Processing);
        if let Err(e) = self.wait_until_ready(file).await {
            return DocumentOutcome::failed(title, DocumentState::ProcessingFailed, e);
        }
        tracing::debug!("{}: {:?}", title, DocumentState::Ready);

        let text = match self.service.generate(file, &self.settings.prompt, &self.schema).await {
            Ok(text) => text,
            Err(e) => return DocumentOutcome::failed(title, DocumentState::GenerationFailed, e),
        };
        tracing::debug!("{}: {:?}", title, DocumentState::Extracted);

        let report = match FinancialReportExtraction::from_response(&text) {
            Ok(report) => report,
            Err(e) => return DocumentOutcome::failed(title, DocumentState::ValidationFailed, e),
        };

        let line = ExtractionRecord { report: &report, source_title: title };
        if let Err(e) = self.log.append(&line) {
            return DocumentOutcome::failed(title, DocumentState::PersistFailed, e);
        }
        tracing::info!("Saved data for {} ({})", report.company_name, report.fiscal_year);
        DocumentOutcome::new(title, DocumentState::Persisted)
    }

    async fn wait_until_ready(&self, file: &RemoteFile) -> Result<(), ExtractError> {
        let service = self.service;
        let name = file.name.as_str();

        let ready = poll_until(&self.settings.poll, move || async move {
            match service.file_state(name).await? {
                FileState::Active => Ok(Some(())),
                FileState::Failed => Err(ExtractError::ProcessingFailed(name.to_string())),
                state => {
                    tracing::debug!("{} is {:?}", name, state);
                    Ok(None)
                }
            }
        })
        .await;

        match ready {
            Ok(()) => Ok(()),
            Err(PollError::Failed(e)) => Err(e),
            Err(PollError::TimedOut(waited)) => Err(ExtractError::ProcessingTimedOut {
                name: name.to_string(),
                waited,
            }),
        }
    }
}
