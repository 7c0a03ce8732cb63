// src/stages/resolve.rs
use crate::drive::url::convert_to_download_url;
use crate::site::page::ViewerLocator;
use crate::site::PageSource;
use crate::storage::queue::{QueueRecord, QueueStore, QueueTable, RecordStatus};
use crate::storage::StorageManager;
use crate::utils::error::{SiteError, StorageError};
use crate::utils::html_debug::save_viewer_debug_html;
use std::fs;
use std::path::Path;

pub const DEFAULT_CHECKPOINT_EVERY: usize = 5;

pub struct ResolveOptions {
    /// Save the queue after this many attempted records.
    pub checkpoint_every: usize,
    /// Also retry records marked unresolvable by an earlier run.
    pub retry_unresolvable: bool,
    /// When set, pages without a viewer are saved here for inspection.
    pub debug_storage: Option<StorageManager>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            retry_unresolvable: false,
            debug_storage: None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResolveSummary {
    pub resolved: usize,
    pub unresolvable: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ResolveSummary {
    pub fn attempted(&self) -> usize {
        self.resolved + self.unresolvable + self.failed
    }
}

/// Resolves every record that still needs a download URL, saving the table
/// to `output` every `checkpoint_every` attempts and once more at the end.
/// Nothing is written when no record was attempted.
pub async fn run_resolution(
    source: &dyn PageSource,
    locator: &ViewerLocator,
    table: &mut QueueTable,
    output: &Path,
    options: &ResolveOptions,
) -> Result<ResolveSummary, StorageError> {
    let mut summary = ResolveSummary::default();
    let total = table.len();
    let checkpoint_every = options.checkpoint_every.max(1);

    for index in 0..total {
        if !table.records[index].needs_resolution(options.retry_unresolvable) {
            summary.skipped += 1;
            continue;
        }

        let record = &mut table.records[index];
        tracing::info!("[{}/{}] Resolving: {}", index + 1, total, record.title);
        let debug_storage = options.debug_storage.as_ref();
        match resolve_record(source, locator, record, debug_storage).await {
            RecordStatus::Resolved => summary.resolved += 1,
            RecordStatus::Unresolvable => summary.unresolvable += 1,
            _ => summary.failed += 1,
        }

        if summary.attempted() % checkpoint_every == 0 {
            QueueStore::save(output, table)?;
            tracing::info!("Checkpoint: saved progress after {} records", summary.attempted());
        }
    }

    if summary.attempted() > 0 {
        QueueStore::save(output, table)?;
    }

    tracing::info!(
        "Resolution finished: {} resolved, {} unresolvable, {} failed, {} already done",
        summary.resolved,
        summary.unresolvable,
        summary.failed,
        summary.skipped
    );
    Ok(summary)
}

/// Loads `input`, resolves it into `output`. When the paths name different
/// files the output is written even if there was nothing to resolve. An
/// unreadable input is logged and leaves nothing to do.
pub async fn resolve_queue_file(
    source: &dyn PageSource,
    locator: &ViewerLocator,
    input: &Path,
    output: &Path,
    options: &ResolveOptions,
) -> Result<ResolveSummary, StorageError> {
    let mut table = QueueStore::load_or_empty(input);
    if table.is_empty() {
        tracing::info!("No records in {}", input.display());
        return Ok(ResolveSummary::default());
    }
    tracing::info!("Loaded {} records from {}", table.len(), input.display());

    let summary = run_resolution(source, locator, &mut table, output, options).await?;
    if summary.attempted() == 0 {
        tracing::info!("No pending records to process");
        if !same_file(input, output) {
            QueueStore::save(output, &table)?;
        }
    }
    Ok(summary)
}

// `queue.csv` and `./queue.csv` are the same file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

async fn resolve_record(
    source: &dyn PageSource,
    locator: &ViewerLocator,
    record: &mut QueueRecord,
    debug_storage: Option<&StorageManager>,
) -> RecordStatus {
    let html = match source.load(&record.document_url).await {
        Ok(html) => html,
        Err(e) => {
            tracing::error!("Failed to load {}: {}", record.document_url, e);
            record.status = RecordStatus::Failed;
            return record.status;
        }
    };

    let src = match locator.viewer_src(&html, &record.document_url) {
        Ok(src) => src,
        Err(e) => {
            tracing::error!("{}: {}", record.title, e);
            if let (SiteError::ElementNotFound { .. }, Some(storage)) = (&e, debug_storage) {
                let path = storage.debug_page_path(&record.title);
                match save_viewer_debug_html(&html, &path) {
                    Ok(()) => tracing::info!("Saved debug page to {}", path.display()),
                    Err(e) => tracing::warn!("Could not save debug page {}: {}", path.display(), e),
                }
            }
            record.status = RecordStatus::Failed;
            return record.status;
        }
    };

    match convert_to_download_url(src.as_deref()) {
        Some(url) => {
            tracing::info!("  -> Success: {}", url);
            record.direct_download_url = Some(url);
            record.status = RecordStatus::Resolved;
        }
        None => {
            tracing::warn!("  -> Viewer has no file id (src: {:?}), marking unresolvable", src);
            record.status = RecordStatus::Unresolvable;
        }
    }
    record.status
}
