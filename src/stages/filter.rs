// src/stages/filter.rs
use crate::storage::queue::{QueueStore, QueueTable};
use crate::utils::error::StorageError;
use std::path::{Path, PathBuf};

pub const DEFAULT_TITLE_PATTERN: &str = "annual report";

/// Keeps the records whose title contains `pattern`, ignoring case.
pub fn filter_by_title(table: &QueueTable, pattern: &str) -> QueueTable {
    let needle = pattern.to_lowercase();
    let kept = table
        .records
        .iter()
        .filter(|r| r.title.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    table.with_records(kept)
}

/// `<dir>/<stem>_cleaned.csv` next to the input.
pub fn cleaned_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("queue");
    input.with_file_name(format!("{}_cleaned.csv", stem))
}

/// Filters `input` into `output`, returning `(before, after)` counts. An
/// unreadable or empty input is logged and nothing is written.
pub fn run_filter(
    input: &Path,
    output: &Path,
    pattern: &str,
) -> Result<(usize, usize), StorageError> {
    let table = QueueStore::load_or_empty(input);
    if table.is_empty() {
        tracing::info!("No records in {}", input.display());
        return Ok((0, 0));
    }
    let filtered = filter_by_title(&table, pattern);

    tracing::info!("Original count: {}", table.len());
    tracing::info!("Filtered count: {}", filtered.len());
    QueueStore::save(output, &filtered)?;
    tracing::info!("Saved filtered queue to {}", output.display());

    Ok((table.len(), filtered.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::queue::QueueRecord;

    #[test]
    fn keeps_annual_reports_regardless_of_case() {
        let table = QueueTable::new(vec![
            QueueRecord::new("ACME Annual Report 2024", "https://site/a", None, 1),
            QueueRecord::new("ACME Q1 results", "https://site/b", None, 1),
            QueueRecord::new(
                "beta ANNUAL REPORT and financial statements",
                "https://site/c",
                None,
                2,
            ),
        ]);

        let filtered = filter_by_title(&table, DEFAULT_TITLE_PATTERN);

        let titles: Vec<&str> = filtered.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["ACME Annual Report 2024", "beta ANNUAL REPORT and financial statements"]
        );
    }

    #[test]
    fn cleaned_path_sits_next_to_the_input() {
        assert_eq!(
            cleaned_path(Path::new("data/annual_reports_queue_20260108_102010.csv")),
            PathBuf::from("data/annual_reports_queue_20260108_102010_cleaned.csv")
        );
    }

    #[test]
    fn writes_the_filtered_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("queue.csv");
        QueueStore::save(
            &input,
            &QueueTable::new(vec![
                QueueRecord::new("ACME Annual Report 2024", "https://site/a", None, 1),
                QueueRecord::new("Dividend notice", "https://site/b", None, 1),
            ]),
        )
        .unwrap();

        let output = cleaned_path(&input);
        assert_eq!(run_filter(&input, &output, DEFAULT_TITLE_PATTERN).unwrap(), (2, 1));
        assert_eq!(QueueStore::load(&output).unwrap().records[0].title, "ACME Annual Report 2024");
    }

    #[test]
    fn missing_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("absent.csv");
        let output = cleaned_path(&input);

        assert_eq!(run_filter(&input, &output, DEFAULT_TITLE_PATTERN).unwrap(), (0, 0));
        assert!(!output.exists());
    }
}
