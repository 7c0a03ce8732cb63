// src/storage/mod.rs
pub mod jsonl;
pub mod queue;

use std::fs;
use std::path::{Path, PathBuf};
use once_cell::sync::Lazy;
use regex::Regex;
use crate::utils::error::StorageError;

// Characters that are not allowed in file names on common file systems.
static ILLEGAL_FILENAME_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[\\/*?:"<>|]"#).expect("Failed to compile ILLEGAL_FILENAME_CHARS")
});

/// Turns a document title into something usable as a file name.
pub fn safe_file_stem(title: &str) -> String {
    let cleaned = ILLEGAL_FILENAME_CHARS.replace_all(title, "");
    let trimmed = cleaned.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Manages the directory downloaded reports (and debug pages) are written to.
pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path)
                .map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    /// Where the PDF for `title` lives: `<base_dir>/<safe title>.pdf`
    pub fn document_path(&self, title: &str) -> PathBuf {
        self.base_dir.join(format!("{}.pdf", safe_file_stem(title)))
    }

    pub fn has_document(&self, title: &str) -> bool {
        self.document_path(title).exists()
    }

    /// Writes the document bytes; the file only appears once fully written.
    pub fn save_document(&self, title: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let file_path = self.document_path(title);
        let tmp_path = file_path.with_extension("pdf.part");

        fs::write(&tmp_path, bytes).map_err(StorageError::IoError)?;
        fs::rename(&tmp_path, &file_path).map_err(StorageError::IoError)?;

        tracing::info!("Saved document to {}", file_path.display());
        Ok(file_path)
    }

    /// Where the annotated page for `title` goes: `<base_dir>/debug/<safe title>.html`
    pub fn debug_page_path(&self, title: &str) -> PathBuf {
        self.base_dir.join("debug").join(format!("{}.html", safe_file_stem(title)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_stem_strips_illegal_characters() {
        assert_eq!(safe_file_stem("ACME: Annual Report 2024/25?"), "ACME Annual Report 202425");
        assert_eq!(safe_file_stem("  <|>  "), "untitled");
        assert_eq!(safe_file_stem("Report v1."), "Report v1");
    }

    #[test]
    fn saves_documents_under_safe_names() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path().join("reports")).unwrap();

        assert!(!storage.has_document("ACME Annual Report 2024"));
        let path = storage.save_document("ACME Annual Report 2024", b"%PDF").unwrap();

        assert_eq!(path, dir.path().join("reports").join("ACME Annual Report 2024.pdf"));
        assert!(storage.has_document("ACME Annual Report 2024"));
        assert_eq!(fs::read(path).unwrap(), b"%PDF");
    }
}
