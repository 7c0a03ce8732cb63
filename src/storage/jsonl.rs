// src/storage/jsonl.rs
use crate::utils::error::StorageError;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only newline-delimited JSON log.
pub struct JsonlLog {
    path: PathBuf,
}

impl JsonlLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serializes `value` onto one line and appends it. The file is opened per
    /// call so every completed line is on disk before the next document starts.
    pub fn append<T: Serialize>(&self, value: &T) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(value)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn appends_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlLog::new(dir.path().join("out").join("data.jsonl"));

        log.append(&json!({"company_name": "Acme Ltd", "fiscal_year": 2024})).unwrap();
        log.append(&json!({"company_name": "Beta Plc", "note": "line\nbreak"})).unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["note"], "line\nbreak");
    }
}
