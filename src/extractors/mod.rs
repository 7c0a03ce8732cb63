// src/extractors/mod.rs
pub mod gemini;
pub mod schema;

use crate::utils::error::ExtractError;
use async_trait::async_trait;
use serde::Deserialize;

// Re-export key extraction types for convenience
pub use gemini::{GeminiClient, GeminiConfig};
pub use schema::{ExtractionRecord, FinancialReportExtraction, EXTRACTION_PROMPT};

/// Processing state of an uploaded file, as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    #[default]
    StateUnspecified,
    Processing,
    Active,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Handle to a file uploaded to the extraction service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc-123`.
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub state: FileState,
}

/// The structured-extraction API as the pipeline sees it.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, ExtractError>;

    async fn file_state(&self, name: &str) -> Result<FileState, ExtractError>;

    /// Returns the raw JSON text produced against `schema`.
    async fn generate(
        &self,
        file: &RemoteFile,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<String, ExtractError>;

    async fn delete(&self, name: &str) -> Result<(), ExtractError>;
}
