// src/utils/error.rs
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode), // e.g., 404 Not Found, 403 Forbidden

    #[error("Invalid download URL: {0}")]
    InvalidUrl(String),

    #[error("Got an HTML page without a confirmation token from {0}")]
    ConfirmationTokenMissing(String),

    #[error("Still got an HTML page after confirming the download of {0}")]
    UnexpectedHtml(String),
}

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status} for {url}")]
    Http { status: reqwest::StatusCode, url: String },

    #[error("Timed out loading {0}")]
    Timeout(String),

    #[error("Element '{selector}' not found on {url}")]
    ElementNotFound { selector: String, url: String },

    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("Invalid page URL: {0}")]
    InvalidUrl(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: reqwest::StatusCode, message: String },

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Remote processing failed for {0}")]
    ProcessingFailed(String),

    #[error("Remote processing of {name} did not finish within {waited:?}")]
    ProcessingTimedOut { name: String, waited: Duration },

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Response failed validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Drive interaction failed: {0}")]
    Drive(#[from] DriveError),

    #[error("Site interaction failed: {0}")]
    Site(#[from] SiteError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
