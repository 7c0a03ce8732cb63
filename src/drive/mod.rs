// src/drive/mod.rs
pub mod client;
pub mod url;

use crate::utils::error::DriveError;
use async_trait::async_trait;

/// Anything that can turn a direct-download URL into document bytes.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DriveError>;
}
