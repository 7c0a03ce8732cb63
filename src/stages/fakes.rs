// src/stages/fakes.rs
//! In-memory stand-ins for the network seams, shared by the stage tests.
use crate::drive::DocumentFetcher;
use crate::extractors::{ExtractionService, FileState, RemoteFile};
use crate::site::PageSource;
use crate::utils::error::{DriveError, ExtractError, SiteError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakePages {
    pages: HashMap<String, Option<String>>,
    calls: Mutex<Vec<String>>,
    watched: Option<PathBuf>,
    seen: Mutex<Vec<Option<String>>>,
}

impl FakePages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), Some(html.to_string()));
        self
    }

    /// Loading `url` times out.
    pub fn with_failure(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), None);
        self
    }

    /// Records the content of `path` at every load.
    pub fn watching(mut self, path: &Path) -> Self {
        self.watched = Some(path.to_path_buf());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Content of the watched file per load; `None` while it did not exist.
    pub fn seen(&self) -> Vec<Option<String>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for FakePages {
    async fn load(&self, url: &str) -> Result<String, SiteError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(path) = &self.watched {
            self.seen.lock().unwrap().push(fs::read_to_string(path).ok());
        }
        match self.pages.get(url) {
            Some(Some(html)) => Ok(html.clone()),
            _ => Err(SiteError::Timeout(url.to_string())),
        }
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    files: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DriveError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.files
            .get(url)
            .cloned()
            .ok_or(DriveError::Http(reqwest::StatusCode::NOT_FOUND))
    }
}

/// Scripted extraction service. Each upload yields a file named
/// `files/<n>`; states are served from `states` (then `Active`), and
/// responses are looked up by upload display name.
#[derive(Default)]
pub struct FakeService {
    states: Mutex<VecDeque<FileState>>,
    responses: HashMap<String, String>,
    pub uploads: Mutex<Vec<String>>,
    pub polls: Mutex<usize>,
    pub deletes: Mutex<Vec<String>>,
    fail_delete: bool,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_states(self, states: &[FileState]) -> Self {
        *self.states.lock().unwrap() = states.iter().copied().collect();
        self
    }

    pub fn with_response(mut self, display_name: &str, json: &str) -> Self {
        self.responses.insert(display_name.to_string(), json.to_string());
        self
    }

    pub fn failing_deletes(mut self) -> Self {
        self.fail_delete = true;
        self
    }
}

#[async_trait]
impl ExtractionService for FakeService {
    async fn upload(
        &self,
        _bytes: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, ExtractError> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(display_name.to_string());
        Ok(RemoteFile {
            name: format!("files/{}", uploads.len()),
            uri: format!("https://files.test/{}", uploads.len()),
            mime_type: mime_type.to_string(),
            state: FileState::Processing,
        })
    }

    async fn file_state(&self, _name: &str) -> Result<FileState, ExtractError> {
        *self.polls.lock().unwrap() += 1;
        Ok(self.states.lock().unwrap().pop_front().unwrap_or(FileState::Active))
    }

    async fn generate(
        &self,
        file: &RemoteFile,
        _prompt: &str,
        _schema: &serde_json::Value,
    ) -> Result<String, ExtractError> {
        let index: usize = file.name.trim_start_matches("files/").parse().unwrap_or(0);
        let uploads = self.uploads.lock().unwrap();
        let title = uploads.get(index.wrapping_sub(1)).cloned().unwrap_or_default();
        drop(uploads);
        self.responses
            .get(&title)
            .cloned()
            .ok_or_else(|| ExtractError::Generation(format!("no scripted response for {}", title)))
    }

    async fn delete(&self, name: &str) -> Result<(), ExtractError> {
        self.deletes.lock().unwrap().push(name.to_string());
        if self.fail_delete {
            return Err(ExtractError::Upload("delete refused".to_string()));
        }
        Ok(())
    }
}
