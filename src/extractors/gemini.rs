// src/extractors/gemini.rs
use crate::extractors::{ExtractionService, FileState, RemoteFile};
use crate::utils::error::ExtractError;
use async_trait::async_trait;
use reqwest::Response;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Connection settings for the Generative Language API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Per-request ceiling; uploads of large reports and generation are slow.
    pub request_timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(300),
        }
    }
}

pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    File { file_data: FileData<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    response_json_schema: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ExtractError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ExtractionService for GeminiClient {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, ExtractError> {
        // 1. Open a resumable upload session
        let response = self
            .http
            .post(self.url("upload/v1beta/files"))
            .header(API_KEY_HEADER, &self.config.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let upload_url = response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ExtractError::Upload("no upload URL in session response".to_string()))?;

        // 2. Send the bytes and finalize in one request
        let length = bytes.len();
        let response = self
            .http
            .post(&upload_url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Upload(format!("unreadable upload response: {}", e)))?;
        tracing::debug!(
            "Uploaded {} bytes as {} ({:?})",
            length,
            uploaded.file.name,
            uploaded.file.state
        );
        Ok(uploaded.file)
    }

    async fn file_state(&self, name: &str) -> Result<FileState, ExtractError> {
        let response = self
            .http
            .get(self.url(&format!("v1beta/{}", name)))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;
        let file: RemoteFile = ensure_success(response).await?.json().await?;
        Ok(file.state)
    }

    async fn generate(
        &self,
        file: &RemoteFile,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<String, ExtractError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::File {
                        file_data: FileData { mime_type: &file.mime_type, file_uri: &file.uri },
                    },
                    Part::Text { text: prompt },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_json_schema: schema,
            },
        };

        let response = self
            .http
            .post(self.url(&format!("v1beta/models/{}:generateContent", self.config.model)))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let generated: GenerateResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ExtractError::Generation(format!("unreadable response: {}", e)))?;

        if let Some(reason) = generated.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ExtractError::Generation(format!("prompt blocked: {}", reason)));
        }

        let candidate = generated
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ExtractError::Generation("no candidates returned".to_string()))?;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ExtractError::Generation(format!(
                "empty candidate (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }

    async fn delete(&self, name: &str) -> Result<(), ExtractError> {
        let response = self
            .http
            .delete(self.url(&format!("v1beta/{}", name)))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

/// Passes 2xx responses through and turns everything else into `ExtractError::Api`.
async fn ensure_success(response: Response) -> Result<Response, ExtractError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or(body);
    tracing::debug!("API error {}: {}", status, message);
    Err(ExtractError::Api { status, message })
}
