//! Gemini REST client.
//!
//! A request runs in three steps: upload the scene video through the Files
//! API, wait for the uploaded file to become `ACTIVE`, then call
//! `generateContent` with the video reference, the inline image and the
//! prompt. The model is asked for `application/json` output constrained by
//! the request's schema, and the text of the first candidate is returned.
//! The uploaded video is deleted afterwards.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::{Config, Secrets, DEFAULT_GEMINI_BASE_URL};
use crate::error::{Error, Result};
use crate::orchestration::model::{ModelClient, ModelRequest};
use crate::util::{truncate, with_timeout};

/// Default timeout for one full request (10 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Delay between checks of an uploaded file's processing state.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// The bird's-eye image is always declared as JPEG.
const IMAGE_MIME: &str = "image/jpeg";

/// Processing state of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    StateUnspecified,
    Processing,
    Active,
    Failed,
}

/// A file stored by the Files API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Resource name, e.g. `files/abc123`.
    pub name: String,
    /// URI to reference the file from `generateContent`.
    pub uri: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub state: Option<FileState>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Gemini client over the public REST API.
///
/// # Example
///
/// ```ignore
/// use sqa_pipeline::orchestration::{GeminiClient, ModelClient};
///
/// let gemini = GeminiClient::new(Some(api_key));
/// let text = gemini.generate(&request).await?;
/// ```
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    poll_interval: Duration,
}

impl GeminiClient {
    /// Create a client for the public endpoint.
    ///
    /// A missing key is accepted here; every request then fails with
    /// [`Error::MissingCredential`].
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            api_key,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn from_config(config: &Config, secrets: &Secrets) -> Self {
        Self::new(secrets.gemini_api_key.clone())
            .with_base_url(&config.gemini_base_url)
            .with_timeout(config.request_timeout())
    }

    /// Point the client at a different server (used by tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Set the maximum duration of one full request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or(Error::MissingCredential(Secrets::GEMINI_API_KEY))
    }

    /// Upload a video through the Files API.
    pub async fn upload_file(&self, path: &Path) -> Result<UploadedFile> {
        let key = self.api_key()?;
        let bytes = tokio::fs::read(path).await?;
        let mime = video_mime(path);
        debug!(
            "Uploading {} ({} bytes, {})",
            path.display(),
            bytes.len(),
            mime
        );

        let response = self
            .http
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .query(&[("uploadType", "media")])
            .header("x-goog-api-key", key)
            .header(reqwest::header::CONTENT_TYPE, mime)
            .body(bytes)
            .send()
            .await?;
        let body = checked_body(response).await?;
        let upload: UploadResponse = serde_json::from_str(&body)?;
        debug!(
            "Uploaded {} as {} (state {:?})",
            path.display(),
            upload.file.name,
            upload.file.state
        );
        Ok(upload.file)
    }

    /// Fetch the current metadata of an uploaded file.
    pub async fn get_file(&self, name: &str) -> Result<UploadedFile> {
        let key = self.api_key()?;
        let response = self
            .http
            .get(format!("{}/v1beta/{}", self.base_url, name))
            .header("x-goog-api-key", key)
            .send()
            .await?;
        let body = checked_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Remove an uploaded file from the Files API.
    pub async fn delete_file(&self, name: &str) -> Result<()> {
        let key = self.api_key()?;
        let response = self
            .http
            .delete(format!("{}/v1beta/{}", self.base_url, name))
            .header("x-goog-api-key", key)
            .send()
            .await?;
        checked_body(response).await?;
        debug!("Deleted {}", name);
        Ok(())
    }

    /// Poll an uploaded file until it is usable.
    pub async fn wait_until_active(&self, mut file: UploadedFile) -> Result<UploadedFile> {
        loop {
            match file.state {
                None | Some(FileState::Active) => return Ok(file),
                Some(FileState::Failed) => {
                    return Err(Error::Model(format!(
                        "processing of uploaded file {} failed",
                        file.name
                    )))
                }
                Some(FileState::Processing) | Some(FileState::StateUnspecified) => {
                    trace!("{} still processing", file.name);
                    tokio::time::sleep(self.poll_interval).await;
                    file = self.get_file(&file.name).await?;
                }
            }
        }
    }

    /// Build the `generateContent` body for a request.
    pub fn build_body(file: &UploadedFile, image: &[u8], request: &ModelRequest) -> Value {
        let video_mime = file
            .mime_type
            .clone()
            .unwrap_or_else(|| video_mime(&request.video).to_string());
        json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{ "fileData": { "mimeType": video_mime, "fileUri": file.uri } }]
                },
                {
                    "role": "user",
                    "parts": [{ "inlineData": { "mimeType": IMAGE_MIME, "data": BASE64.encode(image) } }]
                },
                {
                    "role": "user",
                    "parts": [{ "text": request.prompt }]
                }
            ],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": request.response_schema
            }
        })
    }

    /// Extract the model's text from a `generateContent` response body.
    pub fn parse_generate_response(body: &str) -> Result<String> {
        let response: GenerateResponse = serde_json::from_str(body)?;

        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(Error::Model(format!("prompt blocked: {}", reason)));
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::Model("response has no candidates".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::Model(format!(
                "candidate has no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }

    async fn generate_inner(&self, request: &ModelRequest) -> Result<String> {
        let key = self.api_key()?.to_string();
        let image = tokio::fs::read(&request.image).await?;
        let uploaded = self.upload_file(&request.video).await?;
        let name = uploaded.name.clone();

        let result = self.generate_with_file(&key, uploaded, &image, request).await;

        // Uploaded files are never reused. Remove this one whatever the outcome.
        if let Err(e) = self.delete_file(&name).await {
            warn!("Failed to delete uploaded file {}: {}", name, e);
        }
        result
    }

    async fn generate_with_file(
        &self,
        key: &str,
        uploaded: UploadedFile,
        image: &[u8],
        request: &ModelRequest,
    ) -> Result<String> {
        let file = self.wait_until_active(uploaded).await?;

        let body = Self::build_body(&file, image, request);
        debug!(
            "generateContent model={} video={} prompt={}",
            request.model,
            file.name,
            truncate(&request.prompt, 60)
        );
        let response = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, request.model
            ))
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await?;
        let body = checked_body(response).await?;
        trace!("generateContent response: {}", truncate(&body, 2000));
        Self::parse_generate_response(&body)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, request: &ModelRequest) -> Result<String> {
        with_timeout(self.timeout, self.generate_inner(request)).await
    }
}

/// Return the body of a successful response, or the API's error message.
async fn checked_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        return Ok(body);
    }
    let message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) => format!(
            "{} {}: {}",
            parsed.error.code.unwrap_or(status.as_u16()),
            parsed.error.status.unwrap_or_default(),
            parsed.error.message
        ),
        Err(_) => format!("{}: {}", status, truncate(body.trim(), 200)),
    };
    Err(Error::Model(message))
}

fn video_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        _ => "video/mp4",
    }
}
