//! The boundary to the hosted generative model.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

use crate::Result;

/// One multimodal request: a scene video, its bird's-eye image, and an
/// instruction, in that order, plus the JSON schema the answer must follow.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// Model name, e.g. `gemini-2.5-pro-preview-06-05`.
    pub model: String,
    /// Path of the first-person scene video.
    pub video: PathBuf,
    /// Path of the top-down image (sent as JPEG-tagged bytes).
    pub image: PathBuf,
    /// Instruction text.
    pub prompt: String,
    /// Structured-output schema for the response.
    pub response_schema: Value,
}

/// A hosted model that turns a [`ModelRequest`] into JSON text.
///
/// Implementations return the raw text the model produced; callers parse it.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, request: &ModelRequest) -> Result<String>;
}
