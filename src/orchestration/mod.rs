//! Orchestration layer for talking to the hosted model.
//!
//! This module provides the `ModelClient` boundary, its Gemini REST
//! implementation, the prompt texts and response schemas, and the bounded
//! worker pool used to run model calls concurrently.

mod gemini;
mod model;
mod pool;
pub mod prompts;

pub use gemini::{FileState, GeminiClient, UploadedFile, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT_SECS};
pub use model::{ModelClient, ModelRequest};
pub use pool::{WorkerEvent, WorkerPool};
