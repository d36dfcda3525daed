//! AI service client contract

use super::types::{ImageResult, VideoResult};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failures raised by a dispatch.
///
/// A service that answers without a usable payload is not an error: the
/// client returns `Ok(None)` and the caller decides what that means.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("AI service unreachable: {0}")]
    Connection(String),

    #[error("AI service request timed out: {0}")]
    Timeout(String),

    #[error("malformed AI service response: {0}")]
    MalformedResponse(String),

    #[error("AI service request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// One video submission.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    /// Path as the AI service sees it
    pub path: String,
    /// Whether the scene is VR content
    pub vr_video: bool,
    /// Previously persisted result, letting the service skip reprocessing
    pub existing_result: Option<Value>,
}

/// Client for the external AI inference service.
///
/// Implementations only propagate failures or return `None`; interpreting
/// them is the orchestrator's job.
#[async_trait]
pub trait AiClient: Send + Sync {
    /// Classify a batch of images. A successful result carries one outcome
    /// per path.
    async fn process_images(&self, paths: &[String]) -> Result<Option<ImageResult>, DispatchError>;

    /// Classify one video.
    async fn process_video(&self, request: &VideoRequest) -> Result<Option<VideoResult>, DispatchError>;
}
