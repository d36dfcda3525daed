//! HTTP client for the AI inference service

use super::client::{AiClient, DispatchError, VideoRequest};
use super::types::{ImageResult, VideoResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = concat!("ai-tagger/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Serialize)]
struct ImagesBody<'a> {
    paths: &'a [String],
}

#[derive(Serialize)]
struct VideoBody<'a> {
    path: &'a str,
    frame_interval: f64,
    threshold: f64,
    return_confidence: bool,
    vr_video: bool,
    existing_json_data: Option<&'a Value>,
}

/// AI service reached over HTTP.
///
/// Request deadlines are enforced by the caller; only the connect phase is
/// bounded here.
pub struct HttpAiClient {
    http_client: reqwest::Client,
    base_url: String,
    frame_interval: f64,
    threshold: f64,
}

impl HttpAiClient {
    pub fn new(
        base_url: impl Into<String>,
        frame_interval: f64,
        threshold: f64,
    ) -> Result<Self, DispatchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| DispatchError::Other(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            frame_interval,
            threshold,
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}/", self.base_url, name)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Option<T>, DispatchError> {
        let url = self.endpoint(endpoint);
        tracing::debug!(url = %url, "posting to AI service");

        let response = self.http_client.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = %text,
                "AI service returned no result for {}",
                endpoint
            );
            return Ok(None);
        }

        let text = response.text().await?;
        decode_body(&text)
    }
}

/// Decode a success body. A literal `null` body means "no result".
fn decode_body<T: DeserializeOwned>(text: &str) -> Result<Option<T>, DispatchError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| DispatchError::MalformedResponse(format!("invalid JSON: {}", e)))?;
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| DispatchError::MalformedResponse(e.to_string()))
}

#[async_trait]
impl AiClient for HttpAiClient {
    async fn process_images(&self, paths: &[String]) -> Result<Option<ImageResult>, DispatchError> {
        self.post("process_images", &ImagesBody { paths }).await
    }

    async fn process_video(&self, request: &VideoRequest) -> Result<Option<VideoResult>, DispatchError> {
        let body = VideoBody {
            path: &request.path,
            frame_interval: self.frame_interval,
            threshold: self.threshold,
            return_confidence: false,
            vr_video: request.vr_video,
            existing_json_data: request.existing_result.as_ref(),
        };
        self.post("process_video", &body).await
    }
}
