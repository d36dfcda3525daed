//! Mock AI client with scripted responses, for tests and dry runs
//!
//! Records every request and tracks how many dispatches were in flight at
//! once, so callers can check the concurrency cap.

use super::client::{AiClient, DispatchError, VideoRequest};
use super::types::{ImageOutcome, ImageResult, VideoResult, VideoTagInfo};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type ImageResponder =
    Box<dyn Fn(&[String]) -> Result<Option<ImageResult>, DispatchError> + Send + Sync>;
type VideoResponder =
    Box<dyn Fn(&VideoRequest) -> Result<Option<VideoResult>, DispatchError> + Send + Sync>;

/// A recorded video request.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedVideoRequest {
    pub path: String,
    pub vr_video: bool,
    pub had_existing_result: bool,
}

pub struct MockAiClient {
    images: ImageResponder,
    video: VideoResponder,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    image_requests: Mutex<Vec<Vec<String>>>,
    video_requests: Mutex<Vec<RecordedVideoRequest>>,
}

impl Default for MockAiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAiClient {
    /// Every image gets `{"general": ["mock"]}`; every video gets an empty
    /// tag set.
    pub fn new() -> Self {
        Self {
            images: Box::new(|paths| {
                Ok(Some(ImageResult {
                    result: paths
                        .iter()
                        .map(|_| ImageOutcome::tags([("general", vec!["mock"])]))
                        .collect(),
                }))
            }),
            video: Box::new(|_| {
                Ok(Some(VideoResult::new(
                    serde_json::json!({}),
                    VideoTagInfo::default(),
                )))
            }),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            image_requests: Mutex::new(Vec::new()),
            video_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn on_images<F>(mut self, responder: F) -> Self
    where
        F: Fn(&[String]) -> Result<Option<ImageResult>, DispatchError> + Send + Sync + 'static,
    {
        self.images = Box::new(responder);
        self
    }

    pub fn on_video<F>(mut self, responder: F) -> Self
    where
        F: Fn(&VideoRequest) -> Result<Option<VideoResult>, DispatchError> + Send + Sync + 'static,
    {
        self.video = Box::new(responder);
        self
    }

    /// Hold every dispatch open for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Highest number of dispatches observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn image_requests(&self) -> Vec<Vec<String>> {
        self.image_requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn video_requests(&self) -> Vec<RecordedVideoRequest> {
        self.video_requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    async fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight { counter: &self.in_flight };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        guard
    }
}

/// Decrements the in-flight count even when the dispatch future is dropped
/// by a timeout.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AiClient for MockAiClient {
    async fn process_images(&self, paths: &[String]) -> Result<Option<ImageResult>, DispatchError> {
        if let Ok(mut requests) = self.image_requests.lock() {
            requests.push(paths.to_vec());
        }
        let _in_flight = self.enter().await;
        (self.images)(paths)
    }

    async fn process_video(&self, request: &VideoRequest) -> Result<Option<VideoResult>, DispatchError> {
        if let Ok(mut requests) = self.video_requests.lock() {
            requests.push(RecordedVideoRequest {
                path: request.path.clone(),
                vr_video: request.vr_video,
                had_existing_result: request.existing_result.is_some(),
            });
        }
        let _in_flight = self.enter().await;
        (self.video)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_mock_answers_every_path() {
        let client = MockAiClient::new();
        let paths = vec!["/a.jpg".to_string(), "/b.jpg".to_string()];
        let result = client.process_images(&paths).await.unwrap().unwrap();
        assert_eq!(result.result.len(), 2);
        assert_eq!(client.image_requests(), vec![paths]);
    }

    #[tokio::test]
    async fn scripted_failure_is_returned() {
        let client = MockAiClient::new()
            .on_images(|_| Err(DispatchError::Connection("refused".to_string())));
        let result = client.process_images(&["/a.jpg".to_string()]).await;
        assert!(matches!(result, Err(DispatchError::Connection(_))));
    }

    #[tokio::test]
    async fn in_flight_count_is_tracked() {
        let client = MockAiClient::new().with_delay(Duration::from_millis(20));
        let paths = vec!["/a.jpg".to_string()];
        let (a, b) = tokio::join!(client.process_images(&paths), client.process_images(&paths));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(client.max_in_flight(), 2);
    }
}
