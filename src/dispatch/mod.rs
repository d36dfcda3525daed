//! AI inference service dispatch
//!
//! [`AiClient`] sends one unit of work and returns a typed result, `None`
//! when the service answered without a payload, or a [`DispatchError`].

mod client;
mod http;
mod mock;
mod types;

pub use client::{AiClient, DispatchError, VideoRequest};
pub use http::HttpAiClient;
pub use mock::{MockAiClient, RecordedVideoRequest};
pub use types::{ImageOutcome, ImageResult, TimeFrame, VideoPayload, VideoResult, VideoTagInfo};
