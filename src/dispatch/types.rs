//! Typed AI service results
//!
//! Responses are decoded into these shapes at the service boundary; a body
//! that does not fit is a malformed response, never a loose JSON value
//! passed downstream.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Result of one image batch: one outcome per submitted path, in order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ImageResult {
    pub result: Vec<ImageOutcome>,
}

/// Per-image outcome.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ImageOutcome {
    /// The service could not classify this image
    Error { error: Value },
    /// Category → tag names
    Tags(BTreeMap<String, Vec<String>>),
}

impl ImageOutcome {
    pub fn tags<I, C, T>(categories: I) -> Self
    where
        I: IntoIterator<Item = (C, Vec<T>)>,
        C: Into<String>,
        T: Into<String>,
    {
        Self::Tags(
            categories
                .into_iter()
                .map(|(c, tags)| (c.into(), tags.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: Value::String(message.into()),
        }
    }

    /// Human-readable error description, if this is an error outcome.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Error { error: Value::String(s) } => Some(s.clone()),
            Self::Error { error } => Some(error.to_string()),
            Self::Tags(_) => None,
        }
    }
}

/// One detected time interval, in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TimeFrame {
    pub start: f64,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default, rename = "totalConfidence")]
    pub total_confidence: Option<f64>,
}

impl TimeFrame {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end: Some(end),
            total_confidence: None,
        }
    }
}

/// Tag information for a whole video.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct VideoTagInfo {
    #[serde(default)]
    pub video_duration: f64,
    /// Category → tag names present anywhere in the video
    #[serde(default)]
    pub video_tags: BTreeMap<String, BTreeSet<String>>,
    /// Category → tag → total seconds. Decoded but not yet consumed.
    #[serde(default)]
    pub tag_totals: BTreeMap<String, BTreeMap<String, f64>>,
    /// Category → tag → intervals where the tag was detected
    #[serde(default)]
    pub tag_timespans: BTreeMap<String, BTreeMap<String, Vec<TimeFrame>>>,
}

impl VideoTagInfo {
    /// Every tag name across all categories, from both the video-level
    /// tags and the timespans, deduplicated.
    pub fn all_tags(&self) -> BTreeSet<&str> {
        let listed = self
            .video_tags
            .values()
            .flat_map(|tags| tags.iter().map(String::as_str));
        let timed = self
            .tag_timespans
            .values()
            .flat_map(|by_tag| by_tag.keys().map(String::as_str));
        listed.chain(timed).collect()
    }

    /// `(tag, interval)` pairs from the timespans, category order then tag
    /// order.
    pub fn timespans(&self) -> impl Iterator<Item = (&str, &TimeFrame)> {
        self.tag_timespans.values().flat_map(|by_tag| {
            by_tag
                .iter()
                .flat_map(|(tag, frames)| frames.iter().map(move |f| (tag.as_str(), f)))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoPayload {
    /// Full service result, persisted verbatim to the scene's sidecar
    #[serde(default)]
    pub json_result: Value,
    pub video_tag_info: VideoTagInfo,
}

/// Result of one video dispatch.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoResult {
    pub result: VideoPayload,
}

impl VideoResult {
    pub fn new(json_result: Value, video_tag_info: VideoTagInfo) -> Self {
        Self {
            result: VideoPayload {
                json_result,
                video_tag_info,
            },
        }
    }

    pub fn tag_info(&self) -> &VideoTagInfo {
        &self.result.video_tag_info
    }
}
