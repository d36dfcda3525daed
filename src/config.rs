//! Tagger configuration
//!
//! Loaded from a YAML file (`ai_tagger.yml` in the plugin directory by
//! default). Every key is optional; a missing file yields the defaults.
//!
//! ```yaml
//! api_base_url: http://ai-server:8000
//! concurrent_task_limit: 10
//! image_request_batch_size: 320
//! create_markers: true
//! path_mutations:
//!   - { from: /data/, to: /mnt/media/ }
//! tags:
//!   tagme: AI_TagMe
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File name looked up in the plugin directory.
pub const CONFIG_FILE_NAME: &str = "ai_tagger.yml";

/// Environment variable overriding `api_base_url`.
pub const API_URL_ENV: &str = "AI_TAGGER_API_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Names of the reserved system tags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TagNames {
    /// Marks an item as eligible for tagging
    pub tagme: String,
    /// Marks successful completion
    pub ai_tagged: String,
    /// Marks failed completion
    pub errored: String,
    /// Parent of every tag created from AI labels
    pub ai_base: String,
}

impl Default for TagNames {
    fn default() -> Self {
        Self {
            tagme: "AI_TagMe".to_string(),
            ai_tagged: "AI_Tagged".to_string(),
            errored: "AI_Errored".to_string(),
            ai_base: "AI".to_string(),
        }
    }
}

/// A path prefix rewrite applied before paths are sent to the AI service,
/// for when the service sees the media under a different mount point.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathMutation {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaggerConfig {
    pub api_base_url: String,
    pub concurrent_task_limit: usize,
    pub image_request_batch_size: usize,
    /// Seconds between sampled video frames, forwarded to the AI service
    pub frame_interval: f64,
    /// Detection threshold for video tags, forwarded to the AI service
    pub ai_video_threshold: f64,
    pub create_markers: bool,
    pub image_timeout_secs: f64,
    pub video_timeout_secs: f64,
    /// Root for per-unit scratch directories
    pub temp_image_dir: PathBuf,
    pub path_mutations: Vec<PathMutation>,
    pub tags: TagNames,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            concurrent_task_limit: 10,
            image_request_batch_size: 320,
            frame_interval: 0.5,
            ai_video_threshold: 0.3,
            create_markers: true,
            image_timeout_secs: 300.0,
            video_timeout_secs: 3600.0,
            temp_image_dir: PathBuf::from("./temp_images"),
            path_mutations: Vec::new(),
            tags: TagNames::default(),
        }
    }
}

impl TaggerConfig {
    /// Load from `path`, falling back to defaults when the file is absent,
    /// then apply the environment override and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                tracing::info!("AI service URL taken from {}", API_URL_ENV);
                config.api_base_url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api_base_url must not be empty".into()));
        }
        if self.concurrent_task_limit == 0 {
            return Err(ConfigError::Invalid(
                "concurrent_task_limit must be at least 1".into(),
            ));
        }
        if self.image_request_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "image_request_batch_size must be at least 1".into(),
            ));
        }
        let timeouts = [self.image_timeout_secs, self.video_timeout_secs];
        if !timeouts
            .iter()
            .all(|t| *t > 0.0 && Duration::try_from_secs_f64(*t).is_ok())
        {
            return Err(ConfigError::Invalid(
                "timeouts must be positive and representable".into(),
            ));
        }
        let names = [
            &self.tags.tagme,
            &self.tags.ai_tagged,
            &self.tags.errored,
            &self.tags.ai_base,
        ];
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::Invalid("system tag names must not be empty".into()));
        }
        Ok(())
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.image_timeout_secs)
    }

    pub fn video_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.video_timeout_secs)
    }

    /// Apply the first matching prefix rewrite.
    pub fn mutate_path(&self, path: &str) -> String {
        for mutation in &self.path_mutations {
            if let Some(rest) = path.strip_prefix(mutation.from.as_str()) {
                return format!("{}{}", mutation.to, rest);
            }
        }
        path.to_string()
    }
}
