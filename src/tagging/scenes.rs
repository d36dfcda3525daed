//! Scene processing: sidecar cache, dispatch, tag replacement and markers

use super::failure::UnitFailure;
use super::orchestrator::{Tagger, UnitOutcome};
use super::state::ItemState;
use crate::dispatch::{VideoRequest, VideoTagInfo};
use crate::library::{MediaId, MediaKind, NewSceneMarker, Scene};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Suffix of the result file kept next to each scene.
pub const SIDECAR_SUFFIX: &str = ".AI.json";

/// `<scene_path>.AI.json`
pub fn sidecar_path(scene_path: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", scene_path, SIDECAR_SUFFIX))
}

/// Previously persisted result for an already-tagged scene. Any problem
/// reading it means the scene is processed fresh.
async fn read_sidecar(path: &Path) -> Option<Value> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(
                path = %path.display(),
                "scene is already tagged but has no result file; processing it again"
            );
            return None;
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read result file");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "result file is not valid JSON");
            None
        }
    }
}

async fn write_sidecar(path: &Path, result: &Value) -> Result<(), UnitFailure> {
    let bytes = serde_json::to_vec(result)
        .map_err(|e| UnitFailure::Other(format!("cannot serialise AI result: {}", e)))?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| UnitFailure::Sidecar {
            path: path.to_path_buf(),
            source,
        })
}

impl Tagger {
    /// Process one scene. Errors after dispatch leave whatever was already
    /// written (sidecar, markers) in place; the caller marks the scene
    /// `errored`.
    pub(super) async fn tag_scene(&self, scene: &Scene) -> Result<UnitOutcome, UnitFailure> {
        let system = self.registry.system();
        let ids = [scene.id.clone()];

        if scene.duration.is_none() {
            tracing::error!(scene_id = %scene.id, path = %scene.path, "scene has no duration; not dispatching it");
            self.state.conclude_errored(MediaKind::Scene, &ids).await?;
            return Ok(UnitOutcome::skipped(1));
        }

        tracing::debug!(
            scene_id = %scene.id,
            state = ?ItemState::classify(&scene.tag_ids, system),
            "processing scene"
        );
        let already_tagged = scene.has_tag(&system.ai_tagged);
        let vr_video = system.vr.as_ref().is_some_and(|vr| scene.has_tag(vr));
        if vr_video {
            tracing::info!(path = %scene.path, "processing VR scene");
        }

        let sidecar = sidecar_path(&scene.path);
        let existing_result = if already_tagged {
            read_sidecar(&sidecar).await
        } else {
            None
        };

        let request = VideoRequest {
            path: self.config.mutate_path(&scene.path),
            vr_video,
            existing_result,
        };
        let result = self
            .dispatch(self.config.video_timeout(), self.ai.process_video(&request))
            .await?;
        let Some(result) = result else {
            tracing::error!(scene_id = %scene.id, "AI service returned no result for scene");
            self.state.conclude_errored(MediaKind::Scene, &ids).await?;
            return Ok(UnitOutcome::errored(1));
        };

        let payload = &result.result;
        if !payload.json_result.is_null() {
            write_sidecar(&sidecar, &payload.json_result).await?;
        }

        let info = &payload.video_tag_info;
        let tags = self.registry.resolve_all(info.all_tags()).await?;
        self.state
            .clear_ai_tags(MediaKind::Scene, &ids, true)
            .await?;
        self.state.apply_tags(MediaKind::Scene, &ids, &tags).await?;

        let markers = if self.config.create_markers {
            self.replace_markers(&scene.id, info).await?
        } else {
            0
        };

        tracing::info!(
            scene_id = %scene.id,
            tags = tags.len(),
            markers,
            "tagged scene"
        );
        Ok(UnitOutcome::tagged(1))
    }

    /// Drop markers whose primary tag is AI-origin, then add one marker per
    /// detected interval. Returns the number created.
    async fn replace_markers(&self, scene_id: &MediaId, info: &VideoTagInfo) -> Result<usize, UnitFailure> {
        for marker in self.library.scene_markers(scene_id).await? {
            if self.registry.is_ai_origin(&marker.primary_tag) {
                self.library.destroy_scene_marker(&marker.id).await?;
            }
        }

        let mut created = 0;
        for (tag, frame) in info.timespans() {
            let primary_tag = self.registry.resolve(tag).await?;
            let marker = NewSceneMarker {
                scene_id: scene_id.clone(),
                primary_tag,
                title: tag.to_string(),
                seconds: frame.start,
                end_seconds: frame.end,
            };
            self.library.create_scene_marker(&marker).await?;
            created += 1;
        }
        Ok(created)
    }
}
