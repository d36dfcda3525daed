//! The media-library contract the tagger consumes

use super::types::{
    Image, MarkerId, MediaId, MediaKind, NewSceneMarker, Scene, SceneMarker, Tag, TagId,
    TagUpdateMode,
};
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a media-library implementation.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("library unreachable: {0}")]
    Transport(String),

    #[error("library rejected request: {0}")]
    Api(String),

    #[error("unexpected library response: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for LibraryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Media-library collaborator.
///
/// The library is the single source of truth for tag membership and
/// markers; implementations issue each call as-is and rely on the library
/// to serialise writes to the same item.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Look a tag up by exact name.
    async fn find_tag(&self, name: &str) -> Result<Option<Tag>, LibraryError>;

    /// Create a tag, optionally under a parent. Auto-tagging is disabled on
    /// tags created here.
    async fn create_tag(&self, name: &str, parent: Option<&TagId>) -> Result<Tag, LibraryError>;

    /// Every tag below `parent`, at any depth.
    async fn descendant_tags(&self, parent: &TagId) -> Result<Vec<TagId>, LibraryError>;

    /// Name of the tag the library's UI treats as "VR", if configured.
    async fn vr_tag_name(&self) -> Result<Option<String>, LibraryError>;

    /// Images carrying `tag`, in library query order.
    async fn images_with_tag(&self, tag: &TagId) -> Result<Vec<Image>, LibraryError>;

    /// Scenes carrying `tag`, in library query order.
    async fn scenes_with_tag(&self, tag: &TagId) -> Result<Vec<Scene>, LibraryError>;

    /// Add or remove a set of tags on a set of items.
    async fn update_tags(
        &self,
        kind: MediaKind,
        ids: &[MediaId],
        tags: &[TagId],
        mode: TagUpdateMode,
    ) -> Result<(), LibraryError>;

    /// Markers currently attached to a scene.
    async fn scene_markers(&self, scene: &MediaId) -> Result<Vec<SceneMarker>, LibraryError>;

    async fn create_scene_marker(&self, marker: &NewSceneMarker) -> Result<MarkerId, LibraryError>;

    async fn destroy_scene_marker(&self, marker: &MarkerId) -> Result<(), LibraryError>;
}
