//! In-process media library
//!
//! Keeps tags, images, scenes and markers in memory and records every
//! mutating call. Used by the test suite and for dry runs against the
//! real AI service without touching a live library.

use super::traits::{LibraryError, MediaLibrary};
use super::types::{
    Image, MarkerId, MediaId, MediaKind, MediaPath, NewSceneMarker, Scene, SceneMarker, Tag,
    TagId, TagUpdateMode,
};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

/// A mutating call observed by [`MemoryLibrary`].
#[derive(Debug, Clone, PartialEq)]
pub enum LibraryCall {
    CreateTag {
        name: String,
        parent: Option<TagId>,
    },
    UpdateTags {
        kind: MediaKind,
        ids: Vec<MediaId>,
        tags: Vec<TagId>,
        mode: TagUpdateMode,
    },
    CreateMarker(NewSceneMarker),
    DestroyMarker(MarkerId),
}

struct StoredTag {
    id: TagId,
    name: String,
    parent: Option<TagId>,
}

struct StoredItem {
    id: MediaId,
    path: String,
    duration: Option<f64>,
    tags: BTreeSet<TagId>,
}

struct StoredMarker {
    id: MarkerId,
    marker: NewSceneMarker,
}

#[derive(Default)]
struct State {
    next_id: u64,
    tags: Vec<StoredTag>,
    images: Vec<StoredItem>,
    scenes: Vec<StoredItem>,
    markers: Vec<StoredMarker>,
    vr_tag_name: Option<String>,
    calls: Vec<LibraryCall>,
    fail_marker_creation: bool,
}

impl State {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    fn insert_tag(&mut self, name: &str, parent: Option<TagId>) -> TagId {
        let id = TagId::new(self.next_id());
        self.tags.push(StoredTag {
            id: id.clone(),
            name: name.to_string(),
            parent,
        });
        id
    }

    fn tag_named(&self, name: &str) -> Option<&StoredTag> {
        self.tags.iter().find(|t| t.name == name)
    }

    fn items_mut(&mut self, kind: MediaKind) -> &mut Vec<StoredItem> {
        match kind {
            MediaKind::Image => &mut self.images,
            MediaKind::Scene => &mut self.scenes,
        }
    }
}

/// In-memory [`MediaLibrary`].
#[derive(Default)]
pub struct MemoryLibrary {
    state: Mutex<State>,
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-call; the data is
        // still usable for assertions.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Find or create a top-level tag without recording a call.
    pub fn ensure_tag(&self, name: &str) -> TagId {
        let mut state = self.state();
        if let Some(id) = state.tag_named(name).map(|t| t.id.clone()) {
            return id;
        }
        state.insert_tag(name, None)
    }

    /// Find or create a tag under `parent` without recording a call.
    pub fn ensure_child_tag(&self, name: &str, parent: &TagId) -> TagId {
        let mut state = self.state();
        if let Some(id) = state.tag_named(name).map(|t| t.id.clone()) {
            return id;
        }
        state.insert_tag(name, Some(parent.clone()))
    }

    pub fn set_vr_tag_name(&self, name: Option<&str>) {
        self.state().vr_tag_name = name.map(str::to_string);
    }

    /// Make every subsequent marker creation fail.
    pub fn fail_marker_creation(&self, fail: bool) {
        self.state().fail_marker_creation = fail;
    }

    pub fn add_image(&self, path: &str, tags: &[&TagId]) -> MediaId {
        let mut state = self.state();
        let id = MediaId::new(state.next_id());
        state.images.push(StoredItem {
            id: id.clone(),
            path: path.to_string(),
            duration: None,
            tags: tags.iter().map(|t| (*t).clone()).collect(),
        });
        id
    }

    pub fn add_scene(&self, path: &str, duration: Option<f64>, tags: &[&TagId]) -> MediaId {
        let mut state = self.state();
        let id = MediaId::new(state.next_id());
        state.scenes.push(StoredItem {
            id: id.clone(),
            path: path.to_string(),
            duration,
            tags: tags.iter().map(|t| (*t).clone()).collect(),
        });
        id
    }

    /// Attach a marker without recording a call.
    pub fn add_marker(&self, scene: &MediaId, primary_tag: &TagId, title: &str) -> MarkerId {
        let mut state = self.state();
        let id = MarkerId::new(state.next_id());
        state.markers.push(StoredMarker {
            id: id.clone(),
            marker: NewSceneMarker {
                scene_id: scene.clone(),
                primary_tag: primary_tag.clone(),
                title: title.to_string(),
                seconds: 0.0,
                end_seconds: None,
            },
        });
        id
    }

    pub fn tag_id(&self, name: &str) -> Option<TagId> {
        self.state().tag_named(name).map(|t| t.id.clone())
    }

    pub fn tag_parent(&self, tag: &TagId) -> Option<TagId> {
        self.state()
            .tags
            .iter()
            .find(|t| &t.id == tag)
            .and_then(|t| t.parent.clone())
    }

    pub fn image_tags(&self, id: &MediaId) -> BTreeSet<TagId> {
        self.state()
            .images
            .iter()
            .find(|i| &i.id == id)
            .map(|i| i.tags.clone())
            .unwrap_or_default()
    }

    pub fn scene_tags(&self, id: &MediaId) -> BTreeSet<TagId> {
        self.state()
            .scenes
            .iter()
            .find(|s| &s.id == id)
            .map(|s| s.tags.clone())
            .unwrap_or_default()
    }

    /// Markers currently attached to `scene`.
    pub fn markers(&self, scene: &MediaId) -> Vec<NewSceneMarker> {
        self.state()
            .markers
            .iter()
            .filter(|m| &m.marker.scene_id == scene)
            .map(|m| m.marker.clone())
            .collect()
    }

    /// Every mutating call made through the [`MediaLibrary`] trait so far.
    pub fn calls(&self) -> Vec<LibraryCall> {
        self.state().calls.clone()
    }

    /// Number of `create_tag` calls issued for `name`.
    pub fn create_calls_for(&self, name: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, LibraryCall::CreateTag { name: n, .. } if n == name))
            .count()
    }
}

#[async_trait]
impl MediaLibrary for MemoryLibrary {
    async fn find_tag(&self, name: &str) -> Result<Option<Tag>, LibraryError> {
        Ok(self.state().tag_named(name).map(|t| Tag {
            id: t.id.clone(),
            name: t.name.clone(),
        }))
    }

    async fn create_tag(&self, name: &str, parent: Option<&TagId>) -> Result<Tag, LibraryError> {
        let mut state = self.state();
        if state.tag_named(name).is_some() {
            return Err(LibraryError::Api(format!("tag '{}' already exists", name)));
        }
        state.calls.push(LibraryCall::CreateTag {
            name: name.to_string(),
            parent: parent.cloned(),
        });
        let id = state.insert_tag(name, parent.cloned());
        Ok(Tag {
            id,
            name: name.to_string(),
        })
    }

    async fn descendant_tags(&self, parent: &TagId) -> Result<Vec<TagId>, LibraryError> {
        let state = self.state();
        let mut found: Vec<TagId> = Vec::new();
        let mut frontier = vec![parent.clone()];
        while let Some(current) = frontier.pop() {
            for tag in state.tags.iter().filter(|t| t.parent.as_ref() == Some(&current)) {
                if !found.contains(&tag.id) {
                    found.push(tag.id.clone());
                    frontier.push(tag.id.clone());
                }
            }
        }
        Ok(found)
    }

    async fn vr_tag_name(&self) -> Result<Option<String>, LibraryError> {
        Ok(self.state().vr_tag_name.clone())
    }

    async fn images_with_tag(&self, tag: &TagId) -> Result<Vec<Image>, LibraryError> {
        Ok(self
            .state()
            .images
            .iter()
            .filter(|i| i.tags.contains(tag))
            .map(|i| Image {
                id: i.id.clone(),
                path: MediaPath::parse(&i.path),
            })
            .collect())
    }

    async fn scenes_with_tag(&self, tag: &TagId) -> Result<Vec<Scene>, LibraryError> {
        Ok(self
            .state()
            .scenes
            .iter()
            .filter(|s| s.tags.contains(tag))
            .map(|s| Scene {
                id: s.id.clone(),
                path: s.path.clone(),
                duration: s.duration,
                phash: None,
                tag_ids: s.tags.clone(),
            })
            .collect())
    }

    async fn update_tags(
        &self,
        kind: MediaKind,
        ids: &[MediaId],
        tags: &[TagId],
        mode: TagUpdateMode,
    ) -> Result<(), LibraryError> {
        let mut state = self.state();
        state.calls.push(LibraryCall::UpdateTags {
            kind,
            ids: ids.to_vec(),
            tags: tags.to_vec(),
            mode,
        });
        for item in state.items_mut(kind).iter_mut().filter(|i| ids.contains(&i.id)) {
            for tag in tags {
                match mode {
                    TagUpdateMode::Add => {
                        item.tags.insert(tag.clone());
                    }
                    TagUpdateMode::Remove => {
                        item.tags.remove(tag);
                    }
                }
            }
        }
        Ok(())
    }

    async fn scene_markers(&self, scene: &MediaId) -> Result<Vec<SceneMarker>, LibraryError> {
        Ok(self
            .state()
            .markers
            .iter()
            .filter(|m| &m.marker.scene_id == scene)
            .map(|m| SceneMarker {
                id: m.id.clone(),
                primary_tag: m.marker.primary_tag.clone(),
            })
            .collect())
    }

    async fn create_scene_marker(&self, marker: &NewSceneMarker) -> Result<MarkerId, LibraryError> {
        let mut state = self.state();
        if state.fail_marker_creation {
            return Err(LibraryError::Api("marker creation disabled".to_string()));
        }
        state.calls.push(LibraryCall::CreateMarker(marker.clone()));
        let id = MarkerId::new(state.next_id());
        state.markers.push(StoredMarker {
            id: id.clone(),
            marker: marker.clone(),
        });
        Ok(id)
    }

    async fn destroy_scene_marker(&self, marker: &MarkerId) -> Result<(), LibraryError> {
        let mut state = self.state();
        let before = state.markers.len();
        state.markers.retain(|m| &m.id != marker);
        if state.markers.len() == before {
            return Err(LibraryError::NotFound(format!("marker {}", marker)));
        }
        state.calls.push(LibraryCall::DestroyMarker(marker.clone()));
        Ok(())
    }
}
