//! Library fixture and progress recorder

use ai_tagger::library::{MediaId, TagId};
use ai_tagger::{ItemState, MemoryLibrary, MockAiClient, ProgressReporter, Tagger, TaggerConfig};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

/// Records every reported progress value.
#[derive(Default)]
pub struct RecordingProgress {
    reports: Mutex<Vec<f64>>,
}

impl RecordingProgress {
    pub fn reports(&self) -> Vec<f64> {
        self.reports.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<f64> {
        self.reports().last().copied()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, progress: f64) {
        self.reports.lock().unwrap().push(progress);
    }
}

/// A memory library with the eligibility tag already present.
pub struct TestLibrary {
    pub library: Arc<MemoryLibrary>,
    pub tagme: TagId,
    pub progress: Arc<RecordingProgress>,
}

impl TestLibrary {
    pub fn new() -> Self {
        let library = Arc::new(MemoryLibrary::new());
        let tagme = library.ensure_tag("AI_TagMe");
        Self {
            library,
            tagme,
            progress: Arc::new(RecordingProgress::default()),
        }
    }

    /// Queue an image for tagging.
    pub fn image(&self, path: &str) -> MediaId {
        self.library.add_image(path, &[&self.tagme])
    }

    /// Queue an image that also carries `extra` tags.
    pub fn image_with(&self, path: &str, extra: &[&TagId]) -> MediaId {
        let mut tags = vec![&self.tagme];
        tags.extend_from_slice(extra);
        self.library.add_image(path, &tags)
    }

    /// Queue a scene for tagging.
    pub fn scene(&self, path: &str, extra: &[&TagId]) -> MediaId {
        let mut tags = vec![&self.tagme];
        tags.extend_from_slice(extra);
        self.library.add_scene(path, Some(120.0), &tags)
    }

    pub async fn tagger(&self, ai: Arc<MockAiClient>, config: TaggerConfig) -> Tagger {
        Tagger::initialize(self.library.clone(), ai, config, self.progress.clone())
            .await
            .expect("tagger initialises against the memory library")
    }

    pub fn tag(&self, name: &str) -> TagId {
        self.library
            .tag_id(name)
            .unwrap_or_else(|| panic!("tag {} should exist", name))
    }

    pub fn image_state(&self, tagger: &Tagger, id: &MediaId) -> ItemState {
        ItemState::classify(&self.library.image_tags(id), tagger.registry().system())
    }

    pub fn scene_state(&self, tagger: &Tagger, id: &MediaId) -> ItemState {
        ItemState::classify(&self.library.scene_tags(id), tagger.registry().system())
    }

    /// Every concluded item carries exactly one terminal marker and no
    /// `tagme`.
    pub fn assert_concluded(&self, tagger: &Tagger, tags: &BTreeSet<TagId>) {
        let system = tagger.registry().system();
        assert!(!tags.contains(&system.tagme), "tagme left behind");
        assert_ne!(
            tags.contains(&system.ai_tagged),
            tags.contains(&system.errored),
            "exactly one of ai_tagged/errored expected"
        );
    }
}
