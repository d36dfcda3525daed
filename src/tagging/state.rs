//! Per-item lifecycle, expressed purely through tag membership
//!
//! ```text
//! Untouched --(tagme added externally)--> Pending --(unit admitted)--> Processing
//! Processing --> Tagged   (ai_tagged, no tagme, no errored)
//! Processing --> Errored  (errored, no tagme, no ai_tagged)
//! Tagged | Errored --(tagme re-added)--> Pending
//! ```
//!
//! `Processing` is never written to the library; it only exists while a unit
//! routine holds a concurrency slot.

use super::tags::{SystemTags, TagRegistry};
use crate::library::{LibraryError, MediaId, MediaKind, MediaLibrary, TagId, TagUpdateMode};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Lifecycle state observable from an item's tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Untouched,
    Pending,
    Tagged,
    Errored,
}

impl ItemState {
    pub fn classify(tags: &BTreeSet<TagId>, system: &SystemTags) -> Self {
        if tags.contains(&system.tagme) {
            Self::Pending
        } else if tags.contains(&system.errored) {
            Self::Errored
        } else if tags.contains(&system.ai_tagged) {
            Self::Tagged
        } else {
            Self::Untouched
        }
    }
}

/// Issues the tag mutations that move items between states.
///
/// Each transition is a fixed sequence of bulk add/remove calls; calls with
/// no ids or no tags are skipped.
pub struct TagStateMachine {
    library: Arc<dyn MediaLibrary>,
    registry: Arc<TagRegistry>,
}

impl TagStateMachine {
    pub fn new(library: Arc<dyn MediaLibrary>, registry: Arc<TagRegistry>) -> Self {
        Self { library, registry }
    }

    async fn update(
        &self,
        kind: MediaKind,
        ids: &[MediaId],
        tags: &[TagId],
        mode: TagUpdateMode,
    ) -> Result<(), LibraryError> {
        if ids.is_empty() || tags.is_empty() {
            return Ok(());
        }
        self.library.update_tags(kind, ids, tags, mode).await
    }

    /// Strip AI-origin tags and both terminal markers, and `tagme` when
    /// `include_tagme` is set.
    pub async fn clear_ai_tags(
        &self,
        kind: MediaKind,
        ids: &[MediaId],
        include_tagme: bool,
    ) -> Result<(), LibraryError> {
        let system = self.registry.system();
        let mut tags = self.registry.ai_origin_tags();
        tags.push(system.ai_tagged.clone());
        tags.push(system.errored.clone());
        if include_tagme {
            tags.push(system.tagme.clone());
        }
        self.update(kind, ids, &tags, TagUpdateMode::Remove).await
    }

    /// Add `tags` plus `ai_tagged`.
    pub async fn apply_tags(
        &self,
        kind: MediaKind,
        ids: &[MediaId],
        tags: &BTreeSet<TagId>,
    ) -> Result<(), LibraryError> {
        let mut tags: Vec<TagId> = tags.iter().cloned().collect();
        let ai_tagged = &self.registry.system().ai_tagged;
        if !tags.contains(ai_tagged) {
            tags.push(ai_tagged.clone());
        }
        self.update(kind, ids, &tags, TagUpdateMode::Add).await
    }

    /// Replace `ai_tagged` with `errored`. Other tags are left alone.
    pub async fn mark_errored(&self, kind: MediaKind, ids: &[MediaId]) -> Result<(), LibraryError> {
        let system = self.registry.system();
        self.update(kind, ids, &[system.ai_tagged.clone()], TagUpdateMode::Remove)
            .await?;
        self.update(kind, ids, &[system.errored.clone()], TagUpdateMode::Add)
            .await
    }

    /// Remove `tagme`, concluding processing.
    pub async fn release(&self, kind: MediaKind, ids: &[MediaId]) -> Result<(), LibraryError> {
        let tagme = self.registry.system().tagme.clone();
        self.update(kind, ids, &[tagme], TagUpdateMode::Remove).await
    }

    /// `mark_errored` then `release`.
    pub async fn conclude_errored(&self, kind: MediaKind, ids: &[MediaId]) -> Result<(), LibraryError> {
        self.mark_errored(kind, ids).await?;
        self.release(kind, ids).await
    }
}
