//! Tag name resolution and the AI-origin tag set
//!
//! The registry caches name → id for one run. A name missing from the
//! library is created under the AI base tag, which is also how AI-origin
//! tags are recognised later without keeping an explicit list.

use crate::config::TagNames;
use crate::library::{LibraryError, MediaLibrary, TagId};
use dashmap::{DashMap, DashSet};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The reserved tags every run depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTags {
    /// Marks an item as eligible for processing
    pub tagme: TagId,
    /// Marks successful completion
    pub ai_tagged: TagId,
    /// Marks failed completion
    pub errored: TagId,
    /// Parent of every AI-generated tag
    pub ai_base: TagId,
    /// The library's configured VR tag, when there is one
    pub vr: Option<TagId>,
}

pub struct TagRegistry {
    library: Arc<dyn MediaLibrary>,
    system: SystemTags,
    by_name: DashMap<String, TagId>,
    ai_origin: DashSet<TagId>,
    /// Serialises cache misses so a name is created at most once
    create_lock: Mutex<()>,
}

impl TagRegistry {
    /// Resolve (creating if needed) the system tags, look up the VR tag and
    /// seed the AI-origin set from everything below the base tag.
    pub async fn initialize(
        library: Arc<dyn MediaLibrary>,
        names: &TagNames,
    ) -> Result<Self, LibraryError> {
        let tagme = top_level_tag(library.as_ref(), &names.tagme).await?;
        let ai_tagged = top_level_tag(library.as_ref(), &names.ai_tagged).await?;
        let errored = top_level_tag(library.as_ref(), &names.errored).await?;
        let ai_base = top_level_tag(library.as_ref(), &names.ai_base).await?;

        let by_name = DashMap::new();
        by_name.insert(names.tagme.clone(), tagme.clone());
        by_name.insert(names.ai_tagged.clone(), ai_tagged.clone());
        by_name.insert(names.errored.clone(), errored.clone());
        by_name.insert(names.ai_base.clone(), ai_base.clone());

        let vr = match library.vr_tag_name().await? {
            None => {
                tracing::warn!("no VR tag configured in the library; scenes are never sent as VR");
                None
            }
            Some(name) => match library.find_tag(&name).await? {
                Some(tag) => Some(tag.id),
                None => {
                    tracing::warn!(tag = %name, "configured VR tag does not exist; scenes are never sent as VR");
                    None
                }
            },
        };

        let ai_origin: DashSet<TagId> = library
            .descendant_tags(&ai_base)
            .await?
            .into_iter()
            .collect();
        tracing::debug!(count = ai_origin.len(), "loaded existing AI tags");

        Ok(Self {
            library,
            system: SystemTags {
                tagme,
                ai_tagged,
                errored,
                ai_base,
                vr,
            },
            by_name,
            ai_origin,
            create_lock: Mutex::new(()),
        })
    }

    pub fn system(&self) -> &SystemTags {
        &self.system
    }

    pub fn is_ai_origin(&self, tag: &TagId) -> bool {
        self.ai_origin.contains(tag)
    }

    /// Every known AI-origin tag, sorted.
    pub fn ai_origin_tags(&self) -> Vec<TagId> {
        let tags: BTreeSet<TagId> = self.ai_origin.iter().map(|t| t.key().clone()).collect();
        tags.into_iter().collect()
    }

    /// Tag id for `name`, creating it under the AI base tag if the library
    /// has no such tag.
    pub async fn resolve(&self, name: &str) -> Result<TagId, LibraryError> {
        if let Some(id) = self.by_name.get(name) {
            return Ok(id.clone());
        }

        let _guard = self.create_lock.lock().await;
        if let Some(id) = self.by_name.get(name) {
            return Ok(id.clone());
        }

        let id = match self.library.find_tag(name).await? {
            Some(tag) => tag.id,
            None => {
                let tag = self
                    .library
                    .create_tag(name, Some(&self.system.ai_base))
                    .await?;
                tracing::debug!(tag = %name, id = %tag.id, "created AI tag");
                self.ai_origin.insert(tag.id.clone());
                tag.id
            }
        };
        self.by_name.insert(name.to_string(), id.clone());
        Ok(id)
    }

    /// Resolve every name, deduplicating the resulting ids.
    pub async fn resolve_all<'a, I>(&self, names: I) -> Result<BTreeSet<TagId>, LibraryError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut ids = BTreeSet::new();
        for name in names {
            ids.insert(self.resolve(name).await?);
        }
        Ok(ids)
    }
}

async fn top_level_tag(library: &dyn MediaLibrary, name: &str) -> Result<TagId, LibraryError> {
    match library.find_tag(name).await? {
        Some(tag) => Ok(tag.id),
        None => {
            tracing::info!(tag = %name, "creating system tag");
            Ok(library.create_tag(name, None).await?.id)
        }
    }
}
