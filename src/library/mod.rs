//! Media-library collaborator
//!
//! The tagger reads eligible media and mutates tags and markers only
//! through [`MediaLibrary`]. Two implementations ship with the crate: a
//! GraphQL client for a live server and an in-memory library.

mod memory;
mod stash;
mod traits;
mod types;

pub use memory::{LibraryCall, MemoryLibrary};
pub use stash::StashClient;
pub use traits::{LibraryError, MediaLibrary};
pub use types::{
    Image, MarkerId, MediaId, MediaKind, MediaPath, NewSceneMarker, Scene, SceneMarker, Tag,
    TagId, TagUpdateMode,
};
