//! Media-library data types consumed by the tagger
//!
//! Only the fields the tagger reads are modelled. Identifiers are opaque
//! strings issued by the library.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of an image or scene, unique within its kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MediaId(String);

impl MediaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Numeric-ish tag identity as issued by the library.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagId(String);

impl TagId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a scene marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerId(String);

impl MarkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which collection a tag mutation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Scene,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Scene => write!(f, "scene"),
        }
    }
}

/// Additive or subtractive tag-set update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagUpdateMode {
    Add,
    Remove,
}

impl TagUpdateMode {
    /// The mode keyword used by the library's bulk-update API.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Remove => "REMOVE",
        }
    }
}

/// A named tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// Where a media file lives.
///
/// Files stored inside a zip container are addressed by the library with a
/// composite path (`/gallery/set.zip/inner/photo.jpg`). That string is split
/// once, at listing time, so nothing downstream re-parses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPath {
    /// A plain file on disk.
    Direct(String),
    /// A member of an archive container.
    ArchiveMember {
        /// Path of the archive itself, up to and including the extension
        archive: String,
        /// Forward-slash member path inside the archive
        member: String,
    },
}

const ARCHIVE_MARKER: &str = ".zip";

impl MediaPath {
    /// Split a library path into direct or archive-member form.
    ///
    /// The first `.zip` (case-insensitive) followed by a path separator marks
    /// the archive boundary. A path that merely ends in `.zip` is the archive
    /// file itself and stays `Direct`.
    pub fn parse(path: &str) -> Self {
        let lowered = path.to_ascii_lowercase();
        let mut search_from = 0;
        while let Some(offset) = lowered[search_from..].find(ARCHIVE_MARKER) {
            let end = search_from + offset + ARCHIVE_MARKER.len();
            match path[end..].chars().next() {
                Some('/') | Some('\\') => {
                    let member = path[end + 1..].replace('\\', "/");
                    if member.is_empty() {
                        break;
                    }
                    return Self::ArchiveMember {
                        archive: path[..end].to_string(),
                        member,
                    };
                }
                _ => search_from = end,
            }
        }
        Self::Direct(path.to_string())
    }

    pub fn is_archive_member(&self) -> bool {
        matches!(self, Self::ArchiveMember { .. })
    }
}

impl fmt::Display for MediaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(path) => f.write_str(path),
            Self::ArchiveMember { archive, member } => write!(f, "{}/{}", archive, member),
        }
    }
}

/// An image carrying the eligibility tag.
#[derive(Debug, Clone)]
pub struct Image {
    pub id: MediaId,
    pub path: MediaPath,
}

/// A scene carrying the eligibility tag.
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: MediaId,
    /// Path of the scene's primary file
    pub path: String,
    /// Duration in seconds; scenes without one are never dispatched
    pub duration: Option<f64>,
    /// Perceptual hash of the primary file, when the library has one
    pub phash: Option<String>,
    pub tag_ids: BTreeSet<TagId>,
}

impl Scene {
    pub fn has_tag(&self, tag: &TagId) -> bool {
        self.tag_ids.contains(tag)
    }
}

/// An existing scene marker.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMarker {
    pub id: MarkerId,
    pub primary_tag: TagId,
}

/// A marker to create on a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSceneMarker {
    pub scene_id: MediaId,
    pub primary_tag: TagId,
    pub title: String,
    pub seconds: f64,
    pub end_seconds: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path_is_direct() {
        assert_eq!(
            MediaPath::parse("/media/photos/a.jpg"),
            MediaPath::Direct("/media/photos/a.jpg".to_string())
        );
    }

    #[test]
    fn archive_member_is_split_at_marker() {
        assert_eq!(
            MediaPath::parse("/media/something.zip/inner/photo.jpg"),
            MediaPath::ArchiveMember {
                archive: "/media/something.zip".to_string(),
                member: "inner/photo.jpg".to_string(),
            }
        );
    }

    #[test]
    fn windows_member_separators_are_normalized() {
        assert_eq!(
            MediaPath::parse(r"C:\media\set.ZIP\inner\photo.jpg"),
            MediaPath::ArchiveMember {
                archive: r"C:\media\set.ZIP".to_string(),
                member: "inner/photo.jpg".to_string(),
            }
        );
    }

    #[test]
    fn zip_file_itself_is_direct() {
        assert!(!MediaPath::parse("/media/set.zip").is_archive_member());
        assert!(!MediaPath::parse("/media/set.zip/").is_archive_member());
    }

    #[test]
    fn marker_inside_a_name_is_not_a_boundary() {
        assert_eq!(
            MediaPath::parse("/media/file.zipper/photo.jpg"),
            MediaPath::Direct("/media/file.zipper/photo.jpg".to_string())
        );
        assert_eq!(
            MediaPath::parse("/media/a.zipx/b.zip/c.jpg"),
            MediaPath::ArchiveMember {
                archive: "/media/a.zipx/b.zip".to_string(),
                member: "c.jpg".to_string(),
            }
        );
    }

    #[test]
    fn display_round_trips_member_form() {
        let path = MediaPath::parse("/media/set.zip/x/y.png");
        assert_eq!(path.to_string(), "/media/set.zip/x/y.png");
    }
}
