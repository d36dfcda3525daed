//! Scratch space for archive-contained media
//!
//! The AI service needs real files. Members of zip containers are extracted
//! into a per-unit `worker_<n>` directory under the scratch root; the
//! returned [`ScratchResources`] removes everything it created when dropped,
//! so cleanup happens on every exit path of the unit that owns it.

use crate::library::MediaPath;
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScratchError {
    #[error("cannot open archive {archive}: {source}")]
    OpenArchive {
        archive: String,
        source: std::io::Error,
    },

    #[error("cannot read {member} from {archive}: {source}")]
    Archive {
        archive: String,
        member: String,
        source: zip::result::ZipError,
    },

    #[error("archive member {0} would escape the scratch directory")]
    UnsafeMember(String),

    #[error("scratch I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("extraction task failed: {0}")]
    Task(String),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ScratchError + '_ {
    move |source| ScratchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Filesystem entries created for one unit. Removed on drop, newest first.
#[derive(Debug, Default)]
pub struct ScratchResources {
    entries: Vec<PathBuf>,
}

impl ScratchResources {
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: PathBuf) {
        self.entries.push(entry);
    }
}

impl Drop for ScratchResources {
    fn drop(&mut self) {
        for entry in self.entries.iter().rev() {
            let result = if entry.is_dir() {
                std::fs::remove_dir_all(entry)
            } else {
                std::fs::remove_file(entry)
            };
            if let Err(e) = result {
                tracing::debug!(path = %entry.display(), error = %e, "failed to remove scratch entry");
            }
        }
    }
}

/// Resolved dispatch paths for one unit plus the resources backing them.
#[derive(Debug)]
pub struct PreparedUnit {
    /// One path per input item, in input order
    pub paths: Vec<String>,
    pub resources: ScratchResources,
}

/// Allocates per-unit scratch directories under a root.
#[derive(Debug)]
pub struct ScratchSpace {
    root: PathBuf,
    workers: AtomicU64,
}

impl ScratchSpace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            workers: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a unit's paths, extracting archive members.
    ///
    /// Direct paths pass through untouched. The unit's worker directory is
    /// allocated the first time one of its paths needs extraction, and each
    /// member lands in its own `<worker>/<index>/` slot. On error
    /// everything extracted so far is removed before returning.
    pub async fn prepare(&self, paths: &[MediaPath]) -> Result<PreparedUnit, ScratchError> {
        let mut resources = ScratchResources::default();
        let mut worker_dir: Option<PathBuf> = None;
        let mut resolved = Vec::with_capacity(paths.len());

        for (index, path) in paths.iter().enumerate() {
            match path {
                MediaPath::Direct(p) => resolved.push(p.clone()),
                MediaPath::ArchiveMember { archive, member } => {
                    let dir = match &worker_dir {
                        Some(dir) => dir.clone(),
                        None => {
                            let dir = self.allocate_worker_dir()?;
                            tokio::fs::create_dir_all(&dir)
                                .await
                                .map_err(io_error(&dir))?;
                            resources.push(dir.clone());
                            worker_dir = Some(dir.clone());
                            dir
                        }
                    };

                    // Members from different archives may share a name.
                    let slot = dir.join(index.to_string());
                    let (archive, member) = (archive.clone(), member.clone());
                    let extracted = tokio::task::spawn_blocking(move || {
                        extract_member(&archive, &member, &slot)
                    })
                    .await
                    .map_err(|e| ScratchError::Task(e.to_string()))??;

                    tracing::debug!(path = %extracted.display(), "extracted archive member");
                    resolved.push(extracted.to_string_lossy().into_owned());
                    resources.push(extracted);
                }
            }
        }

        Ok(PreparedUnit {
            paths: resolved,
            resources,
        })
    }

    fn allocate_worker_dir(&self) -> Result<PathBuf, ScratchError> {
        let worker = self.workers.fetch_add(1, Ordering::SeqCst) + 1;
        absolutize(&self.root.join(format!("worker_{}", worker)))
    }
}

/// Absolute, `.`-free form of `path`.
fn absolutize(path: &Path) -> Result<PathBuf, ScratchError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(io_error(path))?
            .join(path)
    };
    Ok(absolute
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect())
}

/// Relative path for `member`, refusing anything that climbs out of the
/// extraction directory.
fn member_relative_path(member: &str) -> Result<PathBuf, ScratchError> {
    let mut relative = PathBuf::new();
    for part in member.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(ScratchError::UnsafeMember(member.to_string())),
            part if part.contains(':') => {
                return Err(ScratchError::UnsafeMember(member.to_string()))
            }
            part => relative.push(part),
        }
    }
    if member.starts_with('/') || relative.as_os_str().is_empty() {
        return Err(ScratchError::UnsafeMember(member.to_string()));
    }
    Ok(relative)
}

fn extract_member(archive: &str, member: &str, dir: &Path) -> Result<PathBuf, ScratchError> {
    let relative = member_relative_path(member)?;
    let target = dir.join(relative);

    let file = File::open(archive).map_err(|source| ScratchError::OpenArchive {
        archive: archive.to_string(),
        source,
    })?;
    let zip_error = |source| ScratchError::Archive {
        archive: archive.to_string(),
        member: member.to_string(),
        source,
    };
    let mut zip = zip::ZipArchive::new(file).map_err(zip_error)?;
    let mut entry = zip.by_name(member).map_err(zip_error)?;

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let mut out = File::create(&target).map_err(io_error(&target))?;
    std::io::copy(&mut entry, &mut out).map_err(io_error(&target))?;

    Ok(target)
}
