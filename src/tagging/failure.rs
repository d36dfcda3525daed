//! Unit-scoped failures
//!
//! Anything that goes wrong inside one unit's routine ends up here. The
//! routine converts it into `errored` + `tagme` removal for the unit's items;
//! it never reaches sibling units or the run as a whole.

use crate::dispatch::DispatchError;
use crate::library::LibraryError;
use crate::scratch::ScratchError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnitFailure {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("dispatch exceeded its {0:?} deadline")]
    Deadline(Duration),

    #[error("malformed AI response: {0}")]
    Malformed(String),

    #[error("archive extraction failed: {0}")]
    Extraction(#[from] ScratchError),

    #[error("library call failed: {0}")]
    Library(#[from] LibraryError),

    #[error("cannot write result file {path}: {source}")]
    Sidecar {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Coarse classification used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ConnectionFailure,
    Timeout,
    MalformedResponse,
    ArchiveExtractionFailure,
    Unknown,
}

impl UnitFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Dispatch(DispatchError::Connection(_)) => FailureKind::ConnectionFailure,
            Self::Dispatch(DispatchError::Timeout(_)) | Self::Deadline(_) => FailureKind::Timeout,
            Self::Dispatch(DispatchError::MalformedResponse(_)) | Self::Malformed(_) => {
                FailureKind::MalformedResponse
            }
            Self::Extraction(_) => FailureKind::ArchiveExtractionFailure,
            Self::Dispatch(DispatchError::Other(_))
            | Self::Library(_)
            | Self::Sidecar { .. }
            | Self::Other(_) => FailureKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_failure_taxonomy() {
        let cases = [
            (
                UnitFailure::Dispatch(DispatchError::Connection("refused".into())),
                FailureKind::ConnectionFailure,
            ),
            (UnitFailure::Deadline(Duration::from_secs(5)), FailureKind::Timeout),
            (
                UnitFailure::Dispatch(DispatchError::Timeout("read".into())),
                FailureKind::Timeout,
            ),
            (UnitFailure::Malformed("3 != 2".into()), FailureKind::MalformedResponse),
            (
                UnitFailure::Extraction(ScratchError::UnsafeMember("../x".into())),
                FailureKind::ArchiveExtractionFailure,
            ),
            (
                UnitFailure::Library(LibraryError::Api("denied".into())),
                FailureKind::Unknown,
            ),
        ];
        for (failure, kind) in cases {
            assert_eq!(failure.kind(), kind, "{}", failure);
        }
    }

    #[test]
    fn deadline_message_names_the_limit() {
        let failure = UnitFailure::Deadline(Duration::from_secs(300));
        assert_eq!(failure.to_string(), "dispatch exceeded its 300s deadline");
    }
}
