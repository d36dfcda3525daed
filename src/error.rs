//! Run-level errors
//!
//! These abort a whole run before or between dispatches. Failures inside a
//! single unit are [`crate::tagging::UnitFailure`] and never surface here.

use crate::config::ConfigError;
use crate::dispatch::DispatchError;
use crate::library::{LibraryError, MediaKind};
use crate::plugin::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaggerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("plugin protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("cannot enter plugin directory {path}: {source}")]
    WorkingDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot set up AI client: {0}")]
    Client(#[from] DispatchError),

    #[error("cannot connect to media library: {0}")]
    Connect(#[source] LibraryError),

    #[error("cannot resolve system tags: {0}")]
    Initialize(#[source] LibraryError),

    #[error("cannot list {kind}s awaiting tagging: {source}")]
    Query {
        kind: MediaKind,
        source: LibraryError,
    },
}

pub type TaggerResult<T> = Result<T, TaggerError>;
