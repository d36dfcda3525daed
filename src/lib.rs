//! AI tagger: batch-tags images and scenes in a media library
//!
//! Media carrying the `tagme` tag is sent to an external AI inference
//! service and the returned labels are reconciled back into the library as
//! tags (and, for scenes, time-coded markers).
//!
//! # Core Concepts
//!
//! - **Units**: images are dispatched in fixed-size batches, scenes one at a
//!   time; at most `concurrent_task_limit` units are in flight at once
//! - **Tag state**: every item's lifecycle is expressed through tags
//!   (`tagme` → `ai_tagged` | `errored`), so runs are resumable
//! - **Collaborators**: the library and the AI service sit behind the
//!   [`MediaLibrary`] and [`AiClient`] traits
//!
//! # Example
//!
//! ```no_run
//! use ai_tagger::{LogProgress, MemoryLibrary, MockAiClient, Tagger, TaggerConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> ai_tagger::TaggerResult<()> {
//! let tagger = Tagger::initialize(
//!     Arc::new(MemoryLibrary::new()),
//!     Arc::new(MockAiClient::new()),
//!     TaggerConfig::default(),
//!     Arc::new(LogProgress),
//! )
//! .await?;
//! let summary = tagger.tag_images().await?;
//! println!("{} tagged, {} errored", summary.tagged, summary.errored);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod library;
pub mod logging;
pub mod plugin;
pub mod scratch;
pub mod tagging;

pub use config::{ConfigError, PathMutation, TagNames, TaggerConfig};
pub use dispatch::{AiClient, DispatchError, HttpAiClient, MockAiClient};
pub use error::{TaggerError, TaggerResult};
pub use library::{LibraryError, MediaLibrary, MediaPath, MemoryLibrary, StashClient};
pub use scratch::{ScratchError, ScratchSpace};
pub use tagging::{
    FailureKind, ItemState, LogProgress, ProgressReporter, RunSummary, Tagger, UnitFailure,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
