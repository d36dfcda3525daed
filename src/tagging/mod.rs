//! Concurrency-bounded tagging
//!
//! [`Tagger`] selects media carrying `tagme`, partitions it into units,
//! dispatches the units to the AI service under a shared concurrency cap and
//! reconciles each result into tag and marker mutations. Every item leaves a
//! run either `Tagged` or `Errored`, never still pending.

mod failure;
mod images;
mod orchestrator;
mod partition;
mod progress;
mod scenes;
mod state;
mod tags;

pub use failure::{FailureKind, UnitFailure};
pub use orchestrator::{RunSummary, Tagger};
pub use partition::{partition_images, partition_scenes, ImageBatch, SceneUnit};
pub use progress::{LogProgress, ProgressCounter, ProgressReporter};
pub use scenes::{sidecar_path, SIDECAR_SUFFIX};
pub use state::{ItemState, TagStateMachine};
pub use tags::{SystemTags, TagRegistry};
