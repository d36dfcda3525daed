//! Tagging orchestrator
//!
//! Lists the media carrying `tagme`, partitions it into units and runs one
//! routine per unit. Every routine waits on a shared semaphore before doing
//! any work, so at most `concurrent_task_limit` units are in flight at once
//! across image and scene runs alike. A routine always concludes its items
//! (tagged or errored, `tagme` removed) and always advances progress.

use super::failure::UnitFailure;
use super::partition::{partition_images, partition_scenes, ImageBatch, SceneUnit};
use super::progress::{ProgressCounter, ProgressReporter};
use super::state::TagStateMachine;
use super::tags::TagRegistry;
use crate::config::TaggerConfig;
use crate::dispatch::{AiClient, DispatchError};
use crate::error::{TaggerError, TaggerResult};
use crate::library::{MediaId, MediaKind, MediaLibrary};
use crate::scratch::ScratchSpace;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// What one unit did to its items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct UnitOutcome {
    pub tagged: usize,
    pub errored: usize,
    pub skipped: usize,
}

impl UnitOutcome {
    pub fn tagged(count: usize) -> Self {
        Self {
            tagged: count,
            ..Self::default()
        }
    }

    pub fn errored(count: usize) -> Self {
        Self {
            errored: count,
            ..Self::default()
        }
    }

    pub fn skipped(count: usize) -> Self {
        Self {
            skipped: count,
            ..Self::default()
        }
    }
}

/// Aggregate result of one `tag_images` or `tag_scenes` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub units: usize,
    /// Items that ended `Tagged`
    pub tagged: usize,
    /// Items that ended `Errored` after a dispatch attempt
    pub errored: usize,
    /// Items never dispatched (scenes without a duration). These are
    /// also marked `errored` in the library.
    pub skipped: usize,
}

impl RunSummary {
    fn from_outcomes(outcomes: impl IntoIterator<Item = UnitOutcome>) -> Self {
        outcomes.into_iter().fold(Self::default(), |mut summary, outcome| {
            summary.units += 1;
            summary.tagged += outcome.tagged;
            summary.errored += outcome.errored;
            summary.skipped += outcome.skipped;
            summary
        })
    }
}

/// Drives tagging runs against one library and one AI service.
pub struct Tagger {
    pub(super) library: Arc<dyn MediaLibrary>,
    pub(super) ai: Arc<dyn AiClient>,
    pub(super) config: TaggerConfig,
    pub(super) registry: Arc<TagRegistry>,
    pub(super) state: TagStateMachine,
    pub(super) scratch: ScratchSpace,
    limiter: Arc<Semaphore>,
    reporter: Arc<dyn ProgressReporter>,
}

impl Tagger {
    /// Resolve the system tags and set up the concurrency gate.
    pub async fn initialize(
        library: Arc<dyn MediaLibrary>,
        ai: Arc<dyn AiClient>,
        config: TaggerConfig,
        reporter: Arc<dyn ProgressReporter>,
    ) -> TaggerResult<Self> {
        config.validate()?;
        let registry = Arc::new(
            TagRegistry::initialize(library.clone(), &config.tags)
                .await
                .map_err(TaggerError::Initialize)?,
        );
        let state = TagStateMachine::new(library.clone(), registry.clone());
        let scratch = ScratchSpace::new(config.temp_image_dir.clone());
        let limiter = Arc::new(Semaphore::new(config.concurrent_task_limit));

        tracing::debug!(
            limit = config.concurrent_task_limit,
            batch_size = config.image_request_batch_size,
            ai_service = %config.api_base_url,
            "tagger initialised"
        );

        Ok(Self {
            library,
            ai,
            config,
            registry,
            state,
            scratch,
            limiter,
            reporter,
        })
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    pub fn config(&self) -> &TaggerConfig {
        &self.config
    }

    /// Tag every image carrying `tagme`, in batches.
    pub async fn tag_images(&self) -> TaggerResult<RunSummary> {
        let images = self
            .library
            .images_with_tag(&self.registry.system().tagme)
            .await
            .map_err(|source| TaggerError::Query {
                kind: MediaKind::Image,
                source,
            })?;
        if images.is_empty() {
            tracing::info!(
                "no images to tag; add the {} tag to images to queue them",
                self.config.tags.tagme
            );
            return Ok(RunSummary::default());
        }

        let image_count = images.len();
        let batches = partition_images(images, self.config.image_request_batch_size);
        let progress = ProgressCounter::new(batches.len(), self.reporter.clone());
        tracing::info!(image_count, batch_count = batches.len(), "tagging images");

        let outcomes = join_all(
            batches
                .iter()
                .map(|batch| self.run_image_batch(batch, &progress)),
        )
        .await;

        let summary = RunSummary::from_outcomes(outcomes);
        tracing::info!(
            batches = summary.units,
            tagged = summary.tagged,
            errored = summary.errored,
            "finished tagging images"
        );
        Ok(summary)
    }

    /// Tag every scene carrying `tagme`, one unit per scene.
    pub async fn tag_scenes(&self) -> TaggerResult<RunSummary> {
        let scenes = self
            .library
            .scenes_with_tag(&self.registry.system().tagme)
            .await
            .map_err(|source| TaggerError::Query {
                kind: MediaKind::Scene,
                source,
            })?;
        if scenes.is_empty() {
            tracing::info!(
                "no scenes to tag; add the {} tag to scenes to queue them",
                self.config.tags.tagme
            );
            return Ok(RunSummary::default());
        }

        let units = partition_scenes(scenes);
        let progress = ProgressCounter::new(units.len(), self.reporter.clone());
        tracing::info!(scene_count = units.len(), "tagging scenes");

        let outcomes = join_all(units.iter().map(|unit| self.run_scene(unit, &progress))).await;

        let summary = RunSummary::from_outcomes(outcomes);
        tracing::info!(
            scenes = summary.units,
            tagged = summary.tagged,
            errored = summary.errored,
            skipped = summary.skipped,
            "finished tagging scenes"
        );
        Ok(summary)
    }

    async fn run_image_batch(&self, batch: &ImageBatch, progress: &ProgressCounter) -> UnitOutcome {
        let outcome = match self.limiter.acquire().await {
            Ok(_permit) => match self.tag_image_batch(batch).await {
                Ok(outcome) => outcome,
                Err(failure) => self.fail_unit(MediaKind::Image, &batch.ids(), failure).await,
            },
            Err(e) => {
                let failure = UnitFailure::Other(format!("concurrency gate closed: {}", e));
                self.fail_unit(MediaKind::Image, &batch.ids(), failure).await
            }
        };
        progress.unit_finished();
        outcome
    }

    async fn run_scene(&self, unit: &SceneUnit, progress: &ProgressCounter) -> UnitOutcome {
        let ids = [unit.scene.id.clone()];
        let outcome = match self.limiter.acquire().await {
            Ok(_permit) => match self.tag_scene(&unit.scene).await {
                Ok(outcome) => outcome,
                Err(failure) => self.fail_unit(MediaKind::Scene, &ids, failure).await,
            },
            Err(e) => {
                let failure = UnitFailure::Other(format!("concurrency gate closed: {}", e));
                self.fail_unit(MediaKind::Scene, &ids, failure).await
            }
        };
        progress.unit_finished();
        outcome
    }

    /// Conclude every item of a failed unit as `errored`.
    async fn fail_unit(&self, kind: MediaKind, ids: &[MediaId], failure: UnitFailure) -> UnitOutcome {
        tracing::error!(
            media = %kind,
            items = ids.len(),
            failure = ?failure.kind(),
            error = %failure,
            "unit failed"
        );
        if matches!(failure, UnitFailure::Dispatch(DispatchError::Connection(_))) {
            tracing::error!(
                "cannot reach the AI service at {}; is it running?",
                self.config.api_base_url
            );
        }
        if let Err(e) = self.state.conclude_errored(kind, ids).await {
            tracing::error!(media = %kind, error = %e, "failed to mark items as errored");
        }
        UnitOutcome::errored(ids.len())
    }

    /// Run one dispatch under `deadline`.
    pub(super) async fn dispatch<T, F>(
        &self,
        deadline: Duration,
        call: F,
    ) -> Result<Option<T>, UnitFailure>
    where
        F: Future<Output = Result<Option<T>, DispatchError>>,
    {
        match tokio::time::timeout(deadline, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(UnitFailure::Deadline(deadline)),
        }
    }
}
