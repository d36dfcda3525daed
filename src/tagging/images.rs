//! Image batch processing and reconciliation

use super::failure::UnitFailure;
use super::orchestrator::{Tagger, UnitOutcome};
use super::partition::ImageBatch;
use crate::dispatch::{ImageOutcome, ImageResult};
use crate::library::{MediaId, MediaKind};
use std::slice;

impl Tagger {
    /// Extract, dispatch and reconcile one batch.
    ///
    /// Scratch files for archive members live until this returns, whatever
    /// the outcome.
    pub(super) async fn tag_image_batch(&self, batch: &ImageBatch) -> Result<UnitOutcome, UnitFailure> {
        let prepared = self.scratch.prepare(&batch.paths()).await?;
        let paths: Vec<String> = prepared
            .paths
            .iter()
            .map(|path| self.config.mutate_path(path))
            .collect();

        let result = self
            .dispatch(self.config.image_timeout(), self.ai.process_images(&paths))
            .await?
            .ok_or_else(|| UnitFailure::Malformed("AI service returned no result".to_string()))?;

        self.reconcile_images(batch, result).await
    }

    /// Apply a batch result item by item.
    ///
    /// Items whose outcome is an error become `errored` on their own; the
    /// rest lose their stale AI tags and gain the new ones. `tagme` is
    /// removed from the whole batch last.
    async fn reconcile_images(
        &self,
        batch: &ImageBatch,
        result: ImageResult,
    ) -> Result<UnitOutcome, UnitFailure> {
        if result.result.len() != batch.len() {
            return Err(UnitFailure::Malformed(format!(
                "expected {} image results, got {}",
                batch.len(),
                result.result.len()
            )));
        }

        let succeeded: Vec<MediaId> = batch
            .images
            .iter()
            .zip(&result.result)
            .filter(|(_, outcome)| matches!(outcome, ImageOutcome::Tags(_)))
            .map(|(image, _)| image.id.clone())
            .collect();
        self.state
            .clear_ai_tags(MediaKind::Image, &succeeded, false)
            .await?;

        let mut errored = 0;
        for (image, outcome) in batch.images.iter().zip(&result.result) {
            let ids = slice::from_ref(&image.id);
            match outcome {
                ImageOutcome::Error { .. } => {
                    tracing::warn!(
                        image_id = %image.id,
                        path = %image.path,
                        error = %outcome.error_message().unwrap_or_default(),
                        "AI service could not process image"
                    );
                    self.state.mark_errored(MediaKind::Image, ids).await?;
                    errored += 1;
                }
                ImageOutcome::Tags(categories) => {
                    let tags = self
                        .registry
                        .resolve_all(categories.values().flatten().map(String::as_str))
                        .await?;
                    self.state.apply_tags(MediaKind::Image, ids, &tags).await?;
                }
            }
        }

        self.state.release(MediaKind::Image, &batch.ids()).await?;

        tracing::info!(
            images = batch.len(),
            tagged = succeeded.len(),
            errored,
            "tagged image batch"
        );
        Ok(UnitOutcome {
            tagged: succeeded.len(),
            errored,
            skipped: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaggerConfig;
    use crate::dispatch::{DispatchError, MockAiClient};
    use crate::library::{MemoryLibrary, TagId};
    use crate::tagging::{ItemState, LogProgress};
    use std::sync::Arc;

    struct Fixture {
        library: Arc<MemoryLibrary>,
        tagme: TagId,
    }

    impl Fixture {
        fn new() -> Self {
            let library = Arc::new(MemoryLibrary::new());
            let tagme = library.ensure_tag("AI_TagMe");
            Self { library, tagme }
        }

        fn image(&self, path: &str) -> MediaId {
            self.library.add_image(path, &[&self.tagme])
        }

        async fn tagger(&self, ai: MockAiClient) -> Tagger {
            Tagger::initialize(
                self.library.clone(),
                Arc::new(ai),
                TaggerConfig::default(),
                Arc::new(LogProgress),
            )
            .await
            .unwrap()
        }

        fn state(&self, tagger: &Tagger, id: &MediaId) -> ItemState {
            ItemState::classify(&self.library.image_tags(id), tagger.registry().system())
        }
    }

    #[tokio::test]
    async fn categories_are_flattened_into_tags() {
        let fx = Fixture::new();
        let id = fx.image("/media/a.jpg");
        let ai = MockAiClient::new().on_images(|_| {
            Ok(Some(ImageResult {
                result: vec![ImageOutcome::tags([
                    ("scene", vec!["Beach"]),
                    ("time", vec!["Sunset", "Golden Hour"]),
                ])],
            }))
        });
        let tagger = fx.tagger(ai).await;

        let summary = tagger.tag_images().await.unwrap();

        assert_eq!(summary.tagged, 1);
        assert_eq!(fx.state(&tagger, &id), ItemState::Tagged);
        let tags = fx.library.image_tags(&id);
        for name in ["Beach", "Sunset", "Golden Hour"] {
            assert!(tags.contains(&fx.library.tag_id(name).unwrap()), "{}", name);
        }
    }

    #[tokio::test]
    async fn stale_ai_tags_are_replaced_on_success() {
        let fx = Fixture::new();
        let base = fx.library.ensure_tag("AI");
        let stale = fx.library.ensure_child_tag("Indoors", &base);
        let errored = fx.library.ensure_tag("AI_Errored");
        let id = fx.library.add_image("/media/a.jpg", &[&fx.tagme, &stale, &errored]);
        let tagger = fx.tagger(MockAiClient::new()).await;

        tagger.tag_images().await.unwrap();

        let tags = fx.library.image_tags(&id);
        assert!(!tags.contains(&stale));
        assert!(!tags.contains(&errored));
        assert!(tags.contains(&fx.library.tag_id("mock").unwrap()));
        assert_eq!(fx.state(&tagger, &id), ItemState::Tagged);
    }

    #[tokio::test]
    async fn null_result_errors_the_whole_batch() {
        let fx = Fixture::new();
        let ids = [fx.image("/media/a.jpg"), fx.image("/media/b.jpg")];
        let tagger = fx.tagger(MockAiClient::new().on_images(|_| Ok(None))).await;

        let summary = tagger.tag_images().await.unwrap();

        assert_eq!(summary.errored, 2);
        for id in &ids {
            assert_eq!(fx.state(&tagger, id), ItemState::Errored);
        }
    }

    #[tokio::test]
    async fn count_mismatch_errors_the_whole_batch() {
        let fx = Fixture::new();
        let ids = [fx.image("/media/a.jpg"), fx.image("/media/b.jpg")];
        let ai = MockAiClient::new().on_images(|_| {
            Ok(Some(ImageResult {
                result: vec![ImageOutcome::tags([("scene", vec!["Beach"])])],
            }))
        });
        let tagger = fx.tagger(ai).await;

        let summary = tagger.tag_images().await.unwrap();

        assert_eq!((summary.tagged, summary.errored), (0, 2));
        for id in &ids {
            assert_eq!(fx.state(&tagger, id), ItemState::Errored);
        }
        assert!(fx.library.tag_id("Beach").is_none(), "no tags resolved for a rejected batch");
    }

    #[tokio::test]
    async fn connection_failure_errors_the_batch_instead_of_leaving_it_pending() {
        let fx = Fixture::new();
        let id = fx.image("/media/a.jpg");
        let ai = MockAiClient::new()
            .on_images(|_| Err(DispatchError::Connection("connection refused".to_string())));
        let tagger = fx.tagger(ai).await;

        tagger.tag_images().await.unwrap();

        assert_eq!(fx.state(&tagger, &id), ItemState::Errored);
    }
}
