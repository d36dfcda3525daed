//! Unit-of-work partitioning
//!
//! Images are sliced into contiguous batches in query order; every scene is
//! its own unit.

use crate::library::{Image, MediaId, MediaPath, Scene};

/// A contiguous slice of eligible images dispatched together.
#[derive(Debug, Clone)]
pub struct ImageBatch {
    pub images: Vec<Image>,
}

impl ImageBatch {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn ids(&self) -> Vec<MediaId> {
        self.images.iter().map(|i| i.id.clone()).collect()
    }

    pub fn paths(&self) -> Vec<MediaPath> {
        self.images.iter().map(|i| i.path.clone()).collect()
    }
}

/// A single scene dispatched on its own.
#[derive(Debug, Clone)]
pub struct SceneUnit {
    pub scene: Scene,
}

/// Split `images` into batches of at most `batch_size`, preserving order.
///
/// A zero batch size is treated as one.
pub fn partition_images(images: Vec<Image>, batch_size: usize) -> Vec<ImageBatch> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(images.len().div_ceil(batch_size));
    let mut images = images.into_iter().peekable();
    while images.peek().is_some() {
        batches.push(ImageBatch {
            images: images.by_ref().take(batch_size).collect(),
        });
    }
    batches
}

pub fn partition_scenes(scenes: Vec<Scene>) -> Vec<SceneUnit> {
    scenes.into_iter().map(|scene| SceneUnit { scene }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn images(n: usize) -> Vec<Image> {
        (0..n)
            .map(|i| Image {
                id: MediaId::new(i.to_string()),
                path: MediaPath::Direct(format!("/media/{}.jpg", i)),
            })
            .collect()
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(partition_images(Vec::new(), 320).is_empty());
        assert!(partition_scenes(Vec::new()).is_empty());
    }

    #[test]
    fn batch_sizes_cover_every_image_in_order() {
        for (n, b) in [(1, 1), (7, 3), (9, 3), (10, 320), (641, 320), (5, 1)] {
            let batches = partition_images(images(n), b);

            assert_eq!(batches.len(), n.div_ceil(b), "n={} b={}", n, b);
            assert_eq!(batches.iter().map(ImageBatch::len).sum::<usize>(), n);
            let expected_last = if n % b == 0 { b } else { n % b };
            assert_eq!(batches.last().map(ImageBatch::len), Some(expected_last));
            assert!(batches[..batches.len() - 1].iter().all(|batch| batch.len() == b));

            let order: Vec<String> = batches
                .iter()
                .flat_map(|batch| batch.ids())
                .map(|id| id.to_string())
                .collect();
            let expected: Vec<String> = (0..n).map(|i| i.to_string()).collect();
            assert_eq!(order, expected);
        }
    }

    #[test]
    fn zero_batch_size_is_one() {
        assert_eq!(partition_images(images(3), 0).len(), 3);
    }

    #[test]
    fn each_scene_is_its_own_unit() {
        let scenes: Vec<Scene> = (0..4)
            .map(|i| Scene {
                id: MediaId::new(i.to_string()),
                path: format!("/media/{}.mp4", i),
                duration: Some(60.0),
                phash: None,
                tag_ids: BTreeSet::new(),
            })
            .collect();
        let units = partition_scenes(scenes);
        assert_eq!(units.len(), 4);
        assert_eq!(units[2].scene.id.as_str(), "2");
    }
}
