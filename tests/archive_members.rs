//! Images stored inside zip containers are extracted for dispatch and
//! cleaned up afterwards

mod common;

use ai_tagger::dispatch::{DispatchError, ImageOutcome, ImageResult};
use ai_tagger::{ItemState, MockAiClient, TaggerConfig};
use common::{scratch_files, write_zip, TestLibrary};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

fn with_scratch(root: &Path) -> TaggerConfig {
    TaggerConfig {
        temp_image_dir: root.to_path_buf(),
        image_request_batch_size: 1,
        ..TaggerConfig::default()
    }
}

fn member_path(archive: &Path, member: &str) -> String {
    format!("{}/{}", archive.display(), member)
}

/// What the AI service saw for one dispatched path.
#[derive(Debug, Clone)]
struct Seen {
    path: String,
    existed: bool,
    contents: Option<Vec<u8>>,
}

fn observing(seen: Arc<Mutex<Vec<Seen>>>) -> MockAiClient {
    MockAiClient::new().on_images(move |paths| {
        let mut seen = seen.lock().unwrap();
        for path in paths {
            seen.push(Seen {
                path: path.clone(),
                existed: Path::new(path).exists(),
                contents: std::fs::read(path).ok(),
            });
        }
        Ok(Some(ImageResult {
            result: paths
                .iter()
                .map(|_| ImageOutcome::tags([("subject", vec!["Cat"])]))
                .collect(),
        }))
    })
}

// --- Scenario: image inside a zip is extracted before dispatch ---

#[tokio::test]
async fn archive_member_is_dispatched_as_an_extracted_file() {
    let media = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let archive = write_zip(media.path(), "set.zip", &[("inner/photo.jpg", "jpeg bytes")]);
    let fx = TestLibrary::new();
    let id = fx.image(&member_path(&archive, "inner/photo.jpg"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let tagger = fx
        .tagger(Arc::new(observing(seen.clone())), with_scratch(scratch.path()))
        .await;

    tagger.tag_images().await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    let dispatched = PathBuf::from(&seen[0].path);
    assert!(dispatched.is_absolute(), "{}", seen[0].path);
    assert!(dispatched.starts_with(scratch.path()), "{}", seen[0].path);
    assert!(seen[0].existed);
    assert_eq!(seen[0].contents.as_deref(), Some(&b"jpeg bytes"[..]));

    assert_eq!(fx.image_state(&tagger, &id), ItemState::Tagged);
    assert!(scratch_files(scratch.path()).is_empty());
}

#[tokio::test]
async fn direct_and_archived_images_share_a_batch() {
    let media = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let archive = write_zip(media.path(), "set.zip", &[("a.jpg", "a"), ("b.jpg", "b")]);
    let fx = TestLibrary::new();
    fx.image("/media/direct.jpg");
    fx.image(&member_path(&archive, "a.jpg"));
    fx.image(&member_path(&archive, "b.jpg"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let config = TaggerConfig {
        image_request_batch_size: 3,
        ..with_scratch(scratch.path())
    };
    let tagger = fx.tagger(Arc::new(observing(seen.clone())), config).await;

    let summary = tagger.tag_images().await.unwrap();

    assert_eq!((summary.units, summary.tagged), (1, 3));
    let seen = seen.lock().unwrap().clone();
    assert!(seen.iter().any(|s| s.path == "/media/direct.jpg"));
    let extracted: Vec<_> = seen
        .iter()
        .filter(|s| Path::new(&s.path).starts_with(scratch.path()))
        .collect();
    assert_eq!(extracted.len(), 2);
    assert!(extracted.iter().all(|s| s.existed));
    assert!(scratch_files(scratch.path()).is_empty());
}

#[tokio::test]
async fn same_member_name_in_two_archives_keeps_both_images_apart() {
    let media = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let first = write_zip(media.path(), "a.zip", &[("001.jpg", "AAA")]);
    let second = write_zip(media.path(), "b.zip", &[("001.jpg", "BBB")]);
    let fx = TestLibrary::new();
    fx.image(&member_path(&first, "001.jpg"));
    fx.image(&member_path(&second, "001.jpg"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let config = TaggerConfig {
        image_request_batch_size: 2,
        ..with_scratch(scratch.path())
    };
    let tagger = fx.tagger(Arc::new(observing(seen.clone())), config).await;

    let summary = tagger.tag_images().await.unwrap();

    assert_eq!((summary.units, summary.tagged), (1, 2));
    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert_ne!(seen[0].path, seen[1].path);
    let mut contents: Vec<_> = seen.iter().map(|s| s.contents.clone().unwrap()).collect();
    contents.sort();
    assert_eq!(contents, vec![b"AAA".to_vec(), b"BBB".to_vec()]);
    assert!(scratch_files(scratch.path()).is_empty());
}

// --- Scenario: scratch is cleaned up on every path ---

#[tokio::test]
async fn scratch_is_removed_after_a_failed_dispatch() {
    let media = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let archive = write_zip(media.path(), "set.zip", &[("photo.jpg", "x")]);
    let fx = TestLibrary::new();
    let id = fx.image(&member_path(&archive, "photo.jpg"));
    let ai = MockAiClient::new()
        .on_images(|_| Err(DispatchError::Connection("connection refused".to_string())));
    let tagger = fx.tagger(Arc::new(ai), with_scratch(scratch.path())).await;

    let summary = tagger.tag_images().await.unwrap();

    assert_eq!(summary.errored, 1);
    assert_eq!(fx.image_state(&tagger, &id), ItemState::Errored);
    assert!(scratch_files(scratch.path()).is_empty());
}

#[tokio::test]
async fn missing_member_errors_only_its_batch() {
    let media = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let archive = write_zip(media.path(), "set.zip", &[("present.jpg", "x")]);
    let fx = TestLibrary::new();
    let present = fx.image(&member_path(&archive, "present.jpg"));
    let missing = fx.image(&member_path(&archive, "missing.jpg"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let tagger = fx
        .tagger(Arc::new(observing(seen.clone())), with_scratch(scratch.path()))
        .await;

    let summary = tagger.tag_images().await.unwrap();

    assert_eq!((summary.tagged, summary.errored), (1, 1));
    assert_eq!(fx.image_state(&tagger, &present), ItemState::Tagged);
    assert_eq!(fx.image_state(&tagger, &missing), ItemState::Errored);
    fx.assert_concluded(&tagger, &fx.library.image_tags(&missing));
    assert_eq!(seen.lock().unwrap().len(), 1, "failed extraction never dispatches");
    assert!(scratch_files(scratch.path()).is_empty());
}

#[tokio::test]
async fn unreadable_archive_errors_the_item() {
    let media = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let fake = media.path().join("broken.zip");
    std::fs::write(&fake, b"not a zip").unwrap();
    let fx = TestLibrary::new();
    let id = fx.image(&member_path(&fake, "photo.jpg"));
    let ai = Arc::new(MockAiClient::new());
    let tagger = fx.tagger(ai.clone(), with_scratch(scratch.path())).await;

    tagger.tag_images().await.unwrap();

    assert_eq!(fx.image_state(&tagger, &id), ItemState::Errored);
    assert!(ai.image_requests().is_empty());
    assert!(scratch_files(scratch.path()).is_empty());
}
