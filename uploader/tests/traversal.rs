mod common;

use common::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use uploader::{DropPayload, Entry, UploadStatus};

fn names(m: &uploader::UploadManager) -> BTreeSet<String> {
    m.snapshot()
        .tasks
        .iter()
        .map(|t| t.name().to_string())
        .collect()
}

#[tokio::test]
async fn test_nested_drop_queues_every_file() {
    let transport = Arc::new(InstantTransport::new());
    let m = manager(transport.clone());

    let sub = MemDir::new("sub")
        .page(vec![file_entry("c.jpg")])
        .page(vec![file_entry("d.mp4")]);
    let root = MemDir::new("root").page(vec![file_entry("a.jpg"), sub.entry(), file_entry("b.png")]);

    let queued = m.ingest_dropped(DropPayload::new().with_entry(root.entry())).await;
    m.wait_settled().await;

    assert_eq!(queued, 4);
    assert_eq!(m.snapshot().count(UploadStatus::Success), 4);
    assert_eq!(transport.uploaded_names(), vec!["a.jpg", "b.png", "c.jpg", "d.mp4"]);
}

#[tokio::test]
async fn test_unreadable_subtree_does_not_abort_siblings() {
    let m = manager(Arc::new(InstantTransport::new()));

    let broken = MemDir::new("locked")
        .page(vec![file_entry("seen.jpg")])
        .failing_page()
        .page(vec![file_entry("never.jpg")]);
    let root = MemDir::new("root").page(vec![broken.entry(), file_entry("after.jpg")]);

    let queued = m.ingest_dropped(DropPayload::new().with_entry(root.entry())).await;
    m.wait_settled().await;

    assert_eq!(queued, 2);
    assert_eq!(
        names(&m),
        ["after.jpg", "seen.jpg"].iter().map(|s| s.to_string()).collect()
    );
}

#[tokio::test]
async fn test_flat_fallback_files_are_queued_with_entries() {
    let m = manager(Arc::new(InstantTransport::new()));
    let payload = DropPayload::new()
        .with_file(media("flat.heic"))
        .with_entry(file_entry("entry.webp"));

    assert_eq!(m.ingest_dropped(payload).await, 2);
    m.wait_settled().await;
    assert_eq!(m.snapshot().tasks[0].name(), "flat.heic");
}

#[tokio::test]
async fn test_local_directory_tree_is_walked() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("holiday");
    std::fs::create_dir_all(root.join("day1/raw")).unwrap();
    std::fs::write(root.join("cover.jpg"), b"jpg").unwrap();
    std::fs::write(root.join("notes.txt"), b"txt").unwrap();
    std::fs::write(root.join("day1/beach.PNG"), b"png").unwrap();
    std::fs::write(root.join("day1/raw/wave.mov"), b"mov").unwrap();
    std::fs::write(root.join("day1/raw/.DS_Store"), b"x").unwrap();

    let transport = Arc::new(InstantTransport::new());
    let m = manager(transport.clone());
    let payload = DropPayload::from_paths(&[root.clone(), tmp.path().join("missing")]).await;
    assert_eq!(payload.entries.len(), 1);

    let queued = m.ingest_dropped(payload).await;
    m.wait_settled().await;

    assert_eq!(queued, 3);
    assert_eq!(transport.uploaded_names(), vec!["beach.PNG", "cover.jpg", "wave.mov"]);
    let sizes: Vec<u64> = m.snapshot().tasks.iter().map(|t| t.file().size).collect();
    assert!(sizes.iter().all(|&s| s == 3));
}

#[tokio::test]
async fn test_single_dropped_file_path() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("solo.avi");
    std::fs::write(&path, b"avi").unwrap();

    let entry = Entry::from_path(&path).await.unwrap();
    assert!(matches!(entry, Entry::File(_)));

    let m = manager(Arc::new(InstantTransport::new()));
    assert_eq!(m.ingest_dropped(DropPayload::new().with_entry(entry)).await, 1);
    m.wait_settled().await;
    assert_eq!(m.snapshot().count(UploadStatus::Success), 1);
}
