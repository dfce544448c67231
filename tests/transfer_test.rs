mod common;

use common::MemoryStore;
use s3_explorer::{
    CancellationFlag, Entry, ExplorerConfig, ExplorerError, ProgressCallback, ProgressSnapshot,
    TransferCoordinator, TransferItem,
};
use std::fs;
use std::sync::{Arc, Mutex};

const BUCKET: &str = "test-bucket";

fn coordinator(store: Arc<MemoryStore>, workers: usize) -> TransferCoordinator {
    TransferCoordinator::new(store, BUCKET, ExplorerConfig::default()).with_concurrency(workers, 2)
}

fn file(key: &str, size: u64) -> Entry {
    let name = key.rsplit('/').next().unwrap_or(key);
    Entry::file(name, key, size, None)
}

fn folder(key: &str) -> Entry {
    let name = key.trim_end_matches('/').rsplit('/').next().unwrap_or(key);
    Entry::folder(name, key)
}

#[tokio::test]
async fn test_empty_batch_is_a_no_op() {
    let store = Arc::new(MemoryStore::new());
    let report = coordinator(store, 4)
        .run_batch(vec![], None, &CancellationFlag::new())
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.progress.total_items, 0);
}

#[tokio::test]
async fn test_failed_upload_does_not_abort_batch() {
    let dir = tempfile::tempdir().unwrap();
    let mut items = vec![];
    for (name, body) in [("one.txt", "1"), ("two.txt", "22"), ("three.txt", "333")] {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        items.push(TransferItem::upload(&path, "inbox", body.len() as u64));
    }

    let store = Arc::new(MemoryStore::new());
    store.fail_put("inbox/two.txt");

    let seen = Arc::new(Mutex::new(Vec::<ProgressSnapshot>::new()));
    let sink = seen.clone();
    let callback: ProgressCallback = Arc::new(move |s: ProgressSnapshot| sink.lock().unwrap().push(s));

    let report = coordinator(store.clone(), 3)
        .run_batch(items, Some(callback), &CancellationFlag::new())
        .await
        .unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].item_name, "two.txt");
    assert_eq!(report.progress.transferred_bytes, 4);
    assert_eq!(report.progress.total_bytes, 6);
    assert_eq!(store.get("inbox/one.txt").unwrap(), b"1");
    assert_eq!(store.get("inbox/three.txt").unwrap(), b"333");
    assert!(!store.contains("inbox/two.txt"));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen.windows(2).all(|w| w[0].transferred_bytes <= w[1].transferred_bytes));
}

#[tokio::test]
async fn test_upload_resolves_name_collisions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.txt");
    fs::write(&path, "new").unwrap();

    let store = Arc::new(MemoryStore::with_files(&[("report.txt", "old")]));
    let report = coordinator(store.clone(), 2)
        .run_batch(
            vec![TransferItem::upload(&path, "", 3)],
            None,
            &CancellationFlag::new(),
        )
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(store.get("report.txt").unwrap(), b"old");
    assert_eq!(store.get("report(1).txt").unwrap(), b"new");
}

#[tokio::test]
async fn test_folder_upload_mirrors_tree_under_resolved_root() {
    let dir = tempfile::tempdir().unwrap();
    let site = dir.path().join("site");
    fs::create_dir_all(site.join("css")).unwrap();
    fs::create_dir_all(site.join("empty")).unwrap();
    fs::write(site.join("index.html"), "<html>").unwrap();
    fs::write(site.join("css/app.css"), "body{}").unwrap();

    let store = Arc::new(MemoryStore::with_files(&[("web/site/old.html", "x")]));
    let report = coordinator(store.clone(), 4)
        .run_batch(
            vec![TransferItem::upload_folder(&site, "web")],
            None,
            &CancellationFlag::new(),
        )
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.progress.total_bytes, 12);
    // three folder markers plus two files
    assert_eq!(report.succeeded, 5);
    assert!(store.contains("web/site(1)/"));
    assert!(store.contains("web/site(1)/css/"));
    assert!(store.contains("web/site(1)/empty/"));
    assert_eq!(store.get("web/site(1)/index.html").unwrap(), b"<html>");
    assert_eq!(store.get("web/site(1)/css/app.css").unwrap(), b"body{}");
}

#[tokio::test]
async fn test_folder_delete_removes_every_key_including_marker() {
    let store = Arc::new(MemoryStore::with_files(&[
        ("docs/", ""),
        ("docs/a.txt", "aa"),
        ("docs/sub/", ""),
        ("docs/sub/b.txt", "bbb"),
        ("keep.txt", "k"),
    ]));

    let report = coordinator(store.clone(), 3)
        .run_batch(
            vec![TransferItem::delete(&folder("docs/"))],
            None,
            &CancellationFlag::new(),
        )
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.progress.total_items, 4);
    assert_eq!(report.progress.transferred_bytes, 5);
    assert_eq!(store.keys(), vec!["keep.txt".to_string()]);
}

#[tokio::test]
async fn test_folder_delete_is_best_effort() {
    let store = Arc::new(MemoryStore::with_files(&[
        ("docs/a.txt", "a"),
        ("docs/b.txt", "b"),
        ("docs/c.txt", "c"),
    ]));
    store.fail_delete("docs/b.txt");

    let coordinator = coordinator(store.clone(), 1);
    let err = coordinator.ops().delete_folder("docs").await.unwrap_err();
    match err {
        ExplorerError::FolderDeleteIncomplete {
            prefix,
            failed_keys,
        } => {
            assert_eq!(prefix, "docs/");
            assert_eq!(failed_keys, vec!["docs/b.txt".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.keys(), vec!["docs/b.txt".to_string()]);
}

#[tokio::test]
async fn test_folder_copy_goes_to_fresh_root() {
    let store = Arc::new(MemoryStore::with_files(&[
        ("pics/", ""),
        ("pics/a.png", "png"),
        ("pics/raw/b.raw", "rawdata"),
        ("backup/pics/existing.png", "e"),
    ]));

    let report = coordinator(store.clone(), 4)
        .run_batch(
            vec![TransferItem::copy(&folder("pics/"), "backup")],
            None,
            &CancellationFlag::new(),
        )
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.succeeded, 3);
    assert!(store.contains("backup/pics(1)/"));
    assert_eq!(store.get("backup/pics(1)/a.png").unwrap(), b"png");
    assert_eq!(store.get("backup/pics(1)/raw/b.raw").unwrap(), b"rawdata");
    assert!(!store.contains("backup/pics/a.png"));
}

#[tokio::test]
async fn test_same_folder_copy_never_overwrites() {
    let store = Arc::new(MemoryStore::with_files(&[("notes.md", "n")]));
    let report = coordinator(store.clone(), 2)
        .run_batch(
            vec![TransferItem::copy(&file("notes.md", 1), "")],
            None,
            &CancellationFlag::new(),
        )
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(store.get("notes(1).md").unwrap(), b"n");
}

#[tokio::test]
async fn test_folder_download_writes_relative_layout() {
    let store = Arc::new(MemoryStore::with_files(&[
        ("music/", ""),
        ("music/a.mp3", "aaa"),
        ("music/live/b.mp3", "bb"),
    ]));
    let dest = tempfile::tempdir().unwrap();

    let report = coordinator(store, 2)
        .run_batch(
            vec![
                TransferItem::download(&folder("music/"), dest.path()),
                TransferItem::download(&file("music/a.mp3", 3), &dest.path().join("single")),
            ],
            None,
            &CancellationFlag::new(),
        )
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.progress.total_bytes, 8);
    assert_eq!(fs::read(dest.path().join("music/a.mp3")).unwrap(), b"aaa");
    assert_eq!(fs::read(dest.path().join("music/live/b.mp3")).unwrap(), b"bb");
    assert_eq!(fs::read(dest.path().join("single/a.mp3")).unwrap(), b"aaa");
}

#[tokio::test]
async fn test_download_rejects_escaping_keys() {
    let store = Arc::new(MemoryStore::with_files(&[
        ("music/a.mp3", "aaa"),
        ("music//b.mp3", "bb"),
        ("music/../../etc/passwd", "x"),
    ]));
    let dest = tempfile::tempdir().unwrap();

    let report = coordinator(store, 2)
        .run_batch(
            vec![TransferItem::download(&folder("music/"), dest.path())],
            None,
            &CancellationFlag::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].item_name, "music/../../etc/passwd");
    assert!(report.failures[0].error.contains("Invalid path"));
    assert_eq!(fs::read(dest.path().join("music/a.mp3")).unwrap(), b"aaa");
    assert_eq!(fs::read(dest.path().join("music/b.mp3")).unwrap(), b"bb");
    assert!(!dest.path().join("etc/passwd").exists());
    assert_eq!(report.progress.transferred_bytes, 5);
}

#[tokio::test]
async fn test_scan_failure_aborts_before_any_mutation() {
    let store = Arc::new(MemoryStore::with_files(&[
        ("a.txt", "a"),
        ("broken/x.txt", "x"),
    ]));
    store.fail_listing_under("broken/");

    let err = coordinator(store.clone(), 2)
        .run_batch(
            vec![
                TransferItem::delete(&file("a.txt", 1)),
                TransferItem::delete(&folder("broken/")),
            ],
            None,
            &CancellationFlag::new(),
        )
        .await
        .unwrap_err();

    match err {
        ExplorerError::Scan { item, source } => {
            assert_eq!(item, "broken");
            assert!(matches!(*source, ExplorerError::Listing(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.contains("a.txt"));
}

#[tokio::test]
async fn test_cancel_before_start_aborts_scan() {
    let store = Arc::new(MemoryStore::with_files(&[("a.txt", "a")]));
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let err = coordinator(store.clone(), 2)
        .run_batch(vec![TransferItem::delete(&file("a.txt", 1))], None, &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(store.contains("a.txt"));
}

#[tokio::test]
async fn test_cancel_during_execute_records_unstarted_items() {
    let store = Arc::new(MemoryStore::with_files(&[
        ("a.txt", "a"),
        ("b.txt", "b"),
        ("c.txt", "c"),
    ]));
    let cancel = CancellationFlag::new();
    let trigger = cancel.clone();
    store.on_delete(move |_| trigger.cancel());

    let items = ["a.txt", "b.txt", "c.txt"]
        .iter()
        .map(|k| TransferItem::delete(&file(k, 1)))
        .collect();
    let report = coordinator(store.clone(), 1)
        .run_batch(items, None, &cancel)
        .await
        .unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|f| f.error == "cancelled"));
    assert_eq!(report.succeeded + report.failures.len(), 3);
    assert_eq!(store.keys().len(), 2);
}

#[tokio::test]
async fn test_worker_panic_keeps_other_results() {
    let store = Arc::new(MemoryStore::with_files(&[
        ("a.txt", "a"),
        ("b.txt", "b"),
        ("c.txt", "c"),
    ]));
    store.on_delete(|key| {
        if key == "b.txt" {
            panic!("simulated crash deleting {key}");
        }
    });

    let items = ["a.txt", "b.txt", "c.txt"]
        .iter()
        .map(|k| TransferItem::delete(&file(k, 1)))
        .collect();
    let report = coordinator(store.clone(), 1)
        .run_batch(items, None, &CancellationFlag::new())
        .await
        .unwrap();

    assert_eq!(report.succeeded, 1);
    let failed: Vec<&str> = report.failures.iter().map(|f| f.item_name.as_str()).collect();
    assert_eq!(failed, vec!["b.txt", "c.txt"]);
    assert!(report.failures.iter().all(|f| f.error.contains("stopped unexpectedly")));
    assert_eq!(report.progress.completed_items, 3);
    assert!(!store.contains("a.txt"));
    assert!(store.contains("c.txt"));
}

#[tokio::test]
async fn test_panicking_progress_callback_does_not_fail_batch() {
    let store = Arc::new(MemoryStore::with_files(&[("a.txt", "a"), ("b.txt", "b")]));
    let callback: ProgressCallback = Arc::new(|_: ProgressSnapshot| panic!("observer bug"));

    let items = ["a.txt", "b.txt"]
        .iter()
        .map(|k| TransferItem::delete(&file(k, 1)))
        .collect();
    let report = coordinator(store.clone(), 2)
        .run_batch(items, Some(callback), &CancellationFlag::new())
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.succeeded, 2);
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn test_create_folder_resolves_collisions() {
    let store = Arc::new(MemoryStore::with_files(&[("projects/new/", "")]));
    let ops = coordinator(store.clone(), 1).ops();

    assert_eq!(ops.create_folder("projects", "new").await.unwrap(), "projects/new(1)/");
    assert_eq!(ops.create_folder("", "top").await.unwrap(), "top/");
    assert!(store.contains("projects/new(1)/"));
    assert!(matches!(
        ops.create_folder("projects", " / ").await,
        Err(ExplorerError::InvalidPath(_))
    ));
}

#[tokio::test]
async fn test_direct_folder_copy_reports_partial_failure() {
    let store = Arc::new(MemoryStore::with_files(&[
        ("src/a.txt", "a"),
        ("src/b.txt", "b"),
    ]));
    store.fail_copy("src/b.txt");
    let ops = coordinator(store.clone(), 1).ops();

    let err = ops.copy_folder("src", "dst").await.unwrap_err();
    match err {
        ExplorerError::FolderCopyIncomplete {
            prefix,
            failed_keys,
        } => {
            assert_eq!(prefix, "src/");
            assert_eq!(failed_keys, vec!["src/b.txt".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.get("dst/a.txt").unwrap(), b"a");

    store.insert("other/x.txt", b"x");
    assert_eq!(ops.copy_folder("other/", "dst").await.unwrap(), "dst(1)/");
    assert!(store.contains("dst(1)/x.txt"));
}
