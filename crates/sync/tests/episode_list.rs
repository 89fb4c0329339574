mod common;

use std::time::Duration;

use common::{Fetches, ls, modified, read};
use novelsync_sync::error::ErrorKind;
use novelsync_sync::provider::Chapter;
use novelsync_sync::{EpisodeList, EpisodeListOptions, META_FOLDER};

fn plain() -> EpisodeListOptions {
    EpisodeListOptions { compression: novelsync_compress::Compression::None, ..Default::default() }
}

fn cache_json(root: &std::path::Path) -> serde_json::Value {
    serde_json::from_str(&read(root.join(META_FOLDER).join("!cache.json"))).unwrap()
}

#[tokio::test]
async fn grouped_and_ungrouped_chapters_are_laid_out() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let fetches = Fetches::default();
    let chapters = vec![
        fetches.chapter(None, "Prologue", None, "It began."),
        fetches.chapter(Some("Arc 1"), "Ch.1", Some("t1"), "One.\n\nMore."),
        fetches.chapter(Some("Arc 1"), "Ch.2", Some("t1"), "Two."),
    ];

    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    let summary = list.update_with(&chapters).await.unwrap();

    assert_eq!((summary.created, summary.updated, summary.unchanged), (3, 0, 0));
    assert_eq!(list.groups(), ["001 Arc 1"]);
    assert_eq!(list.episodes().len(), 3);
    assert_eq!(ls(root), ["!meta", "001 Arc 1", "001 Prologue.txt"]);
    assert_eq!(ls(root.join("001 Arc 1")), ["002 Ch.1.txt", "003 Ch.2.txt"]);
    assert_eq!(read(root.join("001 Prologue.txt")), "It began.\n");
    assert_eq!(read(root.join("001 Arc 1/002 Ch.1.txt")), "One.\n\nMore.\n");

    let cache = cache_json(root);
    assert_eq!(cache["groups"], serde_json::json!(["001 Arc 1"]));
    assert_eq!(cache["episodes"][0], serde_json::json!({ "files": ["001 Prologue.txt"] }));
    assert_eq!(
        cache["episodes"][2],
        serde_json::json!({ "groupId": 1, "updateId": "t1", "files": ["003 Ch.2.txt"] })
    );
}

#[tokio::test]
async fn second_run_with_same_index_does_nothing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let fetches = Fetches::default();
    let index = |f: &Fetches| {
        vec![
            f.chapter(Some("A"), "One", Some("1"), "a"),
            f.chapter(Some("A"), "Two", None, "b"),
            f.chapter(None, "Three", Some("3"), "c"),
        ]
    };

    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    list.update_with(&index(&fetches)).await.unwrap();
    assert_eq!(fetches.count(), 3);
    let cache_path = root.join(META_FOLDER).join("!cache.json");
    let before = (modified(&cache_path), modified(root.join("001 A/001 One.txt")));

    // Fresh process, same index.
    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    let summary = list.update_with(&index(&fetches)).await.unwrap();
    assert_eq!(summary.unchanged, 3);
    assert_eq!(fetches.count(), 3);
    assert_eq!((modified(&cache_path), modified(root.join("001 A/001 One.txt"))), before);
}

#[tokio::test]
async fn relabelled_group_is_renamed_without_refetching() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let fetches = Fetches::default();

    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    list.update_with(&[
        fetches.chapter(Some("Arc 1"), "Ch.1", Some("t1"), "first"),
        fetches.chapter(Some("Arc 1"), "Ch.2", Some("t1"), "second"),
    ])
    .await
    .unwrap();

    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    let summary = list
        .update_with(&[
            fetches.chapter(Some("Arc One"), "Ch.1", Some("t1"), "first"),
            fetches.chapter(Some("Arc One"), "Ch.2", Some("t1"), "second"),
        ])
        .await
        .unwrap();

    assert_eq!(summary.unchanged, 2);
    assert_eq!(fetches.count(), 2);
    assert_eq!(list.groups(), ["001 Arc One"]);
    assert!(!root.join("001 Arc 1").exists());
    assert_eq!(read(root.join("001 Arc One/001 Ch.1.txt")), "first\n");
    assert_eq!(read(root.join("001 Arc One/002 Ch.2.txt")), "second\n");
    assert_eq!(cache_json(root)["groups"], serde_json::json!(["001 Arc One"]));
}

#[tokio::test]
async fn only_the_changed_chapter_is_refetched() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let fetches = Fetches::default();
    let index = |f: &Fetches, third: (&str, &str)| {
        vec![
            f.chapter(None, "A", Some("1"), "a"),
            f.chapter(None, "B", Some("1"), "b"),
            f.chapter(None, "C", Some(third.0), third.1),
            f.chapter(None, "D", Some("1"), "d"),
        ]
    };

    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    list.update_with(&index(&fetches, ("1", "old"))).await.unwrap();
    let untouched = ["001 A.txt", "002 B.txt", "004 D.txt"].map(|n| modified(root.join(n)));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let summary = list.update_with(&index(&fetches, ("2", "new"))).await.unwrap();
    assert_eq!((summary.created, summary.updated, summary.unchanged), (0, 1, 3));
    assert_eq!(fetches.count(), 5);
    assert_eq!(read(root.join("003 C.txt")), "new\n");
    assert_eq!(["001 A.txt", "002 B.txt", "004 D.txt"].map(|n| modified(root.join(n))), untouched);
}

#[tokio::test]
async fn retitled_chapter_replaces_its_old_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let fetches = Fetches::default();

    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    list.update_with(&[fetches.chapter(Some("Arc"), "Draft", Some("1"), "x")]).await.unwrap();
    list.update_with(&[fetches.chapter(None, "Final", Some("2"), "y")]).await.unwrap();

    assert_eq!(ls(root), ["!meta", "001 Arc", "001 Final.txt"]);
    assert!(ls(root.join("001 Arc")).is_empty());
    assert!(list.groups().is_empty());
}

#[tokio::test]
async fn chapter_moving_groups_is_refetched_into_new_folder() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let fetches = Fetches::default();

    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    list.update_with(&[
        fetches.chapter(Some("A"), "One", Some("1"), "1"),
        fetches.chapter(Some("A"), "Two", Some("1"), "2"),
    ])
    .await
    .unwrap();
    let summary = list
        .update_with(&[
            fetches.chapter(Some("A"), "One", Some("1"), "1"),
            fetches.chapter(Some("B"), "Two", Some("1"), "2"),
        ])
        .await
        .unwrap();

    assert_eq!((summary.updated, summary.unchanged), (1, 1));
    assert_eq!(ls(root.join("001 A")), ["001 One.txt"]);
    assert_eq!(ls(root.join("002 B")), ["002 Two.txt"]);
}

#[tokio::test]
async fn failed_fetch_leaves_only_that_entry_stale() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let fetches = Fetches::default();

    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    let err = list
        .update_with(&[
            fetches.chapter(None, "One", Some("1"), "1"),
            fetches.broken(None, "Two", Some("1")),
            fetches.chapter(None, "Three", Some("1"), "3"),
        ])
        .await
        .unwrap_err();
    assert!(matches!(&*err, ErrorKind::Provider));
    // The batch stops at the failure.
    assert_eq!(fetches.count(), 2);
    assert_eq!(ls(root), ["!meta", "001 One.txt"]);

    let cache = cache_json(root);
    assert_eq!(cache["episodes"][0]["files"], serde_json::json!(["001 One.txt"]));
    assert!(cache["episodes"][1].get("files").is_none());

    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    let summary = list
        .update_with(&[
            fetches.chapter(None, "One", Some("1"), "1"),
            fetches.chapter(None, "Two", Some("1"), "2"),
            fetches.chapter(None, "Three", Some("1"), "3"),
        ])
        .await
        .unwrap();
    assert_eq!(summary.unchanged, 1);
    assert_eq!(fetches.count(), 4);
    assert_eq!(ls(root), ["!meta", "001 One.txt", "002 Two.txt", "003 Three.txt"]);
}

#[tokio::test]
async fn crash_before_cache_write_rewrites_the_entry_once() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let cache_path = root.join(META_FOLDER).join("!cache.json");
    let fetches = Fetches::default();
    let index = |f: &Fetches| {
        vec![
            f.chapter(Some("A"), "One", Some("1"), "1"),
            f.chapter(Some("A"), "Two", Some("1"), "2"),
        ]
    };

    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    list.update_with(&index(&fetches)[..1]).await.unwrap();
    let checkpoint = std::fs::read(&cache_path).unwrap();
    list.update_with(&index(&fetches)).await.unwrap();
    // Entry 1's files are on disk, but the cache never learned about them.
    std::fs::write(&cache_path, checkpoint).unwrap();
    let before = fetches.count();

    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    let summary = list.update_with(&index(&fetches)).await.unwrap();
    assert_eq!((summary.created, summary.unchanged), (1, 1));
    assert_eq!(fetches.count(), before + 1);
    assert_eq!(ls(root.join("001 A")), ["001 One.txt", "002 Two.txt"]);
    assert_eq!(read(root.join("001 A/002 Two.txt")), "2\n");
}

#[tokio::test]
async fn deleted_output_is_restored_on_next_run() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let fetches = Fetches::default();
    let index = |f: &Fetches| vec![f.chapter(None, "One", Some("1"), "1"), f.chapter(None, "Two", Some("1"), "2")];

    EpisodeList::open(root, plain()).await.unwrap().update_with(&index(&fetches)).await.unwrap();
    std::fs::remove_file(root.join("002 Two.txt")).unwrap();

    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    assert_eq!(list.episodes()[1].files, None);
    let summary = list.update_with(&index(&fetches)).await.unwrap();
    assert_eq!((summary.updated, summary.unchanged), (1, 1));
    assert_eq!(read(root.join("002 Two.txt")), "2\n");
}

#[tokio::test]
async fn shortened_index_keeps_trailing_files() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let fetches = Fetches::default();

    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    list.update_with(&[
        fetches.chapter(Some("A"), "One", None, "1"),
        fetches.chapter(Some("B"), "Two", None, "2"),
    ])
    .await
    .unwrap();
    list.update_with(&[fetches.chapter(Some("A"), "One", None, "1")]).await.unwrap();

    assert_eq!(list.episodes().len(), 1);
    assert_eq!(list.groups(), ["001 A"]);
    assert_eq!(read(root.join("002 B/002 Two.txt")), "2\n");
    let cache = cache_json(root);
    assert_eq!(cache["episodes"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn relabel_onto_leftover_group_folder_moves_it_aside() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let fetches = Fetches::default();
    fn index(f: &Fetches, labels: &[(&str, &str)]) -> Vec<Chapter> {
        labels.iter().map(|&(group, name)| f.chapter(Some(group), name, Some("1"), name)).collect()
    }

    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    list.update_with(&index(&fetches, &[("A", "One"), ("B", "Two")])).await.unwrap();
    list.update_with(&index(&fetches, &[("A", "One")])).await.unwrap();
    list.update_with(&index(&fetches, &[("A", "One"), ("X", "Two")])).await.unwrap();
    assert_eq!(ls(root), ["!meta", "001 A", "002 B", "002 X"]);

    let summary = list.update_with(&index(&fetches, &[("C", "One"), ("B", "Two")])).await.unwrap();
    assert_eq!(summary.unchanged, 2);
    assert_eq!(ls(root), ["!meta", "001 C", "002 B", "002 B (1)"]);
    assert_eq!(ls(root.join("002 B")), ["002 Two.txt"]);
    assert_eq!(cache_json(root)["groups"], serde_json::json!(["001 C", "002 B"]));

    // Fresh process, same index.
    let count = fetches.count();
    let mut list = EpisodeList::open(root, plain()).await.unwrap();
    let summary = list.update_with(&index(&fetches, &[("C", "One"), ("B", "Two")])).await.unwrap();
    assert_eq!(summary.unchanged, 2);
    assert_eq!(fetches.count(), count);
}

#[tokio::test]
async fn check_fs_removes_untracked_chapter_files() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let fetches = Fetches::default();
    let options = EpisodeListOptions { check_fs: true, ..plain() };

    let mut list = EpisodeList::open(root, options).await.unwrap();
    list.update_with(&[fetches.chapter(Some("A"), "One", None, "1")]).await.unwrap();
    std::fs::write(root.join("001 A/001 Old title.txt"), "stale").unwrap();
    std::fs::write(root.join("001 A/notes.txt"), "mine").unwrap();
    std::fs::write(root.join("005 Beyond the index.txt"), "kept").unwrap();

    list.update_with(&[fetches.chapter(Some("A"), "One", None, "1")]).await.unwrap();
    assert_eq!(ls(root.join("001 A")), ["001 One.txt", "notes.txt"]);
    assert!(root.join("005 Beyond the index.txt").exists());
}

#[tokio::test]
async fn gzip_cache_is_written_by_default() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let fetches = Fetches::default();

    let mut list = EpisodeList::open(root, EpisodeListOptions::default()).await.unwrap();
    list.update_with(&[fetches.chapter(None, "One", None, "1")]).await.unwrap();
    assert_eq!(ls(root.join(META_FOLDER)), ["!cache.json.gz"]);

    let reloaded = EpisodeList::open(root, EpisodeListOptions::default()).await.unwrap();
    assert_eq!(reloaded.data(), list.data());
}
