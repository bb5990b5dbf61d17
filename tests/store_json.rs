// tests/store_json.rs
//
// JsonFileStore durability and fail-open behavior.

use signal_relay::store::{DedupStore, JsonFileStore};

#[tokio::test]
async fn marks_survive_a_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("sent.json");

    let store = JsonFileStore::open(&path);
    assert!(!store.has("n-1").await);
    store
        .mark_sent("n-1", "Fed holds rates", &["CURRENCY".to_string()])
        .await;
    assert!(store.has("n-1").await);
    drop(store);

    let reopened = JsonFileStore::open(&path);
    assert!(reopened.has("n-1").await);
    assert!(!reopened.has("n-2").await);
    assert_eq!(reopened.len(), 1);
}

#[tokio::test]
async fn repeated_marks_keep_a_single_record() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("sent.json");

    let store = JsonFileStore::open(&path);
    store.mark_sent("n-1", "Headline", &[]).await;
    store.mark_sent("n-1", "Headline", &[]).await;
    store.mark_sent("n-1", "Headline", &[]).await;

    let snapshot = std::fs::read_to_string(&path).unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&snapshot).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["item_id"], "n-1");
}

#[tokio::test]
async fn corrupt_snapshot_reads_as_not_sent() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("sent.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    // Fail-open: unreadable state means "assume unsent", never an error.
    let store = JsonFileStore::open(&path);
    assert!(!store.has("n-1").await);
    assert!(store.is_empty());
}

#[tokio::test]
async fn unwritable_path_swallows_the_persist_error() {
    let tmp = tempfile::tempdir().unwrap();
    // Parent "dir" is a file, so the snapshot rewrite must fail.
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, "x").unwrap();
    let path = blocker.join("sent.json");

    let store = JsonFileStore::open(&path);
    store.mark_sent("n-1", "Headline", &[]).await; // must not panic
    // The mark still holds in memory for this process.
    assert!(store.has("n-1").await);
}

#[tokio::test]
async fn missing_directories_are_created_on_first_mark() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested/dir/sent.json");

    let store = JsonFileStore::open(&path);
    store.mark_sent("n-1", "Headline", &[]).await;
    assert!(path.exists());

    let reopened = JsonFileStore::open(&path);
    assert!(reopened.has("n-1").await);
}
