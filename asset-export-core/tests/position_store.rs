use std::sync::Arc;

use serde_json::json;

use asset_export_core::contract::{Cursor, Event, StateStore, SystemClock};
use asset_export_core::position::{consumer_key, PositionStore};
use asset_export_core::state::FsStateStore;

fn ev(pos: i64, path: &str) -> Event {
    Event {
        position: Cursor::from(json!(pos)),
        asset_path: path.to_string(),
        kind: "asset-updated".to_string(),
    }
}

fn store_in(dir: &std::path::Path, history_batches: usize) -> (PositionStore, Arc<dyn StateStore>) {
    let raw: Arc<dyn StateStore> =
        Arc::new(FsStateStore::new(dir, Arc::new(SystemClock)).expect("state dir"));
    (PositionStore::new(raw.clone(), history_batches), raw)
}

#[tokio::test]
async fn fresh_consumer_has_no_position() {
    let temp = tempfile::tempdir().unwrap();
    let (positions, _) = store_in(temp.path(), 20);
    let latest = positions
        .latest_position(&consumer_key("org", "key"))
        .await
        .unwrap();
    assert!(latest.is_none());
}

#[tokio::test]
async fn append_advances_cursor_to_last_event() {
    let temp = tempfile::tempdir().unwrap();
    let (positions, _) = store_in(temp.path(), 20);
    let key = consumer_key("org", "key");

    positions
        .append_batch(&key, &[ev(10, "/content/dam/a.jpg"), ev(12, "/content/dam/b.jpg")])
        .await
        .unwrap();
    assert_eq!(
        positions.latest_position(&key).await.unwrap(),
        Some(Cursor::from(json!(12)))
    );

    positions
        .append_batch(&key, &[ev(15, "/content/dam/c.jpg")])
        .await
        .unwrap();
    assert_eq!(
        positions.latest_position(&key).await.unwrap(),
        Some(Cursor::from(json!(15)))
    );
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let temp = tempfile::tempdir().unwrap();
    let (positions, _) = store_in(temp.path(), 20);
    let key = consumer_key("org", "key");

    positions
        .append_batch(&key, &[ev(3, "/content/dam/a.jpg")])
        .await
        .unwrap();
    positions.append_batch(&key, &[]).await.unwrap();
    assert_eq!(
        positions.latest_position(&key).await.unwrap(),
        Some(Cursor::from(json!(3))),
        "cursor must not regress on an empty append"
    );
}

/// The store does not deduplicate: re-appending the same batch after a
/// crash-and-retry grows the history, which the at-least-once model accepts.
#[tokio::test]
async fn duplicate_append_grows_history_without_corruption() {
    let temp = tempfile::tempdir().unwrap();
    let (positions, raw) = store_in(temp.path(), 20);
    let key = consumer_key("org", "key");
    let batch = [ev(7, "/content/dam/a.jpg")];

    positions.append_batch(&key, &batch).await.unwrap();
    positions.append_batch(&key, &batch).await.unwrap();

    assert_eq!(
        positions.latest_position(&key).await.unwrap(),
        Some(Cursor::from(json!(7)))
    );
    let state = raw.get(&key).await.unwrap().unwrap();
    let history = state["recent_batches"].as_array().unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn history_is_capped_to_configured_window() {
    let temp = tempfile::tempdir().unwrap();
    let (positions, raw) = store_in(temp.path(), 3);
    let key = consumer_key("org", "key");

    for b in 0..5 {
        positions
            .append_batch(&key, &[ev(b * 10, &format!("/content/dam/{b}.jpg"))])
            .await
            .unwrap();
    }

    let state = raw.get(&key).await.unwrap().unwrap();
    let history = state["recent_batches"].as_array().unwrap();
    assert_eq!(history.len(), 3, "only the trailing window is retained");
    // Oldest retained batch is the third appended one.
    assert_eq!(history[0][0]["position"], json!(20));
    assert_eq!(
        positions.latest_position(&key).await.unwrap(),
        Some(Cursor::from(json!(40)))
    );
}

#[tokio::test]
async fn state_survives_store_reopen() {
    let temp = tempfile::tempdir().unwrap();
    let key = consumer_key("org", "key");
    {
        let (positions, _) = store_in(temp.path(), 20);
        positions
            .append_batch(&key, &[ev(42, "/content/dam/a.jpg")])
            .await
            .unwrap();
    }
    let (positions, _) = store_in(temp.path(), 20);
    assert_eq!(
        positions.latest_position(&key).await.unwrap(),
        Some(Cursor::from(json!(42)))
    );
}
