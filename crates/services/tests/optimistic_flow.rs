use std::sync::Arc;

use progress_core::model::{ScopeKey, ScopeType, TreeDraft, UnitId};
use progress_core::time::fixed_clock;
use remote::{InMemoryProgressStore, Remote};
use serde_json::json;
use services::{ChangeOutcome, HydrationSnapshot, ProgressTracker, SyncMode};

fn book_scope() -> ScopeKey {
    ScopeKey::new(ScopeType::Book, "b1")
}

fn tracker_with_book() -> (ProgressTracker, InMemoryProgressStore) {
    let store = InMemoryProgressStore::new();
    let remote = Remote::from_store(store.clone());
    let tracker = ProgressTracker::new(remote.writes).with_clock(fixed_clock());
    let tree = TreeDraft::from_value(&json!({
        "chapters": [
            { "id": "c1", "children": [{ "id": "s1" }, { "id": "s2" }] },
            { "id": "c2" }
        ]
    }))
    .validate(ScopeType::Book)
    .unwrap();
    tracker.register_tree(book_scope(), tree).unwrap();
    (tracker, store)
}

#[tokio::test]
async fn reading_session_reaches_full_completion() {
    let (tracker, store) = tracker_with_book();
    let mut events = tracker.subscribe();

    let stats = tracker.toggle(&book_scope(), UnitId::new("s1")).unwrap();
    assert_eq!(stats.percentage, 33);
    tracker.sync(&book_scope()).await.unwrap();

    let stats = tracker.toggle(&book_scope(), UnitId::new("s2")).unwrap();
    assert_eq!(stats.percentage, 67);
    let stats = tracker.toggle(&book_scope(), UnitId::new("c2")).unwrap();
    assert_eq!(stats.percentage, 100);
    tracker.sync(&book_scope()).await.unwrap();

    // Two toggles before the second sync coalesce into one write.
    assert_eq!(store.write_calls().len(), 2);
    let persisted = store.persisted(&book_scope());
    assert_eq!(persisted.get(&UnitId::new("s2")), Some(&true));
    assert_eq!(persisted.get(&UnitId::new("c2")), Some(&true));

    let first = events.recv().await.unwrap();
    assert_eq!(first.outcome, ChangeOutcome::Updated);
    assert_eq!(first.stats.unwrap().percentage, 33);
    let second = events.recv().await.unwrap();
    assert_eq!(second.stats.unwrap().percentage, 100);
}

#[tokio::test]
async fn offline_write_reverts_and_reports() {
    let (tracker, store) = tracker_with_book();
    tracker
        .set_many(
            &book_scope(),
            vec![(UnitId::new("s1"), true)],
            SyncMode::Skip,
        )
        .unwrap();

    let map_before = tracker.completion(&book_scope()).unwrap();
    let stats_before = tracker.stats(&book_scope()).unwrap();

    store.fail_writes(true);
    let mut events = tracker.subscribe();

    // The optimistic update is visible immediately...
    let stats = tracker.toggle(&book_scope(), UnitId::new("s2")).unwrap();
    assert_eq!(stats.percentage, 67);

    // ...and gone again after the failed sync, bit for bit.
    assert!(tracker.sync(&book_scope()).await.is_err());
    assert_eq!(tracker.completion(&book_scope()).unwrap(), map_before);
    assert_eq!(tracker.stats(&book_scope()).unwrap(), stats_before);

    let event = events.recv().await.unwrap();
    assert!(matches!(event.outcome, ChangeOutcome::SyncFailed(_)));
    assert_eq!(event.stats.unwrap(), stats_before);

    // Nothing reached the store.
    assert!(store.persisted(&book_scope()).get(&UnitId::new("s2")).is_none());
}

#[tokio::test]
async fn legacy_migration_never_writes_remote() {
    let (tracker, store) = tracker_with_book();

    let stats = tracker
        .import_legacy(
            &book_scope(),
            vec![
                (UnitId::new("s1"), true),
                (UnitId::new("s2"), false),
                (UnitId::new("s2"), true),
                (UnitId::new("c2"), true),
            ],
        )
        .unwrap();

    // Pairs applied in order: the later s2 entry wins.
    assert_eq!(stats.percentage, 100);
    assert!(store.write_calls().is_empty());

    // A later normal toggle still syncs.
    tracker.toggle(&book_scope(), UnitId::new("s1")).unwrap();
    tracker.sync(&book_scope()).await.unwrap();
    assert_eq!(store.write_calls().len(), 1);
}

#[tokio::test]
async fn hydration_merges_under_local_optimistic_state() {
    let (tracker, _store) = tracker_with_book();

    // The user toggled s1 off locally before the snapshot arrived.
    tracker
        .set_many(
            &book_scope(),
            vec![(UnitId::new("s1"), false)],
            SyncMode::Skip,
        )
        .unwrap();

    let snapshot: HydrationSnapshot = serde_json::from_value(json!({
        "b1": { "tocProgress": { "s1": true, "s2": true } }
    }))
    .unwrap();
    tracker.hydrate(ScopeType::Book, snapshot).unwrap();

    let map = tracker.completion(&book_scope()).unwrap();
    assert!(!map.is_completed(&UnitId::new("s1")), "local wins");
    assert!(map.is_completed(&UnitId::new("s2")));
    assert_eq!(tracker.stats(&book_scope()).unwrap().completed_units, 1);
}

#[tokio::test]
async fn hydration_stats_used_when_no_tree_is_registered() {
    let store = InMemoryProgressStore::new();
    let tracker = ProgressTracker::new(Arc::new(store)).with_clock(fixed_clock());
    let scope = ScopeKey::new(ScopeType::Video, "v7");

    let snapshot: HydrationSnapshot = serde_json::from_value(json!({
        "v7": {
            "progress": { "ch1": true },
            "progressStats": {
                "totalUnits": 4,
                "completedUnits": 1,
                "percentage": 25,
                "lastUpdated": "2023-11-14T22:13:20Z"
            }
        }
    }))
    .unwrap();
    tracker.hydrate(ScopeType::Video, snapshot).unwrap();

    assert_eq!(tracker.stats(&scope).unwrap().percentage, 25);
    assert!(tracker
        .completion(&scope)
        .unwrap()
        .is_completed(&UnitId::new("ch1")));
}
