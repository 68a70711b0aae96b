// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Store-level semantics the facade relies on: conditional completion,
//! idempotent account creation, error propagation, watch snapshots.

use std::time::Duration;

use futures_util::StreamExt;
use hackademy_progression::config::LevelCurve;
use hackademy_progression::models::{
    ActivityKind, AwardSource, Difficulty, EntityKind, XpAward,
};
use hackademy_progression::{Error, MemoryStore, ProgressStore};

mod common;
use common::tracker_with_account;

const NOW: &str = "2026-02-01T10:00:00Z";

#[tokio::test]
async fn test_complete_progress_is_conditional() {
    let store = MemoryStore::new();
    let mut record = store
        .get_or_create_progress("u1", "e1", EntityKind::Course, 0)
        .await
        .unwrap();
    record.advancement.set_units(100);
    record.mark_completed(NOW);

    store.complete_progress(&record).await.expect("first writer wins");

    let err = store.complete_progress(&record).await.unwrap_err();
    assert!(matches!(err, Error::LostRace));
}

#[tokio::test]
async fn test_init_stats_is_idempotent() {
    let store = MemoryStore::new();

    let first = store.init_stats("u1", NOW).await.unwrap();
    assert_eq!(first.level, 1);
    assert_eq!(first.xp, 0);

    let again = store.init_stats("u1", "2026-02-02T10:00:00Z").await.unwrap();
    assert_eq!(again.updated_at, first.updated_at);

    let created_entries = store
        .all_activities()
        .into_iter()
        .filter(|e| matches!(e.kind, ActivityKind::AccountCreated))
        .count();
    assert_eq!(created_entries, 1);
}

#[tokio::test]
async fn test_award_without_stats_is_not_found() {
    let store = MemoryStore::new();
    let award = XpAward {
        source: AwardSource::ChallengeCompletion {
            entity_id: "e1".to_string(),
            difficulty: Difficulty::Medium,
        },
        amount: 500,
        points: 100,
    };

    let err = store
        .commit_award("ghost", &award, &LevelCurve::default(), NOW)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_offline_store_propagates_storage_unavailable() {
    let tracker = tracker_with_account("u1").await;
    let session = tracker.challenge("u1", "e1", 10, Difficulty::Medium);

    tracker.store().set_offline(true);
    let err = session
        .record_progress(10, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StorageUnavailable(_)));

    // Back online, the retried sequence completes and rewards exactly once.
    tracker.store().set_offline(false);
    let outcome = session
        .record_progress(10, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(outcome.completed_just_now);
    assert_eq!(tracker.stats("u1").await.unwrap().unwrap().xp, 500);
}

#[tokio::test]
async fn test_watch_progress_emits_snapshot_then_updates() {
    let tracker = tracker_with_account("u1").await;
    let session = tracker.challenge("u1", "e1", 10, Difficulty::Medium);

    session.record_progress(3, Duration::from_secs(10)).await.unwrap();

    let mut watch = tracker.watch_progress("u1", "e1");
    let snapshot = tokio::time::timeout(Duration::from_secs(1), watch.next())
        .await
        .expect("snapshot not emitted")
        .unwrap();
    assert_eq!(snapshot.advancement.units(), 3);

    session.record_progress(7, Duration::from_secs(10)).await.unwrap();
    let update = tokio::time::timeout(Duration::from_secs(1), watch.next())
        .await
        .expect("update not emitted")
        .unwrap();
    assert_eq!(update.advancement.units(), 7);
}

#[tokio::test]
async fn test_watch_stats_sees_award() {
    let tracker = tracker_with_account("u1").await;
    let mut watch = tracker.watch_stats("u1");

    // Initial snapshot from account creation.
    let initial = tokio::time::timeout(Duration::from_secs(1), watch.next())
        .await
        .expect("snapshot not emitted")
        .unwrap();
    assert_eq!(initial.xp, 0);

    tracker
        .challenge("u1", "e1", 5, Difficulty::Medium)
        .record_progress(5, Duration::from_secs(10))
        .await
        .unwrap();

    let updated = tokio::time::timeout(Duration::from_secs(1), watch.next())
        .await
        .expect("update not emitted")
        .unwrap();
    assert_eq!(updated.xp, 500);
}

#[tokio::test]
async fn test_watch_is_restartable() {
    let tracker = tracker_with_account("u1").await;
    tracker
        .challenge("u1", "e1", 5, Difficulty::Medium)
        .record_progress(5, Duration::from_secs(10))
        .await
        .unwrap();

    // A fresh subscription starts from the current snapshot.
    let mut watch = tracker.watch_stats("u1");
    let snapshot = tokio::time::timeout(Duration::from_secs(1), watch.next())
        .await
        .expect("snapshot not emitted")
        .unwrap();
    assert_eq!(snapshot.xp, 500);
}

#[tokio::test]
async fn test_top_stats_orders_by_xp() {
    let tracker = tracker_with_account("alpha").await;
    tracker.init_account("bravo").await.unwrap();
    tracker.init_account("charlie").await.unwrap();

    tracker
        .challenge("bravo", "e1", 2, Difficulty::Expert)
        .record_progress(2, Duration::from_secs(10))
        .await
        .unwrap();
    tracker
        .challenge("charlie", "e1", 2, Difficulty::Medium)
        .record_progress(2, Duration::from_secs(10))
        .await
        .unwrap();

    let top = tracker.top_stats(2).await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].user_id, "bravo");
    assert_eq!(top[1].user_id, "charlie");
}
