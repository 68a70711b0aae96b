// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The activity log is the audit trail: the XP it records must reconcile
//! with the stats aggregate at all times.

use std::time::Duration;

use hackademy_progression::models::ActivityKind;
use hackademy_progression::models::Difficulty;

mod common;
use common::tracker_with_account;

const USER: &str = "auditor";

#[tokio::test]
async fn test_ledger_sums_to_aggregate_xp() {
    let tracker = tracker_with_account(USER).await;

    tracker
        .challenge(USER, "phishing-lab", 8, Difficulty::Medium)
        .record_progress(8, Duration::from_secs(200))
        .await
        .unwrap();
    tracker
        .course(USER, "secure-coding", Difficulty::Advanced)
        .record_progress(100, Duration::from_secs(900))
        .await
        .unwrap();
    tracker
        .awards()
        .grant_xp(USER, 75, "community writeup")
        .await
        .unwrap();

    let stats = tracker.stats(USER).await.unwrap().unwrap();
    assert_eq!(stats.xp, 500 + 3000 + 75);

    let ledger_total: u64 = tracker
        .store()
        .all_activities()
        .iter()
        .filter(|e| e.user_id == USER)
        .map(|e| e.xp_earned)
        .sum();
    assert_eq!(ledger_total, stats.xp, "ledger must reconcile with aggregate");
}

#[tokio::test]
async fn test_idempotent_repeat_leaves_ledger_unchanged() {
    let tracker = tracker_with_account(USER).await;
    let session = tracker.challenge(USER, "wifi-cracking", 6, Difficulty::Expert);

    session.record_progress(6, Duration::from_secs(60)).await.unwrap();
    session.record_progress(6, Duration::from_secs(60)).await.unwrap();
    session.record_progress(6, Duration::from_secs(60)).await.unwrap();

    let stats = tracker.stats(USER).await.unwrap().unwrap();
    assert_eq!(stats.xp, 5000);

    let ledger_total: u64 = tracker
        .store()
        .all_activities()
        .iter()
        .filter(|e| e.user_id == USER)
        .map(|e| e.xp_earned)
        .sum();
    assert_eq!(ledger_total, 5000);
}

#[tokio::test]
async fn test_feed_contains_expected_entry_kinds() {
    let tracker = tracker_with_account(USER).await;

    tracker
        .challenge(USER, "stego-hunt", 3, Difficulty::Beginner)
        .record_progress(3, Duration::from_secs(45))
        .await
        .unwrap();

    let feed = tracker.activity_feed(USER, 50).await.unwrap();

    assert!(feed
        .iter()
        .any(|e| matches!(e.kind, ActivityKind::AccountCreated)));
    assert!(feed
        .iter()
        .any(|e| matches!(e.kind, ActivityKind::ChallengeCompletion { .. })));
    // First completion also earns the first-challenge badge.
    assert!(feed
        .iter()
        .any(|e| matches!(e.kind, ActivityKind::AchievementEarned { .. })));
}

#[tokio::test]
async fn test_completion_entry_metadata_tracks_xp_movement() {
    let tracker = tracker_with_account(USER).await;

    tracker
        .awards()
        .grant_xp(USER, 200, "welcome bonus")
        .await
        .unwrap();
    tracker
        .challenge(USER, "binary-golf", 5, Difficulty::Medium)
        .record_progress(5, Duration::from_secs(60))
        .await
        .unwrap();

    let feed = tracker.activity_feed(USER, 50).await.unwrap();
    let completion = feed
        .iter()
        .find_map(|e| match &e.kind {
            ActivityKind::ChallengeCompletion {
                previous_xp,
                new_xp,
                ..
            } => Some((*previous_xp, *new_xp)),
            _ => None,
        })
        .expect("completion entry missing");

    assert_eq!(completion, (200, 700));
}
