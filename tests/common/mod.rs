// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use hackademy_progression::{Config, MemoryStore, ProgressTracker};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Tracker over a fresh in-memory store with test configuration.
#[allow(dead_code)]
pub fn memory_tracker() -> ProgressTracker<MemoryStore> {
    ProgressTracker::new(MemoryStore::new(), &Config::default())
}

/// Tracker with the given user's account already initialized.
#[allow(dead_code)]
pub async fn tracker_with_account(user_id: &str) -> ProgressTracker<MemoryStore> {
    let tracker = memory_tracker();
    tracker
        .init_account(user_id)
        .await
        .expect("Failed to init test account");
    tracker
}
