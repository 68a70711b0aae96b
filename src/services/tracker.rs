// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Progress facade.
//!
//! Orchestrates the core workflow for one learning entity:
//! 1. Load or lazily create the progress record
//! 2. Evaluate the completion transition (pure, before any write)
//! 3. On the one completing transition: conditional flag commit, then the
//!    XP award
//! 4. Persist bookkeeping updates
//!
//! The facade serializes `record_progress` calls per session, so a single
//! tab never overlaps operations on the same record. Races across
//! tabs/devices are decided by the store's conditional completion write.

use std::time::Duration;

use futures_util::stream::BoxStream;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{
    ActivityLogEntry, AwardOutcome, Difficulty, EntityKind, ProgressRecord, UserStats,
};
use crate::services::{completion, XpAwardService};
use crate::store::ProgressStore;
use crate::time_utils;

/// Entry point tying the store and the award service together.
#[derive(Clone)]
pub struct ProgressTracker<S> {
    store: S,
    awards: XpAwardService<S>,
}

impl<S: ProgressStore> ProgressTracker<S> {
    pub fn new(store: S, config: &Config) -> Self {
        let awards = XpAwardService::new(
            store.clone(),
            config.xp_table.clone(),
            config.completion_points.clone(),
            config.level_curve.clone(),
        );
        Self { store, awards }
    }

    /// Session for one user's advancement on one challenge.
    pub fn challenge(
        &self,
        user_id: &str,
        challenge_id: &str,
        total_units: u32,
        difficulty: Difficulty,
    ) -> EntitySession<S> {
        EntitySession::new(
            self,
            user_id,
            challenge_id,
            EntityKind::Challenge,
            total_units,
            difficulty,
        )
    }

    /// Session for one user's advancement on one course.
    pub fn course(&self, user_id: &str, course_id: &str, difficulty: Difficulty) -> EntitySession<S> {
        EntitySession::new(self, user_id, course_id, EntityKind::Course, 0, difficulty)
    }

    /// Storage half of the sign-up hook: create the zeroed stats document
    /// and its `account_created` entry. Idempotent.
    pub async fn init_account(&self, user_id: &str) -> Result<UserStats> {
        self.store
            .init_stats(user_id, &time_utils::now_rfc3339())
            .await
    }

    pub async fn stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        self.store.get_stats(user_id).await
    }

    /// Newest-first activity feed for a user.
    pub async fn activity_feed(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>> {
        self.store.activities_for_user(user_id, limit).await
    }

    /// Stats ordered by XP descending — the external leaderboard ranks
    /// from this; the engine does not own `rank`.
    pub async fn top_stats(&self, limit: u32) -> Result<Vec<UserStats>> {
        self.store.top_stats(limit).await
    }

    pub fn watch_stats(&self, user_id: &str) -> BoxStream<'static, UserStats> {
        self.store.watch_stats(user_id)
    }

    pub fn watch_progress(
        &self,
        user_id: &str,
        entity_id: &str,
    ) -> BoxStream<'static, ProgressRecord> {
        self.store.watch_progress(user_id, entity_id)
    }

    pub fn awards(&self) -> &XpAwardService<S> {
        &self.awards
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Result of one `record_progress` call. UI consumers read
/// `completed_just_now` to decide whether to show a reward notification.
#[derive(Debug)]
pub struct ProgressOutcome {
    pub completed_just_now: bool,
    pub record: ProgressRecord,
    pub award: Option<AwardOutcome>,
}

/// Per-entity progress session: one instantiation per challenge or course
/// a user is working on.
pub struct EntitySession<S> {
    store: S,
    awards: XpAwardService<S>,
    user_id: String,
    entity_id: String,
    kind: EntityKind,
    total_units: u32,
    difficulty: Difficulty,
    /// Serializes record_progress calls from this session.
    gate: Mutex<()>,
}

impl<S: ProgressStore> EntitySession<S> {
    fn new(
        tracker: &ProgressTracker<S>,
        user_id: &str,
        entity_id: &str,
        kind: EntityKind,
        total_units: u32,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            store: tracker.store.clone(),
            awards: tracker.awards.clone(),
            user_id: user_id.to_string(),
            entity_id: entity_id.to_string(),
            kind,
            total_units,
            difficulty,
            gate: Mutex::new(()),
        }
    }

    /// Record an advancement update.
    ///
    /// `measure` is correct answers for a challenge, percent for a course.
    /// Values outside `[0, max]` are rejected with `InvalidMeasure` and
    /// leave the stored record untouched.
    pub async fn record_progress(
        &self,
        measure: u32,
        time_spent: Duration,
    ) -> Result<ProgressOutcome> {
        let _serial = self.gate.lock().await;

        let previous = self
            .store
            .get_or_create_progress(&self.user_id, &self.entity_id, self.kind, self.total_units)
            .await?;

        let max = previous.advancement.max_units();
        if measure > max {
            return Err(Error::InvalidMeasure {
                value: measure,
                max,
            });
        }

        let now = time_utils::now_rfc3339();
        let time_secs = time_spent.as_secs();

        if previous.completed {
            return self.record_after_completion(previous, measure, time_secs, &now).await;
        }

        let mut next = previous.clone();
        next.apply_measure(measure, time_secs, &now);

        if !completion::was_just_completed(&previous, &next) {
            self.store.save_progress(&next).await?;
            return Ok(ProgressOutcome {
                completed_just_now: false,
                record: next,
                award: None,
            });
        }

        // The completion transition. Flag commit first: the conditional
        // write decides cross-device races before any reward moves.
        next.mark_completed(&now);
        match self.store.complete_progress(&next).await {
            Ok(()) => {
                let award = self
                    .awards
                    .award_completion(&self.user_id, &self.entity_id, self.kind, self.difficulty)
                    .await?;

                tracing::info!(
                    user_id = %self.user_id,
                    entity_id = %self.entity_id,
                    "Entity completed"
                );
                Ok(ProgressOutcome {
                    completed_just_now: true,
                    record: next,
                    award,
                })
            }
            Err(Error::LostRace) => {
                // Another tab or device claimed the transition; suppress
                // our award and keep only the time bookkeeping.
                tracing::debug!(
                    user_id = %self.user_id,
                    entity_id = %self.entity_id,
                    "Completion race lost"
                );
                let record = match self
                    .store
                    .get_progress(&self.user_id, &self.entity_id)
                    .await?
                {
                    Some(mut winner) => {
                        winner.touch(time_secs, &now);
                        self.store.save_progress(&winner).await?;
                        winner
                    }
                    None => next,
                };
                Ok(ProgressOutcome {
                    completed_just_now: false,
                    record,
                    award: None,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Updates after the record reached its terminal state: bookkeeping
    /// fields only, never the measure, never `completed_at`.
    async fn record_after_completion(
        &self,
        previous: ProgressRecord,
        measure: u32,
        time_secs: u64,
        now: &str,
    ) -> Result<ProgressOutcome> {
        let mut record = previous;
        record.touch(time_secs, now);
        self.store.save_progress(&record).await?;

        // A maximal re-submission re-enters the award service: the witness
        // makes the common repeat a no-op, and finishes the reward if a
        // crash interrupted a prior attempt between flag commit and award.
        let max = record.advancement.max_units();
        let award = if max > 0 && measure == max {
            self.awards
                .award_completion(&self.user_id, &self.entity_id, self.kind, self.difficulty)
                .await?
        } else {
            None
        };

        Ok(ProgressOutcome {
            completed_just_now: false,
            record,
            award,
        })
    }
}
