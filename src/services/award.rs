// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP award service.
//!
//! Resolves the XP amount for a difficulty tier and performs the rewarded
//! mutation through the store's atomic commit: aggregate increment plus
//! audit entry, witness-checked so one completion is rewarded at most
//! once no matter how often the sequence is retried.

use crate::config::{CompletionPoints, LevelCurve, XpTable};
use crate::error::Result;
use crate::models::{
    Achievement, AchievementKind, ActivityLogEntry, AwardOutcome, AwardSource, Difficulty,
    EntityKind, XpAward,
};
use crate::store::ProgressStore;
use crate::time_utils;

/// Grants XP and derived rewards.
#[derive(Clone)]
pub struct XpAwardService<S> {
    store: S,
    xp_table: XpTable,
    points: CompletionPoints,
    curve: LevelCurve,
}

impl<S: ProgressStore> XpAwardService<S> {
    pub fn new(
        store: S,
        xp_table: XpTable,
        points: CompletionPoints,
        curve: LevelCurve,
    ) -> Self {
        Self {
            store,
            xp_table,
            points,
            curve,
        }
    }

    /// Award the completion of an entity.
    ///
    /// Returns `Some(outcome)` when this call committed the reward, `None`
    /// when the completion was already rewarded (retry, or the repeat leg
    /// of a lost race). Callers gate this behind the completion detector;
    /// the witness inside the commit is the second, transactional gate.
    pub async fn award_completion(
        &self,
        user_id: &str,
        entity_id: &str,
        kind: EntityKind,
        difficulty: Difficulty,
    ) -> Result<Option<AwardOutcome>> {
        let source = match kind {
            EntityKind::Challenge => AwardSource::ChallengeCompletion {
                entity_id: entity_id.to_string(),
                difficulty,
            },
            EntityKind::Course => AwardSource::CourseCompletion {
                entity_id: entity_id.to_string(),
                difficulty,
            },
        };
        let award = XpAward {
            source,
            amount: self.xp_table.xp_for(difficulty),
            points: match kind {
                EntityKind::Challenge => self.points.challenge,
                EntityKind::Course => self.points.course,
            },
        };

        let now = time_utils::now_rfc3339();
        let outcome = self.store.commit_award(user_id, &award, &self.curve, &now).await?;

        if let Some(outcome) = &outcome {
            tracing::info!(
                user_id,
                entity_id,
                %difficulty,
                xp_gained = outcome.xp_gained,
                "Completion rewarded"
            );
            self.grant_milestones(user_id, &now).await;
        }

        Ok(outcome)
    }

    /// Direct XP grant outside any completion (bonus, administrative
    /// credit). Not witness-gated; each call moves the counter.
    pub async fn grant_xp(
        &self,
        user_id: &str,
        amount: u64,
        reason: &str,
    ) -> Result<AwardOutcome> {
        let award = XpAward {
            source: AwardSource::Grant {
                reason: reason.to_string(),
            },
            amount,
            points: 0,
        };

        let now = time_utils::now_rfc3339();
        // Grants carry no witness, so the commit always applies.
        let Some(outcome) = self
            .store
            .commit_award(user_id, &award, &self.curve, &now)
            .await?
        else {
            return Err(crate::error::Error::Internal(anyhow::anyhow!(
                "grant award for {} unexpectedly skipped",
                user_id
            )));
        };

        tracing::info!(user_id, amount, reason, "XP granted");
        Ok(outcome)
    }

    /// Grant any milestone achievements the user's stats now qualify for.
    ///
    /// Best-effort: the XP award is already committed, and re-running the
    /// award path retries these idempotently, so a transient failure here
    /// is logged rather than propagated.
    async fn grant_milestones(&self, user_id: &str, now: &str) {
        let stats = match self.store.get_stats(user_id).await {
            Ok(Some(stats)) => stats,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Skipping milestone check");
                return;
            }
        };

        let mut earned = Vec::new();
        if stats.challenges_completed >= 1 {
            earned.push(AchievementKind::FirstChallenge);
        }
        if stats.paths_completed >= 1 {
            earned.push(AchievementKind::FirstPath);
        }
        if stats.streak_days >= 7 {
            earned.push(AchievementKind::WeekStreak);
        }
        if stats.streak_days >= 30 {
            earned.push(AchievementKind::MonthStreak);
        }

        for kind in earned {
            if let Err(e) = self.grant_achievement(user_id, kind, now).await {
                tracing::warn!(user_id, achievement = kind.as_str(), error = %e, "Achievement grant failed");
            }
        }
    }

    async fn grant_achievement(
        &self,
        user_id: &str,
        kind: AchievementKind,
        now: &str,
    ) -> Result<()> {
        let achievement = Achievement::new(user_id, kind, now);
        if self.store.grant_achievement(&achievement).await? {
            self.store
                .append_activity(&ActivityLogEntry::achievement_earned(
                    user_id,
                    kind.as_str(),
                    kind.title(),
                    now,
                ))
                .await?;
            tracing::info!(user_id, achievement = kind.as_str(), "Achievement earned");
        }
        Ok(())
    }
}
