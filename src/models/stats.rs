//! Per-user aggregate statistics.
//!
//! One document per user, pre-computed at award time so dashboards and the
//! leaderboard read O(1) documents instead of replaying the activity log.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::LevelCurve;
use crate::models::activity::{AwardOutcome, AwardSource, XpAward};
use crate::time_utils;

/// Aggregate stats for a user.
///
/// Stored in the `user_stats` collection, keyed by user id. Created once at
/// account sign-up; mutated only through [`UserStats::record_award`] inside
/// the store's atomic commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,

    /// Experience points. Monotonically non-decreasing; every increase has
    /// a matching activity-log entry.
    #[serde(default)]
    pub xp: u64,
    /// Derived from `xp` via the configured level curve. Starts at 1.
    #[serde(default = "default_level")]
    pub level: u32,
    /// Leaderboard position, computed externally by sorting all users' XP.
    /// Read-only input here.
    #[serde(default)]
    pub rank: u32,

    #[serde(default)]
    pub challenges_completed: u32,
    #[serde(default)]
    pub paths_completed: u32,
    #[serde(default)]
    pub total_points: u64,

    /// Consecutive active days, extended or reset on every award.
    #[serde(default)]
    pub streak_days: u32,
    #[serde(default)]
    pub last_active_at: String,
    #[serde(default)]
    pub updated_at: String,

    // ─── Idempotency ─────────────────────────────────────────────
    /// Entity ids whose completion has already been rewarded. Checked and
    /// inserted inside the award transaction, so a retried or racing award
    /// for the same completion is a no-op.
    #[serde(default)]
    pub rewarded_completions: HashSet<String>,
}

fn default_level() -> u32 {
    1
}

impl UserStats {
    /// Zeroed stats for a new account (starting level 1).
    pub fn new(user_id: &str, now: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            xp: 0,
            level: 1,
            rank: 0,
            challenges_completed: 0,
            paths_completed: 0,
            total_points: 0,
            streak_days: 0,
            last_active_at: String::new(),
            updated_at: now.to_string(),
            rewarded_completions: HashSet::new(),
        }
    }

    /// Apply an XP award to the aggregate.
    ///
    /// Returns `None` if the award carries a completion witness that is
    /// already present (duplicate — nothing mutated). Otherwise mutates the
    /// aggregate and returns the XP delta for the caller's activity entry.
    pub fn record_award(
        &mut self,
        award: &XpAward,
        curve: &LevelCurve,
        now: &str,
    ) -> Option<AwardOutcome> {
        if let Some(key) = award.witness_key() {
            if !self.rewarded_completions.insert(key) {
                return None;
            }
        }

        let previous_xp = self.xp;
        self.xp += award.amount;
        self.level = curve.level_for_xp(self.xp);
        self.total_points += award.points;

        match &award.source {
            AwardSource::ChallengeCompletion { .. } => self.challenges_completed += 1,
            AwardSource::CourseCompletion { .. } => self.paths_completed += 1,
            AwardSource::Grant { .. } => {}
        }

        self.bump_streak(now);
        self.last_active_at = now.to_string();
        self.updated_at = now.to_string();

        Some(AwardOutcome {
            previous_xp,
            new_xp: self.xp,
            xp_gained: award.amount,
        })
    }

    /// Consecutive-day bookkeeping: same day keeps the streak, the next day
    /// extends it, any gap (or an unparseable timestamp) resets to 1.
    fn bump_streak(&mut self, now: &str) {
        if self.last_active_at.is_empty() {
            self.streak_days = 1;
            return;
        }
        match time_utils::days_between(&self.last_active_at, now) {
            Some(0) => {}
            Some(1) => self.streak_days += 1,
            _ => self.streak_days = 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;

    fn challenge_award(entity_id: &str, amount: u64) -> XpAward {
        XpAward {
            source: AwardSource::ChallengeCompletion {
                entity_id: entity_id.to_string(),
                difficulty: Difficulty::Medium,
            },
            amount,
            points: 100,
        }
    }

    #[test]
    fn test_record_award_basic() {
        let curve = LevelCurve::default();
        let mut stats = UserStats::new("user-1", "2026-02-01T10:00:00Z");

        let outcome = stats
            .record_award(&challenge_award("xss-basics", 500), &curve, "2026-02-01T10:05:00Z")
            .expect("fresh award should apply");

        assert_eq!(outcome.previous_xp, 0);
        assert_eq!(outcome.new_xp, 500);
        assert_eq!(outcome.xp_gained, 500);
        assert_eq!(stats.xp, 500);
        assert_eq!(stats.level, 1);
        assert_eq!(stats.challenges_completed, 1);
        assert_eq!(stats.total_points, 100);
        assert_eq!(stats.streak_days, 1);
    }

    #[test]
    fn test_duplicate_completion_is_skipped() {
        let curve = LevelCurve::default();
        let mut stats = UserStats::new("user-1", "now");

        stats.record_award(&challenge_award("xss-basics", 500), &curve, "2026-02-01T10:00:00Z");
        let again =
            stats.record_award(&challenge_award("xss-basics", 500), &curve, "2026-02-01T11:00:00Z");

        assert!(again.is_none());
        assert_eq!(stats.xp, 500); // Not incremented twice
        assert_eq!(stats.challenges_completed, 1);
    }

    #[test]
    fn test_level_follows_curve() {
        let curve = LevelCurve::default();
        let mut stats = UserStats::new("user-1", "now");

        stats.record_award(&challenge_award("a", 800), &curve, "2026-02-01T10:00:00Z");
        assert_eq!(stats.level, 1);
        stats.record_award(&challenge_award("b", 800), &curve, "2026-02-01T11:00:00Z");
        assert_eq!(stats.xp, 1600);
        assert_eq!(stats.level, 2);
    }

    #[test]
    fn test_grants_do_not_touch_completion_counters() {
        let curve = LevelCurve::default();
        let mut stats = UserStats::new("user-1", "now");

        let grant = XpAward {
            source: AwardSource::Grant {
                reason: "beta tester bonus".to_string(),
            },
            amount: 50,
            points: 0,
        };
        stats.record_award(&grant, &curve, "2026-02-01T10:00:00Z");

        assert_eq!(stats.xp, 50);
        assert_eq!(stats.challenges_completed, 0);
        assert_eq!(stats.paths_completed, 0);
    }

    #[test]
    fn test_streak_extends_and_resets() {
        let curve = LevelCurve::default();
        let mut stats = UserStats::new("user-1", "now");

        stats.record_award(&challenge_award("a", 10), &curve, "2026-02-01T22:00:00Z");
        assert_eq!(stats.streak_days, 1);

        // Same day: unchanged
        stats.record_award(&challenge_award("b", 10), &curve, "2026-02-01T23:00:00Z");
        assert_eq!(stats.streak_days, 1);

        // Next day: extended
        stats.record_award(&challenge_award("c", 10), &curve, "2026-02-02T09:00:00Z");
        assert_eq!(stats.streak_days, 2);

        // Gap: reset
        stats.record_award(&challenge_award("d", 10), &curve, "2026-02-05T09:00:00Z");
        assert_eq!(stats.streak_days, 1);
    }
}
