// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Append-only activity log entries and the award descriptions that
//! produce them.

use serde::{Deserialize, Serialize};

use crate::models::Difficulty;

/// What happened, as a closed set of variants. Each variant carries only
/// the fields relevant to that event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "activity_type", rename_all = "snake_case")]
pub enum ActivityKind {
    ChallengeCompletion {
        entity_id: String,
        difficulty: Difficulty,
        previous_xp: u64,
        new_xp: u64,
    },
    PathCompletion {
        entity_id: String,
        difficulty: Difficulty,
        previous_xp: u64,
        new_xp: u64,
    },
    XpEarned {
        reason: String,
        previous_xp: u64,
        new_xp: u64,
    },
    AchievementEarned {
        achievement: String,
    },
    AccountCreated,
}

/// Immutable audit record of a reward-worthy event.
///
/// Entries are never mutated or deleted; ordering is by `created_at`. The
/// sum of `xp_earned` over a user's entries reconciles with the stats
/// aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub user_id: String,
    #[serde(flatten)]
    pub kind: ActivityKind,
    /// Human-readable feed line.
    pub description: String,
    #[serde(default)]
    pub xp_earned: u64,
    #[serde(default)]
    pub points_earned: u64,
    pub created_at: String,
}

impl ActivityLogEntry {
    /// Document id for the entry. Completion, achievement and
    /// account-creation entries use deterministic ids so a retried append
    /// cannot produce a duplicate.
    pub fn doc_id(&self) -> String {
        let user = urlencoding::encode(&self.user_id);
        match &self.kind {
            ActivityKind::ChallengeCompletion { entity_id, .. }
            | ActivityKind::PathCompletion { entity_id, .. } => {
                format!("{}_{}_completion", user, urlencoding::encode(entity_id))
            }
            ActivityKind::AchievementEarned { achievement } => {
                format!("{}_{}_achievement", user, urlencoding::encode(achievement))
            }
            ActivityKind::AccountCreated => format!("{}_account_created", user),
            ActivityKind::XpEarned { new_xp, .. } => {
                // XP is monotonic, so (user, created_at, new_xp) is unique
                // for any grant that actually moved the counter.
                format!("{}_xp_{}_{}", user, self.created_at, new_xp)
            }
        }
    }

    pub fn account_created(user_id: &str, now: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind: ActivityKind::AccountCreated,
            description: "Account created".to_string(),
            xp_earned: 0,
            points_earned: 0,
            created_at: now.to_string(),
        }
    }

    pub fn achievement_earned(user_id: &str, achievement: &str, name: &str, now: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind: ActivityKind::AchievementEarned {
                achievement: achievement.to_string(),
            },
            description: format!("Earned achievement: {}", name),
            xp_earned: 0,
            points_earned: 0,
            created_at: now.to_string(),
        }
    }
}

/// Where an XP award came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwardSource {
    ChallengeCompletion {
        entity_id: String,
        difficulty: Difficulty,
    },
    CourseCompletion {
        entity_id: String,
        difficulty: Difficulty,
    },
    /// Direct grant outside any completion (bonus, administrative credit).
    Grant { reason: String },
}

/// One XP award to be committed atomically against a user's stats.
#[derive(Debug, Clone)]
pub struct XpAward {
    pub source: AwardSource,
    /// Non-negative XP amount.
    pub amount: u64,
    /// Points counted into `total_points`.
    pub points: u64,
}

impl XpAward {
    /// Idempotency witness key, present for completion awards. The stats
    /// document records these keys so the award fires at most once per
    /// completion, no matter how often the sequence is retried.
    pub fn witness_key(&self) -> Option<String> {
        match &self.source {
            AwardSource::ChallengeCompletion { entity_id, .. }
            | AwardSource::CourseCompletion { entity_id, .. } => Some(entity_id.clone()),
            AwardSource::Grant { .. } => None,
        }
    }

    /// Build the audit entry for this award, given the XP values observed
    /// inside the commit.
    pub fn entry(&self, user_id: &str, previous_xp: u64, new_xp: u64, now: &str) -> ActivityLogEntry {
        let (kind, description) = match &self.source {
            AwardSource::ChallengeCompletion {
                entity_id,
                difficulty,
            } => (
                ActivityKind::ChallengeCompletion {
                    entity_id: entity_id.clone(),
                    difficulty: *difficulty,
                    previous_xp,
                    new_xp,
                },
                format!(
                    "Completed challenge {} ({}) for {} XP",
                    entity_id, difficulty, self.amount
                ),
            ),
            AwardSource::CourseCompletion {
                entity_id,
                difficulty,
            } => (
                ActivityKind::PathCompletion {
                    entity_id: entity_id.clone(),
                    difficulty: *difficulty,
                    previous_xp,
                    new_xp,
                },
                format!(
                    "Completed path {} ({}) for {} XP",
                    entity_id, difficulty, self.amount
                ),
            ),
            AwardSource::Grant { reason } => (
                ActivityKind::XpEarned {
                    reason: reason.clone(),
                    previous_xp,
                    new_xp,
                },
                format!("Earned {} XP: {}", self.amount, reason),
            ),
        };

        ActivityLogEntry {
            user_id: user_id.to_string(),
            kind,
            description,
            xp_earned: self.amount,
            points_earned: self.points,
            created_at: now.to_string(),
        }
    }
}

/// XP movement observed by one committed award.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwardOutcome {
    pub previous_xp: u64,
    pub new_xp: u64,
    pub xp_gained: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_type_tag_names() {
        let entry = ActivityLogEntry {
            user_id: "u1".to_string(),
            kind: ActivityKind::ChallengeCompletion {
                entity_id: "xss-basics".to_string(),
                difficulty: Difficulty::Medium,
                previous_xp: 0,
                new_xp: 500,
            },
            description: "Completed challenge xss-basics (medium) for 500 XP".to_string(),
            xp_earned: 500,
            points_earned: 100,
            created_at: "2026-02-01T10:00:00Z".to_string(),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["activity_type"], "challenge_completion");
        assert_eq!(json["entity_id"], "xss-basics");
        assert_eq!(json["previous_xp"], 0);
        assert_eq!(json["new_xp"], 500);

        let back: ActivityLogEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind, entry.kind);
    }

    #[test]
    fn test_completion_entry_doc_id_is_deterministic() {
        let award = XpAward {
            source: AwardSource::ChallengeCompletion {
                entity_id: "xss-basics".to_string(),
                difficulty: Difficulty::Medium,
            },
            amount: 500,
            points: 100,
        };
        let a = award.entry("u1", 0, 500, "2026-02-01T10:00:00Z");
        let b = award.entry("u1", 0, 500, "2026-02-01T11:00:00Z");
        // Retried append lands on the same document.
        assert_eq!(a.doc_id(), b.doc_id());
        assert_eq!(a.doc_id(), "u1_xss-basics_completion");
    }

    #[test]
    fn test_witness_key_only_for_completions() {
        let grant = XpAward {
            source: AwardSource::Grant {
                reason: "bonus".to_string(),
            },
            amount: 10,
            points: 0,
        };
        assert!(grant.witness_key().is_none());

        let completion = XpAward {
            source: AwardSource::CourseCompletion {
                entity_id: "network-defense".to_string(),
                difficulty: Difficulty::Advanced,
            },
            amount: 3000,
            points: 250,
        };
        assert_eq!(completion.witness_key().as_deref(), Some("network-defense"));
    }
}
