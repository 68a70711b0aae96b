// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Per-user, per-entity progress record.

use serde::{Deserialize, Serialize};

/// Kind of learning entity a progress record tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Challenge,
    Course,
}

/// Named difficulty tier of a challenge or course.
///
/// The tier→XP mapping lives in [`crate::config::XpTable`]; this type only
/// names the tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Medium,
    Advanced,
    Expert,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Medium => "medium",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
        };
        f.write_str(s)
    }
}

/// Advancement measure, specific to the entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "measure", rename_all = "snake_case")]
pub enum Advancement {
    /// Quiz-style challenge: correct answers out of a fixed question count.
    Challenge {
        correct_answers: u32,
        total_units: u32,
    },
    /// Course: percent of modules completed.
    Course { progress_percent: u32 },
}

impl Advancement {
    pub fn zero(kind: EntityKind, total_units: u32) -> Self {
        match kind {
            EntityKind::Challenge => Advancement::Challenge {
                correct_answers: 0,
                total_units,
            },
            EntityKind::Course => Advancement::Course {
                progress_percent: 0,
            },
        }
    }

    /// Maximum value the measure can take (question count, or 100).
    pub fn max_units(&self) -> u32 {
        match self {
            Advancement::Challenge { total_units, .. } => *total_units,
            Advancement::Course { .. } => 100,
        }
    }

    pub fn units(&self) -> u32 {
        match self {
            Advancement::Challenge {
                correct_answers, ..
            } => *correct_answers,
            Advancement::Course { progress_percent } => *progress_percent,
        }
    }

    pub fn set_units(&mut self, value: u32) {
        match self {
            Advancement::Challenge {
                correct_answers, ..
            } => *correct_answers = value,
            Advancement::Course { progress_percent } => *progress_percent = value,
        }
    }

    /// Whether the measure has reached its maximum.
    ///
    /// A zero-question challenge can never be completed via this measure;
    /// the guard is explicit rather than a division sentinel.
    pub fn is_maximal(&self) -> bool {
        match self {
            Advancement::Challenge {
                correct_answers,
                total_units,
            } => *total_units > 0 && correct_answers == total_units,
            Advancement::Course { progress_percent } => *progress_percent == 100,
        }
    }
}

/// One user's advancement on one learning entity.
///
/// Stored under a document id derived deterministically from
/// `(user_id, entity_id)` so get-or-create is idempotent and concurrent
/// creators converge on the same document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: String,
    pub entity_id: String,
    pub kind: EntityKind,
    #[serde(flatten)]
    pub advancement: Advancement,
    /// True iff the advancement measure has reached its maximum.
    #[serde(default)]
    pub completed: bool,
    /// Set exactly once, at the first transition into the completed state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// When the record was created (first interaction).
    pub started_at: String,
    /// Last mutation timestamp (ISO 8601).
    pub last_updated: String,
    /// Cumulative time spent, in seconds.
    #[serde(default)]
    pub time_spent_secs: u64,
}

impl ProgressRecord {
    /// Deterministic composite document id for a `(user, entity)` pair.
    pub fn doc_id(user_id: &str, entity_id: &str) -> String {
        format!(
            "{}_{}",
            urlencoding::encode(user_id),
            urlencoding::encode(entity_id)
        )
    }

    /// Fresh zero-progress record (lazy creation on first interaction).
    pub fn new(
        user_id: &str,
        entity_id: &str,
        kind: EntityKind,
        total_units: u32,
        now: &str,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            entity_id: entity_id.to_string(),
            kind,
            advancement: Advancement::zero(kind, total_units),
            completed: false,
            completed_at: None,
            started_at: now.to_string(),
            last_updated: now.to_string(),
            time_spent_secs: 0,
        }
    }

    /// Apply a new advancement value plus time bookkeeping.
    pub fn apply_measure(&mut self, value: u32, time_spent_secs: u64, now: &str) {
        self.advancement.set_units(value);
        self.time_spent_secs += time_spent_secs;
        self.last_updated = now.to_string();
    }

    /// Update only the bookkeeping fields (terminal records keep their
    /// maximal measure and `completed_at` frozen).
    pub fn touch(&mut self, time_spent_secs: u64, now: &str) {
        self.time_spent_secs += time_spent_secs;
        self.last_updated = now.to_string();
    }

    /// Flip into the completed state. `completed_at` is write-once.
    pub fn mark_completed(&mut self, now: &str) {
        self.completed = true;
        if self.completed_at.is_none() {
            self.completed_at = Some(now.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: &str = "2026-02-01T10:00:00Z";

    #[test]
    fn test_doc_id_is_deterministic() {
        assert_eq!(
            ProgressRecord::doc_id("user-1", "sql-injection-101"),
            ProgressRecord::doc_id("user-1", "sql-injection-101"),
        );
        assert_ne!(
            ProgressRecord::doc_id("user-1", "a_b"),
            ProgressRecord::doc_id("user-1_a", "b"),
        );
    }

    #[test]
    fn test_challenge_maximal() {
        let mut adv = Advancement::zero(EntityKind::Challenge, 10);
        assert!(!adv.is_maximal());
        adv.set_units(10);
        assert!(adv.is_maximal());
    }

    #[test]
    fn test_zero_total_units_is_never_maximal() {
        let mut adv = Advancement::zero(EntityKind::Challenge, 0);
        assert!(!adv.is_maximal());
        adv.set_units(0);
        assert!(!adv.is_maximal());
    }

    #[test]
    fn test_course_maximal_at_100_percent() {
        let mut adv = Advancement::zero(EntityKind::Course, 0);
        adv.set_units(99);
        assert!(!adv.is_maximal());
        adv.set_units(100);
        assert!(adv.is_maximal());
    }

    #[test]
    fn test_completed_at_is_write_once() {
        let mut rec = ProgressRecord::new("u", "e", EntityKind::Course, 0, NOW);
        rec.mark_completed(NOW);
        assert_eq!(rec.completed_at.as_deref(), Some(NOW));

        rec.mark_completed("2026-02-02T10:00:00Z");
        assert_eq!(rec.completed_at.as_deref(), Some(NOW));
    }

    #[test]
    fn test_apply_measure_accumulates_time() {
        let mut rec = ProgressRecord::new("u", "e", EntityKind::Challenge, 10, NOW);
        rec.apply_measure(3, 60, NOW);
        rec.apply_measure(7, 90, NOW);
        assert_eq!(rec.advancement.units(), 7);
        assert_eq!(rec.time_spent_secs, 150);
    }
}
