// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Achievements (badges) earned by milestone events.

use serde::{Deserialize, Serialize};

/// Closed set of achievement types the engine can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    FirstChallenge,
    FirstPath,
    WeekStreak,
    MonthStreak,
}

impl AchievementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementKind::FirstChallenge => "first_challenge",
            AchievementKind::FirstPath => "first_path",
            AchievementKind::WeekStreak => "week_streak",
            AchievementKind::MonthStreak => "month_streak",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AchievementKind::FirstChallenge => "First Blood",
            AchievementKind::FirstPath => "Pathfinder",
            AchievementKind::WeekStreak => "On a Roll",
            AchievementKind::MonthStreak => "Unstoppable",
        }
    }

    pub fn blurb(&self) -> &'static str {
        match self {
            AchievementKind::FirstChallenge => "Completed your first challenge",
            AchievementKind::FirstPath => "Completed your first learning path",
            AchievementKind::WeekStreak => "Active 7 days in a row",
            AchievementKind::MonthStreak => "Active 30 days in a row",
        }
    }
}

/// An earned badge. Identity is `(user_id, kind)`; `share_count` is the
/// only field mutated after creation (monotonic increment).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub user_id: String,
    pub kind: AchievementKind,
    pub name: String,
    pub description: String,
    /// Badge image reference served by the UI layer.
    pub image: String,
    pub earned_at: String,
    #[serde(default)]
    pub share_count: u64,
}

impl Achievement {
    pub fn doc_id(user_id: &str, kind: AchievementKind) -> String {
        format!("{}_{}", urlencoding::encode(user_id), kind.as_str())
    }

    pub fn new(user_id: &str, kind: AchievementKind, now: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind,
            name: kind.title().to_string(),
            description: kind.blurb().to_string(),
            image: format!("badges/{}.svg", kind.as_str()),
            earned_at: now.to_string(),
            share_count: 0,
        }
    }
}
