//! Engine configuration loaded from environment variables.
//!
//! The difficulty→XP table and the level curve are injected configuration,
//! not hard-coded policy; JSON overrides let deployments tune reward
//! amounts without a code change.

use std::env;

use serde::{Deserialize, Serialize};

use crate::models::Difficulty;

/// Progression engine configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP project ID (Firestore backend)
    pub gcp_project_id: String,
    /// XP amount granted per difficulty tier
    pub xp_table: XpTable,
    /// Ascending XP thresholds defining the level step function
    pub level_curve: LevelCurve,
    /// Points granted per completion, by entity kind
    pub completion_points: CompletionPoints,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            xp_table: XpTable::default(),
            level_curve: LevelCurve::default(),
            completion_points: CompletionPoints::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `XP_TABLE` and `LEVEL_CURVE` accept JSON overrides, e.g.
    /// `XP_TABLE={"beginner":100,"medium":500,"advanced":3000,"expert":5000}`
    /// and `LEVEL_CURVE=[1000,2500,4500]`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            xp_table: parse_json_var("XP_TABLE")?.unwrap_or_default(),
            level_curve: parse_json_var("LEVEL_CURVE")?.unwrap_or_default(),
            completion_points: parse_json_var("COMPLETION_POINTS")?.unwrap_or_default(),
        })
    }
}

/// Parse an optional JSON-valued environment variable.
fn parse_json_var<T: serde::de::DeserializeOwned>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| ConfigError::Invalid(name, e.to_string())),
        Err(_) => Ok(None),
    }
}

/// XP granted for completing an entity of each difficulty tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XpTable {
    pub beginner: u64,
    pub medium: u64,
    pub advanced: u64,
    pub expert: u64,
}

impl Default for XpTable {
    fn default() -> Self {
        Self {
            beginner: 250,
            medium: 500,
            advanced: 3000,
            expert: 5000,
        }
    }
}

impl XpTable {
    pub fn xp_for(&self, difficulty: Difficulty) -> u64 {
        match difficulty {
            Difficulty::Beginner => self.beginner,
            Difficulty::Medium => self.medium,
            Difficulty::Advanced => self.advanced,
            Difficulty::Expert => self.expert,
        }
    }
}

/// Ascending XP thresholds; crossing threshold `i` reaches level `i + 2`.
///
/// This is the single canonical `xp → level` rule: `level_for_xp` is pure
/// and total over all non-negative XP values, and stats documents never
/// store a level that disagrees with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelCurve {
    pub thresholds: Vec<u64>,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self {
            thresholds: vec![
                1_000, 2_500, 4_500, 7_000, 10_000, 14_000, 19_000, 25_000, 32_000, 40_000,
            ],
        }
    }
}

impl LevelCurve {
    /// Level for an XP total: 1 plus the number of thresholds reached.
    pub fn level_for_xp(&self, xp: u64) -> u32 {
        self.thresholds.iter().take_while(|t| xp >= **t).count() as u32 + 1
    }
}

/// Points granted per completion, by entity kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionPoints {
    pub challenge: u64,
    pub course: u64,
}

impl Default for CompletionPoints {
    fn default() -> Self {
        Self {
            challenge: 100,
            course: 250,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
