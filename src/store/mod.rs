//! Storage layer: the document-store abstraction and its backends.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use futures_util::stream::BoxStream;

use crate::config::LevelCurve;
use crate::error::Result;
use crate::models::{
    Achievement, AchievementKind, ActivityLogEntry, AwardOutcome, EntityKind, ProgressRecord,
    UserStats, XpAward,
};

/// Collection names as constants.
pub mod collections {
    pub const PROGRESS: &str = "progress";
    /// User stats aggregates (keyed by user id)
    pub const USER_STATS: &str = "user_stats";
    pub const ACTIVITY_LOG: &str = "activity_log";
    pub const ACHIEVEMENTS: &str = "achievements";
}

/// Document-store capability required by the progression engine.
///
/// Backends must provide get-by-key, create-if-absent convergence through
/// deterministic document ids, an atomic check-and-set for the completion
/// flag, an atomic award commit against the stats aggregate (never
/// client-side read-then-write), append-only inserts, and restartable
/// snapshot subscriptions for UI consumers.
#[allow(async_fn_in_trait)]
pub trait ProgressStore: Clone + Send + Sync + 'static {
    // ─── Progress Records ────────────────────────────────────────

    async fn get_progress(
        &self,
        user_id: &str,
        entity_id: &str,
    ) -> Result<Option<ProgressRecord>>;

    /// Return the existing record or create zero-progress defaults.
    ///
    /// Concurrent creators converge on the same document because the id is
    /// derived deterministically from `(user_id, entity_id)` and the
    /// defaults are identical.
    async fn get_or_create_progress(
        &self,
        user_id: &str,
        entity_id: &str,
        kind: EntityKind,
        total_units: u32,
    ) -> Result<ProgressRecord>;

    /// Persist the full record state (non-completing updates).
    async fn save_progress(&self, record: &ProgressRecord) -> Result<()>;

    /// Persist a record that just transitioned into the completed state.
    ///
    /// Conditional: fails with [`crate::Error::LostRace`] if the stored
    /// record is already completed, so at most one racing writer wins the
    /// transition.
    async fn complete_progress(&self, record: &ProgressRecord) -> Result<()>;

    // ─── User Stats ──────────────────────────────────────────────

    async fn get_stats(&self, user_id: &str) -> Result<Option<UserStats>>;

    /// Create the zeroed stats document and the `account_created` log entry
    /// if they do not exist yet. Idempotent; the storage half of the
    /// identity provider's sign-up hook.
    async fn init_stats(&self, user_id: &str, now: &str) -> Result<UserStats>;

    /// Commit one XP award atomically: witness check, aggregate mutation
    /// and audit entry in a single transaction. Returns `None` when the
    /// award's completion witness shows it was already rewarded.
    async fn commit_award(
        &self,
        user_id: &str,
        award: &XpAward,
        curve: &LevelCurve,
        now: &str,
    ) -> Result<Option<AwardOutcome>>;

    /// Stats documents ordered by XP descending — the input the external
    /// leaderboard ranks from.
    async fn top_stats(&self, limit: u32) -> Result<Vec<UserStats>>;

    // ─── Activity Log ────────────────────────────────────────────

    async fn append_activity(&self, entry: &ActivityLogEntry) -> Result<()>;

    /// Newest-first activity feed for a user.
    async fn activities_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>>;

    // ─── Achievements ────────────────────────────────────────────

    /// Create-if-absent. Returns `true` if the achievement was newly
    /// granted, `false` if the user already had it.
    async fn grant_achievement(&self, achievement: &Achievement) -> Result<bool>;

    async fn achievements_for_user(&self, user_id: &str) -> Result<Vec<Achievement>>;

    /// Monotonic increment of an achievement's share counter.
    async fn increment_achievement_shares(
        &self,
        user_id: &str,
        kind: AchievementKind,
    ) -> Result<u64>;

    // ─── Subscriptions ───────────────────────────────────────────

    /// Lazy, restartable stream of progress snapshots for one record.
    /// UI-facing; the write path does not depend on it.
    fn watch_progress(&self, user_id: &str, entity_id: &str) -> BoxStream<'static, ProgressRecord>;

    /// Lazy, restartable stream of stats snapshots for one user.
    fn watch_stats(&self, user_id: &str) -> BoxStream<'static, UserStats>;
}
