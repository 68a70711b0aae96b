// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store backend.
//!
//! Serves tests and offline development. Entry-level locking on the
//! concurrent maps stands in for Firestore transactions: the progress
//! entry lock decides completion races, and the stats entry lock makes the
//! award commit atomic with respect to other awards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::config::LevelCurve;
use crate::error::{Error, Result};
use crate::models::{
    Achievement, AchievementKind, ActivityLogEntry, AwardOutcome, EntityKind, ProgressRecord,
    UserStats, XpAward,
};
use crate::store::ProgressStore;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
enum StoreEvent {
    Progress(ProgressRecord),
    Stats(UserStats),
}

/// In-memory progress store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    progress: DashMap<String, ProgressRecord>,
    stats: DashMap<String, UserStats>,
    activities: DashMap<String, ActivityLogEntry>,
    achievements: DashMap<String, Achievement>,
    events: broadcast::Sender<StoreEvent>,
    offline: AtomicBool,
}

impl Default for Inner {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            progress: DashMap::new(),
            stats: DashMap::new(),
            activities: DashMap::new(),
            achievements: DashMap::new(),
            events,
            offline: AtomicBool::new(false),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a storage outage: while offline, every operation fails
    /// with `StorageUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Every stored activity entry, unordered. Test inspection helper.
    pub fn all_activities(&self) -> Vec<ActivityLogEntry> {
        self.inner
            .activities
            .iter()
            .map(|e| e.value().clone())
            .collect()
    }

    fn check_online(&self) -> Result<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(Error::StorageUnavailable(
                "store offline (simulated)".to_string(),
            ));
        }
        Ok(())
    }

    fn publish(&self, event: StoreEvent) {
        // No subscribers is fine; the write path does not depend on them.
        let _ = self.inner.events.send(event);
    }
}

impl ProgressStore for MemoryStore {
    // ─── Progress Records ────────────────────────────────────────

    async fn get_progress(
        &self,
        user_id: &str,
        entity_id: &str,
    ) -> Result<Option<ProgressRecord>> {
        self.check_online()?;
        Ok(self
            .inner
            .progress
            .get(&ProgressRecord::doc_id(user_id, entity_id))
            .map(|r| r.value().clone()))
    }

    async fn get_or_create_progress(
        &self,
        user_id: &str,
        entity_id: &str,
        kind: EntityKind,
        total_units: u32,
    ) -> Result<ProgressRecord> {
        self.check_online()?;
        let doc_id = ProgressRecord::doc_id(user_id, entity_id);
        let record = self
            .inner
            .progress
            .entry(doc_id)
            .or_insert_with(|| {
                ProgressRecord::new(
                    user_id,
                    entity_id,
                    kind,
                    total_units,
                    &crate::time_utils::now_rfc3339(),
                )
            })
            .value()
            .clone();
        Ok(record)
    }

    async fn save_progress(&self, record: &ProgressRecord) -> Result<()> {
        self.check_online()?;
        self.inner.progress.insert(
            ProgressRecord::doc_id(&record.user_id, &record.entity_id),
            record.clone(),
        );
        self.publish(StoreEvent::Progress(record.clone()));
        Ok(())
    }

    async fn complete_progress(&self, record: &ProgressRecord) -> Result<()> {
        self.check_online()?;
        let doc_id = ProgressRecord::doc_id(&record.user_id, &record.entity_id);

        // The entry lock is the check-and-set: at most one racing writer
        // observes completed == false and wins the transition.
        match self.inner.progress.entry(doc_id) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().completed {
                    return Err(Error::LostRace);
                }
                occupied.insert(record.clone());
            }
            Entry::Vacant(vacant) => {
                vacant.insert(record.clone());
            }
        }

        self.publish(StoreEvent::Progress(record.clone()));
        Ok(())
    }

    // ─── User Stats ──────────────────────────────────────────────

    async fn get_stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        self.check_online()?;
        Ok(self.inner.stats.get(user_id).map(|s| s.value().clone()))
    }

    async fn init_stats(&self, user_id: &str, now: &str) -> Result<UserStats> {
        self.check_online()?;
        let mut created = false;
        let stats = self
            .inner
            .stats
            .entry(user_id.to_string())
            .or_insert_with(|| {
                created = true;
                UserStats::new(user_id, now)
            })
            .value()
            .clone();

        if created {
            let entry = ActivityLogEntry::account_created(user_id, now);
            self.inner.activities.insert(entry.doc_id(), entry);
            self.publish(StoreEvent::Stats(stats.clone()));
        }
        Ok(stats)
    }

    async fn commit_award(
        &self,
        user_id: &str,
        award: &XpAward,
        curve: &LevelCurve,
        now: &str,
    ) -> Result<Option<AwardOutcome>> {
        self.check_online()?;

        let mut stats_ref = self
            .inner
            .stats
            .get_mut(user_id)
            .ok_or_else(|| Error::NotFound(format!("user_stats/{}", user_id)))?;

        let Some(outcome) = stats_ref.value_mut().record_award(award, curve, now) else {
            tracing::debug!(user_id, "Award already recorded (idempotent skip)");
            return Ok(None);
        };

        // The audit entry lands while the stats entry lock is still held,
        // so no observer can see the XP move without its entry.
        let entry = award.entry(user_id, outcome.previous_xp, outcome.new_xp, now);
        self.inner.activities.insert(entry.doc_id(), entry);

        let snapshot = stats_ref.value().clone();
        drop(stats_ref);
        self.publish(StoreEvent::Stats(snapshot));

        tracing::info!(
            user_id,
            xp_gained = outcome.xp_gained,
            new_xp = outcome.new_xp,
            "XP award committed"
        );
        Ok(Some(outcome))
    }

    async fn top_stats(&self, limit: u32) -> Result<Vec<UserStats>> {
        self.check_online()?;
        let mut all: Vec<UserStats> = self
            .inner
            .stats
            .iter()
            .map(|s| s.value().clone())
            .collect();
        all.sort_by(|a, b| b.xp.cmp(&a.xp));
        all.truncate(limit as usize);
        Ok(all)
    }

    // ─── Activity Log ────────────────────────────────────────────

    async fn append_activity(&self, entry: &ActivityLogEntry) -> Result<()> {
        self.check_online()?;
        self.inner.activities.insert(entry.doc_id(), entry.clone());
        Ok(())
    }

    async fn activities_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>> {
        self.check_online()?;
        let mut entries: Vec<ActivityLogEntry> = self
            .inner
            .activities
            .iter()
            .filter(|e| e.value().user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit as usize);
        Ok(entries)
    }

    // ─── Achievements ────────────────────────────────────────────

    async fn grant_achievement(&self, achievement: &Achievement) -> Result<bool> {
        self.check_online()?;
        let doc_id = Achievement::doc_id(&achievement.user_id, achievement.kind);
        match self.inner.achievements.entry(doc_id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(achievement.clone());
                Ok(true)
            }
        }
    }

    async fn achievements_for_user(&self, user_id: &str) -> Result<Vec<Achievement>> {
        self.check_online()?;
        Ok(self
            .inner
            .achievements
            .iter()
            .filter(|a| a.value().user_id == user_id)
            .map(|a| a.value().clone())
            .collect())
    }

    async fn increment_achievement_shares(
        &self,
        user_id: &str,
        kind: AchievementKind,
    ) -> Result<u64> {
        self.check_online()?;
        let doc_id = Achievement::doc_id(user_id, kind);
        let mut achievement = self
            .inner
            .achievements
            .get_mut(&doc_id)
            .ok_or_else(|| Error::NotFound(format!("achievements/{}", doc_id)))?;
        achievement.value_mut().share_count += 1;
        Ok(achievement.value().share_count)
    }

    // ─── Subscriptions ───────────────────────────────────────────

    fn watch_progress(&self, user_id: &str, entity_id: &str) -> BoxStream<'static, ProgressRecord> {
        let doc_id = ProgressRecord::doc_id(user_id, entity_id);

        // Subscribe before snapshotting so no update falls in the gap; a
        // duplicate snapshot is harmless for idempotent UI rendering.
        let updates = BroadcastStream::new(self.inner.events.subscribe());
        let current = self
            .inner
            .progress
            .get(&doc_id)
            .map(|r| r.value().clone());

        let filtered = updates.filter_map(move |event| {
            let wanted = match event {
                Ok(StoreEvent::Progress(record))
                    if ProgressRecord::doc_id(&record.user_id, &record.entity_id) == doc_id =>
                {
                    Some(record)
                }
                _ => None,
            };
            futures_util::future::ready(wanted)
        });

        futures_util::stream::iter(current).chain(filtered).boxed()
    }

    fn watch_stats(&self, user_id: &str) -> BoxStream<'static, UserStats> {
        let user_id = user_id.to_string();

        let updates = BroadcastStream::new(self.inner.events.subscribe());
        let current = self.inner.stats.get(&user_id).map(|s| s.value().clone());

        let filtered = updates.filter_map(move |event| {
            let wanted = match event {
                Ok(StoreEvent::Stats(stats)) if stats.user_id == user_id => Some(stats),
                _ => None,
            };
            futures_util::future::ready(wanted)
        });

        futures_util::stream::iter(current).chain(filtered).boxed()
    }
}
