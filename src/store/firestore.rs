// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Progress records (per-user, per-entity advancement)
//! - User stats aggregates (XP, level, counters, idempotency witness)
//! - Activity log (append-only audit trail)
//! - Achievements (badges)

use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use crate::config::LevelCurve;
use crate::error::{Error, Result};
use crate::models::{
    Achievement, AchievementKind, ActivityLogEntry, AwardOutcome, EntityKind, ProgressRecord,
    UserStats, XpAward,
};
use crate::store::{collections, ProgressStore};

/// Snapshot poll cadence for the watch streams.
const WATCH_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Firestore-backed progress store.
#[derive(Clone)]
pub struct FirestoreStore {
    client: firestore::FirestoreDb,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            Error::StorageUnavailable(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            Error::StorageUnavailable(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    async fn get_progress_by_doc_id(&self, doc_id: &str) -> Result<Option<ProgressRecord>> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::PROGRESS)
            .obj()
            .one(doc_id)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))
    }

    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<()> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::PROGRESS)
            .document_id(ProgressRecord::doc_id(&record.user_id, &record.entity_id))
            .object(record)
            .execute()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn upsert_stats(&self, stats: &UserStats) -> Result<()> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::USER_STATS)
            .document_id(&stats.user_id)
            .object(stats)
            .execute()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(())
    }
}

impl ProgressStore for FirestoreStore {
    // ─── Progress Records ────────────────────────────────────────

    async fn get_progress(
        &self,
        user_id: &str,
        entity_id: &str,
    ) -> Result<Option<ProgressRecord>> {
        self.get_progress_by_doc_id(&ProgressRecord::doc_id(user_id, entity_id))
            .await
    }

    async fn get_or_create_progress(
        &self,
        user_id: &str,
        entity_id: &str,
        kind: EntityKind,
        total_units: u32,
    ) -> Result<ProgressRecord> {
        if let Some(existing) = self.get_progress(user_id, entity_id).await? {
            return Ok(existing);
        }

        // Concurrent creators write identical defaults under the same
        // deterministic document id, so both converge on one record.
        let record = ProgressRecord::new(
            user_id,
            entity_id,
            kind,
            total_units,
            &crate::time_utils::now_rfc3339(),
        );
        self.upsert_progress(&record).await?;

        tracing::debug!(user_id, entity_id, "Created zero-progress record");
        Ok(record)
    }

    async fn save_progress(&self, record: &ProgressRecord) -> Result<()> {
        self.upsert_progress(record).await
    }

    async fn complete_progress(&self, record: &ProgressRecord) -> Result<()> {
        let doc_id = ProgressRecord::doc_id(&record.user_id, &record.entity_id);

        let mut transaction = self.client.begin_transaction().await.map_err(|e| {
            Error::StorageUnavailable(format!("Failed to begin transaction: {}", e))
        })?;

        // Read the current record within the transaction; this registers
        // the document for conflict detection.
        let current: Option<ProgressRecord> = self
            .client
            .fluent()
            .select()
            .by_id_in(collections::PROGRESS)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| {
                Error::StorageUnavailable(format!("Failed to read record in transaction: {}", e))
            })?;

        // Only transition if currently not completed: the loser of a
        // cross-device race must not re-claim the reward.
        if current.as_ref().is_some_and(|r| r.completed) {
            let _ = transaction.rollback().await;
            return Err(Error::LostRace);
        }

        self.client
            .fluent()
            .update()
            .in_col(collections::PROGRESS)
            .document_id(&doc_id)
            .object(record)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                Error::StorageUnavailable(format!("Failed to add record to transaction: {}", e))
            })?;

        if let Err(e) = transaction.commit().await {
            // A failed conditional commit usually means another writer got
            // there first; a post-write read distinguishes the lost race
            // from a genuine outage.
            if let Ok(Some(current)) = self.get_progress_by_doc_id(&doc_id).await {
                if current.completed {
                    return Err(Error::LostRace);
                }
            }
            return Err(Error::StorageUnavailable(format!(
                "Transaction commit failed: {}",
                e
            )));
        }

        tracing::info!(
            user_id = %record.user_id,
            entity_id = %record.entity_id,
            "Completion transition committed"
        );
        Ok(())
    }

    // ─── User Stats ──────────────────────────────────────────────

    async fn get_stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USER_STATS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))
    }

    async fn init_stats(&self, user_id: &str, now: &str) -> Result<UserStats> {
        if let Some(existing) = self.get_stats(user_id).await? {
            return Ok(existing);
        }

        let stats = UserStats::new(user_id, now);
        self.upsert_stats(&stats).await?;
        self.append_activity(&ActivityLogEntry::account_created(user_id, now))
            .await?;

        tracing::info!(user_id, "Stats document created");
        Ok(stats)
    }

    async fn commit_award(
        &self,
        user_id: &str,
        award: &XpAward,
        curve: &LevelCurve,
        now: &str,
    ) -> Result<Option<AwardOutcome>> {
        let mut transaction = self.client.begin_transaction().await.map_err(|e| {
            Error::StorageUnavailable(format!("Failed to begin transaction: {}", e))
        })?;

        // 1. Read current stats within the transaction.
        let current: Option<UserStats> = self
            .client
            .fluent()
            .select()
            .by_id_in(collections::USER_STATS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| {
                Error::StorageUnavailable(format!("Failed to read stats in transaction: {}", e))
            })?;

        // Stats are created at account sign-up; a missing document is a
        // programmer error, not a retry case.
        let Some(mut stats) = current else {
            let _ = transaction.rollback().await;
            return Err(Error::NotFound(format!("user_stats/{}", user_id)));
        };

        // 2. Witness check and aggregate mutation, in memory.
        let Some(outcome) = stats.record_award(award, curve, now) else {
            tracing::debug!(user_id, "Award already recorded (idempotent skip)");
            let _ = transaction.rollback().await;
            return Ok(None);
        };

        // 3. Add the stats write to the transaction.
        self.client
            .fluent()
            .update()
            .in_col(collections::USER_STATS)
            .document_id(user_id)
            .object(&stats)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                Error::StorageUnavailable(format!("Failed to add stats to transaction: {}", e))
            })?;

        // 4. Add the audit entry to the transaction. Completion entries use
        // a deterministic id, so even a replayed commit cannot duplicate.
        let entry = award.entry(user_id, outcome.previous_xp, outcome.new_xp, now);
        self.client
            .fluent()
            .update()
            .in_col(collections::ACTIVITY_LOG)
            .document_id(entry.doc_id())
            .object(&entry)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                Error::StorageUnavailable(format!("Failed to add entry to transaction: {}", e))
            })?;

        // 5. Commit atomically. On contention Firestore rejects the commit;
        // the caller retries and the witness decides idempotency.
        transaction.commit().await.map_err(|e| {
            Error::StorageUnavailable(format!("Transaction commit failed: {}", e))
        })?;

        tracing::info!(
            user_id,
            xp_gained = outcome.xp_gained,
            new_xp = outcome.new_xp,
            "XP award committed"
        );
        Ok(Some(outcome))
    }

    async fn top_stats(&self, limit: u32) -> Result<Vec<UserStats>> {
        self.client
            .fluent()
            .select()
            .from(collections::USER_STATS)
            .order_by([("xp", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))
    }

    // ─── Activity Log ────────────────────────────────────────────

    async fn append_activity(&self, entry: &ActivityLogEntry) -> Result<()> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::ACTIVITY_LOG)
            .document_id(entry.doc_id())
            .object(entry)
            .execute()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn activities_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>> {
        let user_id = user_id.to_string();
        self.client
            .fluent()
            .select()
            .from(collections::ACTIVITY_LOG)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))
    }

    // ─── Achievements ────────────────────────────────────────────

    async fn grant_achievement(&self, achievement: &Achievement) -> Result<bool> {
        let doc_id = Achievement::doc_id(&achievement.user_id, achievement.kind);

        let existing: Option<Achievement> = self
            .client
            .fluent()
            .select()
            .by_id_in(collections::ACHIEVEMENTS)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        if existing.is_some() {
            return Ok(false);
        }

        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::ACHIEVEMENTS)
            .document_id(&doc_id)
            .object(achievement)
            .execute()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        Ok(true)
    }

    async fn achievements_for_user(&self, user_id: &str) -> Result<Vec<Achievement>> {
        let user_id = user_id.to_string();
        self.client
            .fluent()
            .select()
            .from(collections::ACHIEVEMENTS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))
    }

    async fn increment_achievement_shares(
        &self,
        user_id: &str,
        kind: AchievementKind,
    ) -> Result<u64> {
        let doc_id = Achievement::doc_id(user_id, kind);

        let mut transaction = self.client.begin_transaction().await.map_err(|e| {
            Error::StorageUnavailable(format!("Failed to begin transaction: {}", e))
        })?;

        let current: Option<Achievement> = self
            .client
            .fluent()
            .select()
            .by_id_in(collections::ACHIEVEMENTS)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        let Some(mut achievement) = current else {
            let _ = transaction.rollback().await;
            return Err(Error::NotFound(format!("achievements/{}", doc_id)));
        };

        achievement.share_count += 1;

        self.client
            .fluent()
            .update()
            .in_col(collections::ACHIEVEMENTS)
            .document_id(&doc_id)
            .object(&achievement)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                Error::StorageUnavailable(format!("Failed to add share count to transaction: {}", e))
            })?;

        transaction.commit().await.map_err(|e| {
            Error::StorageUnavailable(format!("Transaction commit failed: {}", e))
        })?;

        Ok(achievement.share_count)
    }

    // ─── Subscriptions ───────────────────────────────────────────

    fn watch_progress(&self, user_id: &str, entity_id: &str) -> BoxStream<'static, ProgressRecord> {
        let store = self.clone();
        let doc_id = ProgressRecord::doc_id(user_id, entity_id);

        // Polling snapshot stream: emits the current record, then each
        // observed change. Restartable by calling watch_progress again.
        futures_util::stream::unfold(
            (store, doc_id, None::<String>),
            |(store, doc_id, mut last_seen)| async move {
                loop {
                    if let Ok(Some(record)) = store.get_progress_by_doc_id(&doc_id).await {
                        if last_seen.as_deref() != Some(record.last_updated.as_str()) {
                            last_seen = Some(record.last_updated.clone());
                            return Some((record, (store, doc_id, last_seen)));
                        }
                    }
                    tokio::time::sleep(WATCH_POLL_INTERVAL).await;
                }
            },
        )
        .boxed()
    }

    fn watch_stats(&self, user_id: &str) -> BoxStream<'static, UserStats> {
        let store = self.clone();
        let user_id = user_id.to_string();

        futures_util::stream::unfold(
            (store, user_id, None::<String>),
            |(store, user_id, mut last_seen)| async move {
                loop {
                    if let Ok(Some(stats)) = store.get_stats(&user_id).await {
                        if last_seen.as_deref() != Some(stats.updated_at.as_str()) {
                            last_seen = Some(stats.updated_at.clone());
                            return Some((stats, (store, user_id, last_seen)));
                        }
                    }
                    tokio::time::sleep(WATCH_POLL_INTERVAL).await;
                }
            },
        )
        .boxed()
    }
}
