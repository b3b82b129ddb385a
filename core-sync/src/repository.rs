//! # Sync Event Repository
//!
//! Provides database persistence for sync events.
//!
//! ## Overview
//!
//! This repository handles the sync history:
//! - Creating in-progress events (at most one per base playlist)
//! - Writing counters and terminal states back
//! - Ownership-scoped lookups and history retrieval

use crate::{Result, SyncError, SyncEvent, SyncEventId, SyncStatus};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository trait for sync event persistence
#[async_trait]
pub trait SyncEventRepository: Send + Sync {
    /// Whether the base playlist has an in-progress sync event owned by `user_id`
    async fn has_in_progress(&self, user_id: &str, base_playlist_id: &str) -> Result<bool>;

    /// Insert a new sync event
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SyncInProgress`] if another in-progress event
    /// already exists for the same base playlist.
    async fn insert(&self, event: &SyncEvent) -> Result<()>;

    /// Overwrite the mutable fields of an existing event
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::EventNotFound`] if the event doesn't exist
    async fn update(&self, event: &SyncEvent) -> Result<()>;

    async fn find_by_id(&self, id: &SyncEventId, user_id: &str) -> Result<Option<SyncEvent>>;

    /// Sync history of a base playlist, most recent first
    async fn get_history(
        &self,
        user_id: &str,
        base_playlist_id: &str,
        limit: u32,
    ) -> Result<Vec<SyncEvent>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of SyncEventRepository
pub struct SqliteSyncEventRepository {
    pool: SqlitePool,
}

impl SqliteSyncEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a sync event
#[derive(Debug, FromRow)]
struct SyncEventRow {
    id: String,
    user_id: String,
    base_playlist_id: String,
    child_playlist_ids: String,
    status: String,
    started_at: i64,
    completed_at: Option<i64>,
    tracks_processed: i64,
    total_api_requests: i64,
    error_message: Option<String>,
    created_at: i64,
}

impl TryFrom<SyncEventRow> for SyncEvent {
    type Error = SyncError;

    fn try_from(row: SyncEventRow) -> Result<Self> {
        let child_playlist_ids: Vec<String> = serde_json::from_str(&row.child_playlist_ids)
            .map_err(|e| {
                SyncError::Persistence(format!(
                    "Invalid child_playlist_ids for sync event {}: {}",
                    row.id, e
                ))
            })?;

        Ok(SyncEvent {
            id: SyncEventId::from_string(&row.id)?,
            user_id: row.user_id,
            base_playlist_id: row.base_playlist_id,
            child_playlist_ids,
            status: row.status.parse()?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            tracks_processed: row.tracks_processed.max(0) as u64,
            total_api_requests: row.total_api_requests.max(0) as u64,
            error_message: row.error_message,
            created_at: row.created_at,
        })
    }
}

fn encode_child_ids(event: &SyncEvent) -> Result<String> {
    serde_json::to_string(&event.child_playlist_ids)
        .map_err(|e| SyncError::Persistence(e.to_string()))
}

#[async_trait]
impl SyncEventRepository for SqliteSyncEventRepository {
    async fn has_in_progress(&self, user_id: &str, base_playlist_id: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM sync_events
            WHERE user_id = ? AND base_playlist_id = ? AND status = ?
            "#,
        )
        .bind(user_id)
        .bind(base_playlist_id)
        .bind(SyncStatus::InProgress.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SyncError::Persistence(e.to_string()))?;

        Ok(count > 0)
    }

    async fn insert(&self, event: &SyncEvent) -> Result<()> {
        let child_ids = encode_child_ids(event)?;

        sqlx::query(
            r#"
            INSERT INTO sync_events (
                id, user_id, base_playlist_id, child_playlist_ids, status,
                started_at, completed_at, tracks_processed, total_api_requests,
                error_message, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.as_str())
        .bind(&event.user_id)
        .bind(&event.base_playlist_id)
        .bind(child_ids)
        .bind(event.status.as_str())
        .bind(event.started_at)
        .bind(event.completed_at)
        .bind(event.tracks_processed as i64)
        .bind(event.total_api_requests as i64)
        .bind(&event.error_message)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                SyncError::SyncInProgress {
                    base_playlist_id: event.base_playlist_id.clone(),
                }
            }
            other => SyncError::Persistence(other.to_string()),
        })?;

        Ok(())
    }

    async fn update(&self, event: &SyncEvent) -> Result<()> {
        let child_ids = encode_child_ids(event)?;

        let result = sqlx::query(
            r#"
            UPDATE sync_events SET
                child_playlist_ids = ?,
                status = ?,
                completed_at = ?,
                tracks_processed = ?,
                total_api_requests = ?,
                error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(child_ids)
        .bind(event.status.as_str())
        .bind(event.completed_at)
        .bind(event.tracks_processed as i64)
        .bind(event.total_api_requests as i64)
        .bind(&event.error_message)
        .bind(event.id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Persistence(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(SyncError::EventNotFound {
                event_id: event.id.to_string(),
            });
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &SyncEventId, user_id: &str) -> Result<Option<SyncEvent>> {
        let row = sqlx::query_as::<_, SyncEventRow>(
            r#"
            SELECT id, user_id, base_playlist_id, child_playlist_ids, status,
                   started_at, completed_at, tracks_processed, total_api_requests,
                   error_message, created_at
            FROM sync_events
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(id.as_str())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::Persistence(e.to_string()))?;

        row.map(SyncEvent::try_from).transpose()
    }

    async fn get_history(
        &self,
        user_id: &str,
        base_playlist_id: &str,
        limit: u32,
    ) -> Result<Vec<SyncEvent>> {
        let rows = sqlx::query_as::<_, SyncEventRow>(
            r#"
            SELECT id, user_id, base_playlist_id, child_playlist_ids, status,
                   started_at, completed_at, tracks_processed, total_api_requests,
                   error_message, created_at
            FROM sync_events
            WHERE user_id = ? AND base_playlist_id = ?
            ORDER BY started_at DESC, created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(base_playlist_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::Persistence(e.to_string()))?;

        rows.into_iter()
            .map(SyncEvent::try_from)
            .collect::<Result<Vec<_>>>()
    }
}

// ============================================================================
// Tests
// ============================================================================
