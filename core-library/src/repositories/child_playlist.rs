//! Child playlist repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{ChildPlaylist, ChildPlaylistRow};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Child playlist repository interface.
///
/// Listing order is stable (creation time, then id) so sync runs process
/// siblings in the same order every time.
#[async_trait]
pub trait ChildPlaylistRepository: Send + Sync {
    async fn find_by_id(&self, id: &str, user_id: &str) -> Result<Option<ChildPlaylist>>;

    async fn insert(&self, playlist: &ChildPlaylist) -> Result<()>;

    /// # Errors
    /// [`LibraryError::NotFound`] when no playlist with this id belongs to the owner.
    async fn update(&self, playlist: &ChildPlaylist) -> Result<()>;

    /// All children of a base playlist, active or not.
    async fn list_by_base(&self, base_playlist_id: &str, user_id: &str)
        -> Result<Vec<ChildPlaylist>>;

    /// Active children of a base playlist.
    ///
    /// # Errors
    /// [`LibraryError::InvalidFilterRules`] when a child's stored rules cannot be read.
    async fn list_active_children(
        &self,
        base_playlist_id: &str,
        user_id: &str,
    ) -> Result<Vec<ChildPlaylist>>;

    /// Point a child at a new remote playlist and return the updated record.
    async fn set_remote_playlist_id(
        &self,
        child_id: &str,
        user_id: &str,
        remote_playlist_id: &str,
    ) -> Result<ChildPlaylist>;
}

/// SQLite implementation of ChildPlaylistRepository
pub struct SqliteChildPlaylistRepository {
    pool: SqlitePool,
}

impl SqliteChildPlaylistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_children(
        &self,
        sql: &str,
        base_playlist_id: &str,
        user_id: &str,
    ) -> Result<Vec<ChildPlaylist>> {
        query_as::<_, ChildPlaylistRow>(sql)
            .bind(base_playlist_id)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ChildPlaylist::try_from)
            .collect()
    }
}

fn invalid(message: String) -> LibraryError {
    LibraryError::InvalidInput {
        field: "ChildPlaylist".to_string(),
        message,
    }
}

#[async_trait]
impl ChildPlaylistRepository for SqliteChildPlaylistRepository {
    async fn find_by_id(&self, id: &str, user_id: &str) -> Result<Option<ChildPlaylist>> {
        query_as::<_, ChildPlaylistRow>(
            "SELECT * FROM child_playlists WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(ChildPlaylist::try_from)
        .transpose()
    }

    async fn insert(&self, playlist: &ChildPlaylist) -> Result<()> {
        playlist.validate().map_err(invalid)?;
        let filter_rules = playlist.filter_rules_json()?;

        query(
            r#"
            INSERT INTO child_playlists (
                id, user_id, base_playlist_id, name, description, remote_playlist_id,
                filter_rules, is_active, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&playlist.id)
        .bind(&playlist.user_id)
        .bind(&playlist.base_playlist_id)
        .bind(&playlist.name)
        .bind(&playlist.description)
        .bind(&playlist.remote_playlist_id)
        .bind(filter_rules)
        .bind(playlist.is_active)
        .bind(playlist.created_at)
        .bind(playlist.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, playlist: &ChildPlaylist) -> Result<()> {
        playlist.validate().map_err(invalid)?;
        let filter_rules = playlist.filter_rules_json()?;

        let result = query(
            r#"
            UPDATE child_playlists
            SET name = ?, description = ?, remote_playlist_id = ?, filter_rules = ?,
                is_active = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&playlist.name)
        .bind(&playlist.description)
        .bind(&playlist.remote_playlist_id)
        .bind(filter_rules)
        .bind(playlist.is_active)
        .bind(playlist.updated_at)
        .bind(&playlist.id)
        .bind(&playlist.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "ChildPlaylist".to_string(),
                id: playlist.id.clone(),
            });
        }

        Ok(())
    }

    async fn list_by_base(
        &self,
        base_playlist_id: &str,
        user_id: &str,
    ) -> Result<Vec<ChildPlaylist>> {
        self.fetch_children(
            r#"
            SELECT * FROM child_playlists
            WHERE base_playlist_id = ? AND user_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
            base_playlist_id,
            user_id,
        )
        .await
    }

    async fn list_active_children(
        &self,
        base_playlist_id: &str,
        user_id: &str,
    ) -> Result<Vec<ChildPlaylist>> {
        self.fetch_children(
            r#"
            SELECT * FROM child_playlists
            WHERE base_playlist_id = ? AND user_id = ? AND is_active = 1
            ORDER BY created_at ASC, id ASC
            "#,
            base_playlist_id,
            user_id,
        )
        .await
    }

    async fn set_remote_playlist_id(
        &self,
        child_id: &str,
        user_id: &str,
        remote_playlist_id: &str,
    ) -> Result<ChildPlaylist> {
        let result = query(
            r#"
            UPDATE child_playlists
            SET remote_playlist_id = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(remote_playlist_id)
        .bind(chrono::Utc::now().timestamp())
        .bind(child_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "ChildPlaylist".to_string(),
                id: child_id.to_string(),
            });
        }

        self.find_by_id(child_id, user_id)
            .await?
            .ok_or_else(|| LibraryError::NotFound {
                entity_type: "ChildPlaylist".to_string(),
                id: child_id.to_string(),
            })
    }
}
