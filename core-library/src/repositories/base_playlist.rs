//! Base playlist repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::BasePlaylist;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Base playlist repository interface.
///
/// Lookups are scoped by owner: a playlist that exists but belongs to another
/// user is reported as absent.
#[async_trait]
pub trait BasePlaylistRepository: Send + Sync {
    async fn find_by_id(&self, id: &str, user_id: &str) -> Result<Option<BasePlaylist>>;

    /// # Errors
    /// Fails on validation errors or when the id is already taken.
    async fn insert(&self, playlist: &BasePlaylist) -> Result<()>;

    /// # Errors
    /// [`LibraryError::NotFound`] when no playlist with this id belongs to the owner.
    async fn update(&self, playlist: &BasePlaylist) -> Result<()>;

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<BasePlaylist>>;
}

/// SQLite implementation of BasePlaylistRepository
pub struct SqliteBasePlaylistRepository {
    pool: SqlitePool,
}

impl SqliteBasePlaylistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn invalid(message: String) -> LibraryError {
    LibraryError::InvalidInput {
        field: "BasePlaylist".to_string(),
        message,
    }
}

#[async_trait]
impl BasePlaylistRepository for SqliteBasePlaylistRepository {
    async fn find_by_id(&self, id: &str, user_id: &str) -> Result<Option<BasePlaylist>> {
        let playlist = query_as::<_, BasePlaylist>(
            "SELECT * FROM base_playlists WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(playlist)
    }

    async fn insert(&self, playlist: &BasePlaylist) -> Result<()> {
        playlist.validate().map_err(invalid)?;

        query(
            r#"
            INSERT INTO base_playlists (id, user_id, name, remote_playlist_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&playlist.id)
        .bind(&playlist.user_id)
        .bind(&playlist.name)
        .bind(&playlist.remote_playlist_id)
        .bind(playlist.created_at)
        .bind(playlist.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, playlist: &BasePlaylist) -> Result<()> {
        playlist.validate().map_err(invalid)?;

        let result = query(
            r#"
            UPDATE base_playlists
            SET name = ?, remote_playlist_id = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&playlist.name)
        .bind(&playlist.remote_playlist_id)
        .bind(playlist.updated_at)
        .bind(&playlist.id)
        .bind(&playlist.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "BasePlaylist".to_string(),
                id: playlist.id.clone(),
            });
        }

        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<BasePlaylist>> {
        let playlists = query_as::<_, BasePlaylist>(
            "SELECT * FROM base_playlists WHERE user_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(playlists)
    }
}
