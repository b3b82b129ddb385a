//! # Repository Pattern Implementation
//!
//! Repository traits for the record store plus their SQLite implementations.
//!
//! ## Architecture
//!
//! - Traits define the interface the sync engine consumes
//! - SQLite implementations use sqlx for async database access
//! - Every lookup takes the owning user id; rows owned by someone else are
//!   invisible
//!
//! ## Available Repositories
//!
//! - `BasePlaylistRepository` - playlists whose tracks are redistributed
//! - `ChildPlaylistRepository` - filtered playlists rebuilt by each sync

pub mod base_playlist;
pub mod child_playlist;

pub use base_playlist::{BasePlaylistRepository, SqliteBasePlaylistRepository};
pub use child_playlist::{ChildPlaylistRepository, SqliteChildPlaylistRepository};
