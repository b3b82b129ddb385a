//! # Playlist Library Module
//!
//! Owns the record store: base playlists, child playlists and the schema the
//! sync history lives in.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite connection pool and embedded migrations ([`db`])
//! - Base and child playlist models ([`models`])
//! - The versioned filter rule schema stored on child playlists ([`filter`])
//! - Ownership-scoped repositories ([`repositories`])

pub mod db;
pub mod error;
pub mod filter;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use filter::{FilterRuleSet, Predicate, FILTER_SCHEMA_VERSION};
pub use models::{BasePlaylist, ChildPlaylist};
pub use repositories::{
    BasePlaylistRepository, ChildPlaylistRepository, SqliteBasePlaylistRepository,
    SqliteChildPlaylistRepository,
};
