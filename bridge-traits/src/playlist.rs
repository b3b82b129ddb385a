//! Remote Playlist Service
//!
//! Contract for the third-party music service that hosts the playlists being
//! synchronized. The sync engine only ever talks to the service through this
//! trait; `provider-spotify` ships the Spotify Web API implementation.
//!
//! ## Limits
//!
//! Callers are responsible for chunking:
//! - at most [`MAX_PAGE_SIZE`] tracks per listing page
//! - at most [`MAX_TRACKS_PER_ADD`] URIs per add call
//! - at most [`MAX_ARTISTS_PER_LOOKUP`] ids per artist lookup

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Largest page the listing endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Largest number of URIs accepted by a single add call.
pub const MAX_TRACKS_PER_ADD: usize = 100;

/// Largest number of artist ids accepted by a single lookup.
pub const MAX_ARTISTS_PER_LOOKUP: usize = 50;

/// Snapshot of a track as listed in a remote playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTrack {
    pub id: String,
    pub name: String,
    /// Playable URI, e.g. `spotify:track:4uLU6hMCjMI75M1A2tKUQC`
    pub uri: String,
    pub duration_ms: u64,
    /// 0-100
    pub popularity: u8,
    pub explicit: bool,
    pub album_id: Option<String>,
    /// Ordered as reported by the service
    pub artist_ids: Vec<String>,
}

/// One page of a playlist listing.
///
/// `items` may be shorter than `listed` when the service returned entries
/// that are not playable catalog tracks (local files, removed tracks).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackPage {
    pub items: Vec<RemoteTrack>,
    /// Raw entries the service returned for this page, playable or not
    pub listed: u32,
    /// Total number of entries in the playlist as reported by the service
    pub total: u32,
}

impl TrackPage {
    /// Page where every listed entry is playable.
    pub fn new(items: Vec<RemoteTrack>, total: u32) -> Self {
        let listed = items.len() as u32;
        Self {
            items,
            listed,
            total,
        }
    }

    /// Page of `listed` raw entries of which only `items` survived.
    pub fn with_skipped(items: Vec<RemoteTrack>, listed: u32, total: u32) -> Self {
        let listed = listed.max(items.len() as u32);
        Self {
            items,
            listed,
            total,
        }
    }
}

/// A playlist created on the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePlaylist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteArtist {
    pub id: String,
    pub name: String,
    pub genres: Vec<String>,
}

/// Remote playlist service operations.
///
/// Every method is a single remote call. Failures are returned as-is and are
/// never retried.
#[async_trait]
pub trait RemotePlaylistService: Send + Sync {
    /// List one page of a playlist's tracks.
    async fn list_playlist_tracks(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<TrackPage>;

    /// Remove a playlist from the user's library.
    async fn delete_playlist(&self, playlist_id: &str) -> Result<()>;

    async fn create_playlist(
        &self,
        name: &str,
        description: &str,
        is_public: bool,
    ) -> Result<RemotePlaylist>;

    /// Append tracks to a playlist. `uris` must hold at most
    /// [`MAX_TRACKS_PER_ADD`] entries.
    async fn add_tracks_to_playlist(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    /// Look up artists by id. `artist_ids` must hold at most
    /// [`MAX_ARTISTS_PER_LOOKUP`] entries.
    async fn get_artists(&self, artist_ids: &[String]) -> Result<Vec<RemoteArtist>>;
}
