//! Spotify Web API response types
//!
//! Data structures for (de)serializing the subset of the Web API the
//! connector touches.

use bridge_traits::playlist::{RemoteArtist, RemotePlaylist, RemoteTrack};
use serde::{Deserialize, Serialize};

/// Paging object wrapping playlist items
///
/// See: https://developer.spotify.com/documentation/web-api/reference/get-playlists-tracks
#[derive(Debug, Deserialize)]
pub struct PlaylistTracksResponse {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,

    pub total: u32,

    #[serde(default)]
    pub limit: u32,

    #[serde(default)]
    pub offset: u32,

    /// URL of the next page, if any
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistItem {
    /// Null when the track has been removed from the catalog
    #[serde(default)]
    pub track: Option<SpotifyTrack>,

    #[serde(default)]
    pub is_local: bool,
}

/// Full track object
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    /// Null for local files
    pub id: Option<String>,
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub popularity: u8,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub album: Option<SimplifiedAlbum>,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedAlbum {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedArtist {
    pub id: Option<String>,
}

/// Full artist object
#[derive(Debug, Deserialize)]
pub struct SpotifyArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// `GET /artists` response. Unknown ids come back as `null` entries.
#[derive(Debug, Deserialize)]
pub struct ArtistsResponse {
    #[serde(default)]
    pub artists: Vec<Option<SpotifyArtist>>,
}

/// `POST /me/playlists` body
#[derive(Debug, Serialize)]
pub struct CreatePlaylistRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub public: bool,
}

/// Simplified playlist object returned on creation
#[derive(Debug, Deserialize)]
pub struct SpotifyPlaylist {
    pub id: String,
    pub name: String,
}

/// `POST /playlists/{id}/tracks` body
#[derive(Debug, Serialize)]
pub struct AddTracksRequest<'a> {
    pub uris: &'a [String],
}

/// `POST /playlists/{id}/tracks` response
#[derive(Debug, Deserialize)]
pub struct SnapshotResponse {
    pub snapshot_id: String,
}

impl PlaylistItem {
    /// Playable catalog track, or `None` for removed and local entries.
    pub fn into_remote_track(self) -> Option<RemoteTrack> {
        if self.is_local {
            return None;
        }
        let track = self.track?;
        let id = track.id?;
        Some(RemoteTrack {
            id,
            name: track.name,
            uri: track.uri,
            duration_ms: track.duration_ms,
            popularity: track.popularity.min(100),
            explicit: track.explicit,
            album_id: track.album.and_then(|album| album.id),
            artist_ids: track.artists.into_iter().filter_map(|a| a.id).collect(),
        })
    }
}

impl From<SpotifyArtist> for RemoteArtist {
    fn from(artist: SpotifyArtist) -> Self {
        RemoteArtist {
            id: artist.id,
            name: artist.name,
            genres: artist.genres,
        }
    }
}

impl From<SpotifyPlaylist> for RemotePlaylist {
    fn from(playlist: SpotifyPlaylist) -> Self {
        RemotePlaylist {
            id: playlist.id,
            name: playlist.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_playlist_page() {
        let body = r#"{
            "items": [
                {
                    "is_local": false,
                    "track": {
                        "id": "t1",
                        "name": "Song",
                        "uri": "spotify:track:t1",
                        "duration_ms": 215000,
                        "popularity": 73,
                        "explicit": true,
                        "album": { "id": "al1" },
                        "artists": [{ "id": "ar1" }, { "id": "ar2" }]
                    }
                },
                { "is_local": false, "track": null },
                {
                    "is_local": true,
                    "track": { "id": null, "name": "Home recording", "uri": "spotify:local:x" }
                }
            ],
            "total": 3,
            "limit": 100,
            "offset": 0,
            "next": null
        }"#;

        let page: PlaylistTracksResponse = serde_json::from_str(body).unwrap();
        assert_eq!(page.total, 3);

        let tracks: Vec<RemoteTrack> = page
            .items
            .into_iter()
            .filter_map(PlaylistItem::into_remote_track)
            .collect();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].uri, "spotify:track:t1");
        assert_eq!(tracks[0].popularity, 73);
        assert!(tracks[0].explicit);
        assert_eq!(tracks[0].album_id.as_deref(), Some("al1"));
        assert_eq!(tracks[0].artist_ids, vec!["ar1", "ar2"]);
    }

    #[test]
    fn test_parse_artists_with_null_entry() {
        let body = r#"{
            "artists": [
                { "id": "ar1", "name": "Band", "genres": ["indie rock"] },
                null
            ]
        }"#;

        let response: ArtistsResponse = serde_json::from_str(body).unwrap();
        let artists: Vec<RemoteArtist> = response
            .artists
            .into_iter()
            .flatten()
            .map(RemoteArtist::from)
            .collect();

        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].genres, vec!["indie rock"]);
    }

    #[test]
    fn test_create_request_shape() {
        let body = serde_json::to_value(CreatePlaylistRequest {
            name: "[Mix] > Hits",
            description: "Managed",
            public: false,
        })
        .unwrap();

        assert_eq!(body["name"], "[Mix] > Hits");
        assert_eq!(body["public"], false);
    }
}
