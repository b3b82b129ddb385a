//! # Track Aggregator
//!
//! Pulls the complete, ordered track list of a base playlist from the remote
//! service by walking its pages, and counts every remote call it attempts.
//!
//! The offset advances by the raw number of entries the service listed, so
//! entries that are not playable tracks still move paging forward. Paging
//! stops when the service lists no entries or the offset reaches the reported
//! total. A failed page aborts the whole aggregation: no partial track set is
//! returned, only the counters.

use crate::{Result, SyncError};
use bridge_traits::playlist::{
    RemotePlaylistService, RemoteTrack, MAX_ARTISTS_PER_LOOKUP, MAX_PAGE_SIZE,
};
use core_library::BasePlaylistRepository;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Full track list of a remote playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistTrackSet {
    /// Remote playlist the tracks were read from
    pub playlist_id: String,
    /// In remote order
    pub tracks: Vec<RemoteTrack>,
    /// Remote calls attempted to build this set
    pub api_calls: u64,
    /// Artist id to genres; only filled by [`TrackAggregator::resolve_genres`]
    pub artist_genres: HashMap<String, Vec<String>>,
}

impl PlaylistTrackSet {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Union of the genres of a track's artists, in artist order.
    pub fn genres_of<'a>(&'a self, track: &'a RemoteTrack) -> impl Iterator<Item = &'a str> + 'a {
        track
            .artist_ids
            .iter()
            .filter_map(|artist_id| self.artist_genres.get(artist_id))
            .flatten()
            .map(String::as_str)
    }

    /// Distinct artist ids, in first-seen order.
    pub fn artist_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.tracks
            .iter()
            .flat_map(|t| t.artist_ids.iter())
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }
}

/// Aggregation aborted; carries what was spent before the failure.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct AggregationFailure {
    /// Remote calls attempted, including the one that failed
    pub api_calls: u64,
    /// Tracks received before the failure
    pub tracks_fetched: u64,
    #[source]
    pub error: SyncError,
}

impl AggregationFailure {
    fn new(error: SyncError, api_calls: u64, tracks_fetched: usize) -> Self {
        Self {
            api_calls,
            tracks_fetched: tracks_fetched as u64,
            error,
        }
    }
}

/// Fail with [`SyncError::Cancelled`] if `cancel` already fired.
///
/// Checked before a remote call is counted, so a call that never starts is
/// never billed to the sync.
pub(crate) fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    Ok(())
}

/// Await `future` unless `cancel` fires first.
pub(crate) async fn until_cancelled<F, T>(cancel: &CancellationToken, future: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        output = future => Ok(output),
    }
}

pub struct TrackAggregator {
    service: Arc<dyn RemotePlaylistService>,
    base_playlists: Arc<dyn BasePlaylistRepository>,
    page_size: u32,
}

impl TrackAggregator {
    pub fn new(
        service: Arc<dyn RemotePlaylistService>,
        base_playlists: Arc<dyn BasePlaylistRepository>,
    ) -> Self {
        Self {
            service,
            base_playlists,
            page_size: MAX_PAGE_SIZE,
        }
    }

    /// Tracks requested per page, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Aggregate every track of a base playlist owned by `user_id`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::BasePlaylistNotFound`] if the playlist doesn't exist for this owner
    /// - [`SyncError::Aggregation`] if any page request fails
    /// - [`SyncError::Cancelled`] if `cancel` fires while a page is in flight
    #[instrument(skip(self, cancel))]
    pub async fn aggregate(
        &self,
        user_id: &str,
        base_playlist_id: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<PlaylistTrackSet, AggregationFailure> {
        let base = self
            .base_playlists
            .find_by_id(base_playlist_id, user_id)
            .await
            .map_err(|e| AggregationFailure::new(e.into(), 0, 0))?
            .ok_or_else(|| {
                AggregationFailure::new(
                    SyncError::BasePlaylistNotFound {
                        base_playlist_id: base_playlist_id.to_string(),
                    },
                    0,
                    0,
                )
            })?;

        self.aggregate_remote(&base.remote_playlist_id, cancel).await
    }

    /// Walk every page of a remote playlist.
    pub async fn aggregate_remote(
        &self,
        remote_playlist_id: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<PlaylistTrackSet, AggregationFailure> {
        let mut set = PlaylistTrackSet {
            playlist_id: remote_playlist_id.to_string(),
            ..PlaylistTrackSet::default()
        };
        let mut offset: u32 = 0;

        loop {
            ensure_not_cancelled(cancel)
                .map_err(|e| AggregationFailure::new(e, set.api_calls, set.len()))?;
            set.api_calls += 1;
            debug!(offset, page_size = self.page_size, "Fetching playlist page");

            let page = until_cancelled(
                cancel,
                self.service
                    .list_playlist_tracks(remote_playlist_id, self.page_size, offset),
            )
            .await
            .map_err(|e| AggregationFailure::new(e, set.api_calls, set.len()))?
            .map_err(|e| {
                warn!(offset, error = %e, "Playlist page request failed");
                AggregationFailure::new(
                    SyncError::Aggregation {
                        playlist_id: remote_playlist_id.to_string(),
                        offset,
                        message: e.to_string(),
                    },
                    set.api_calls,
                    set.len(),
                )
            })?;

            let listed = page.listed.max(page.items.len() as u32);
            if page.items.len() as u32 != listed {
                debug!(
                    offset,
                    listed,
                    playable = page.items.len(),
                    "Page contained entries that are not playable tracks"
                );
            }
            set.tracks.extend(page.items);

            if listed == 0 {
                break;
            }
            offset = offset.saturating_add(listed);
            if offset >= page.total {
                break;
            }
        }

        info!(
            playlist_id = remote_playlist_id,
            tracks = set.len(),
            api_calls = set.api_calls,
            "Playlist aggregated"
        );
        Ok(set)
    }

    /// Fill `set.artist_genres` for every artist in the set.
    ///
    /// One remote call per batch of at most [`MAX_ARTISTS_PER_LOOKUP`] ids;
    /// calls are added to `set.api_calls`.
    #[instrument(skip(self, set, cancel), fields(playlist_id = %set.playlist_id))]
    pub async fn resolve_genres(
        &self,
        set: &mut PlaylistTrackSet,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), AggregationFailure> {
        let artist_ids = set.artist_ids();

        for (batch, ids) in artist_ids.chunks(MAX_ARTISTS_PER_LOOKUP).enumerate() {
            ensure_not_cancelled(cancel)
                .map_err(|e| AggregationFailure::new(e, set.api_calls, set.len()))?;
            set.api_calls += 1;
            debug!(batch, artists = ids.len(), "Resolving artist genres");

            let artists = until_cancelled(cancel, self.service.get_artists(ids))
                .await
                .map_err(|e| AggregationFailure::new(e, set.api_calls, set.len()))?
                .map_err(|e| {
                    AggregationFailure::new(
                        SyncError::Aggregation {
                            playlist_id: set.playlist_id.clone(),
                            offset: 0,
                            message: format!("artist lookup failed: {}", e),
                        },
                        set.api_calls,
                        set.len(),
                    )
                })?;

            for artist in artists {
                set.artist_genres.insert(artist.id, artist.genres);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::playlist::{RemoteArtist, RemotePlaylist, TrackPage};
    use core_library::{BasePlaylist, LibraryError};
    use mockall::mock;

    mock! {
        Service {}

        #[async_trait]
        impl RemotePlaylistService for Service {
            async fn list_playlist_tracks(&self, playlist_id: &str, limit: u32, offset: u32) -> BridgeResult<TrackPage>;
            async fn delete_playlist(&self, playlist_id: &str) -> BridgeResult<()>;
            async fn create_playlist(&self, name: &str, description: &str, is_public: bool) -> BridgeResult<RemotePlaylist>;
            async fn add_tracks_to_playlist(&self, playlist_id: &str, uris: &[String]) -> BridgeResult<()>;
            async fn get_artists(&self, artist_ids: &[String]) -> BridgeResult<Vec<RemoteArtist>>;
        }
    }

    mock! {
        Bases {}

        #[async_trait]
        impl BasePlaylistRepository for Bases {
            async fn find_by_id(&self, id: &str, user_id: &str) -> core_library::Result<Option<BasePlaylist>>;
            async fn insert(&self, playlist: &BasePlaylist) -> core_library::Result<()>;
            async fn update(&self, playlist: &BasePlaylist) -> core_library::Result<()>;
            async fn list_by_user(&self, user_id: &str) -> core_library::Result<Vec<BasePlaylist>>;
        }
    }

    fn track(n: usize, artists: &[&str]) -> RemoteTrack {
        RemoteTrack {
            id: format!("t{}", n),
            name: format!("Track {}", n),
            uri: format!("spotify:track:t{}", n),
            duration_ms: 200_000,
            popularity: 50,
            explicit: false,
            album_id: None,
            artist_ids: artists.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn page(range: std::ops::Range<usize>, total: u32) -> TrackPage {
        TrackPage::new(range.map(|n| track(n, &["a1"])).collect(), total)
    }

    fn bases_with(base: BasePlaylist) -> MockBases {
        let mut bases = MockBases::new();
        bases
            .expect_find_by_id()
            .returning(move |id, user| {
                Ok((id == base.id && user == base.user_id).then(|| base.clone()))
            });
        bases
    }

    #[tokio::test]
    async fn test_aggregates_all_pages_in_order() {
        let base = BasePlaylist::new("user-1", "Everything", "remote-base");
        let mut service = MockService::new();
        service
            .expect_list_playlist_tracks()
            .withf(|id, limit, offset| id == "remote-base" && *limit == 100 && *offset == 0)
            .times(1)
            .returning(|_, _, _| Ok(page(0..100, 250)));
        service
            .expect_list_playlist_tracks()
            .withf(|_, _, offset| *offset == 100)
            .times(1)
            .returning(|_, _, _| Ok(page(100..200, 250)));
        service
            .expect_list_playlist_tracks()
            .withf(|_, _, offset| *offset == 200)
            .times(1)
            .returning(|_, _, _| Ok(page(200..250, 250)));

        let aggregator = TrackAggregator::new(Arc::new(service), Arc::new(bases_with(base.clone())));
        let set = aggregator
            .aggregate("user-1", &base.id, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(set.len(), 250);
        assert_eq!(set.api_calls, 3);
        assert_eq!(set.playlist_id, "remote-base");
        assert_eq!(set.tracks[0].id, "t0");
        assert_eq!(set.tracks[249].id, "t249");
    }

    #[tokio::test]
    async fn test_empty_playlist_costs_one_call() {
        let base = BasePlaylist::new("user-1", "Everything", "remote-base");
        let mut service = MockService::new();
        service
            .expect_list_playlist_tracks()
            .times(1)
            .returning(|_, _, _| Ok(TrackPage::default()));

        let aggregator = TrackAggregator::new(Arc::new(service), Arc::new(bases_with(base.clone())));
        let set = aggregator
            .aggregate("user-1", &base.id, &CancellationToken::new())
            .await
            .unwrap();

        assert!(set.is_empty());
        assert_eq!(set.api_calls, 1);
    }

    #[tokio::test]
    async fn test_stops_on_empty_page_before_total() {
        let base = BasePlaylist::new("user-1", "Everything", "remote-base");
        let mut service = MockService::new();
        service
            .expect_list_playlist_tracks()
            .withf(|_, _, offset| *offset == 0)
            .returning(|_, _, _| Ok(page(0..100, 300)));
        service
            .expect_list_playlist_tracks()
            .withf(|_, _, offset| *offset == 100)
            .returning(|_, _, _| Ok(TrackPage::new(vec![], 300)));

        let aggregator = TrackAggregator::new(Arc::new(service), Arc::new(bases_with(base.clone())));
        let set = aggregator
            .aggregate("user-1", &base.id, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(set.len(), 100);
        assert_eq!(set.api_calls, 2);
    }

    #[tokio::test]
    async fn test_failed_page_reports_counters() {
        let base = BasePlaylist::new("user-1", "Everything", "remote-base");
        let mut service = MockService::new();
        service
            .expect_list_playlist_tracks()
            .withf(|_, _, offset| *offset == 0)
            .returning(|_, _, _| Ok(page(0..100, 250)));
        service
            .expect_list_playlist_tracks()
            .withf(|_, _, offset| *offset == 100)
            .returning(|_, _, _| {
                Err(BridgeError::RemoteStatus {
                    status: 500,
                    message: "internal error".to_string(),
                })
            });

        let aggregator = TrackAggregator::new(Arc::new(service), Arc::new(bases_with(base.clone())));
        let failure = aggregator
            .aggregate("user-1", &base.id, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.api_calls, 2);
        assert_eq!(failure.tracks_fetched, 100);
        assert!(matches!(
            failure.error,
            SyncError::Aggregation { offset: 100, .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_base_playlist() {
        let base = BasePlaylist::new("user-1", "Everything", "remote-base");
        let service = MockService::new();

        let aggregator = TrackAggregator::new(Arc::new(service), Arc::new(bases_with(base.clone())));
        let failure = aggregator
            .aggregate("user-2", &base.id, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.api_calls, 0);
        assert!(matches!(failure.error, SyncError::BasePlaylistNotFound { .. }));
    }

    #[tokio::test]
    async fn test_store_errors_are_persistence_failures() {
        let mut bases = MockBases::new();
        bases.expect_find_by_id().returning(|_, _| {
            Err(LibraryError::Migration("database is locked".to_string()))
        });

        let aggregator = TrackAggregator::new(Arc::new(MockService::new()), Arc::new(bases));
        let failure = aggregator
            .aggregate("user-1", "base-1", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, SyncError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_page() {
        let base = BasePlaylist::new("user-1", "Everything", "remote-base");
        let mut service = MockService::new();
        service
            .expect_list_playlist_tracks()
            .returning(|_, _, _| Ok(page(0..10, 10)));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let aggregator = TrackAggregator::new(Arc::new(service), Arc::new(bases_with(base.clone())));
        let failure = aggregator.aggregate("user-1", &base.id, &cancel).await.unwrap_err();

        assert!(matches!(failure.error, SyncError::Cancelled));
        assert_eq!(failure.api_calls, 0);
    }

    #[tokio::test]
    async fn test_unplayable_page_does_not_end_paging() {
        let base = BasePlaylist::new("user-1", "Everything", "remote-base");
        let mut service = MockService::new();
        service
            .expect_list_playlist_tracks()
            .withf(|_, _, offset| *offset == 0)
            .times(1)
            .returning(|_, _, _| Ok(TrackPage::with_skipped(vec![], 100, 150)));
        service
            .expect_list_playlist_tracks()
            .withf(|_, _, offset| *offset == 100)
            .times(1)
            .returning(|_, _, _| Ok(page(100..150, 150)));

        let aggregator = TrackAggregator::new(Arc::new(service), Arc::new(bases_with(base.clone())));
        let set = aggregator
            .aggregate("user-1", &base.id, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(set.len(), 50);
        assert_eq!(set.api_calls, 2);
        assert_eq!(set.tracks[0].id, "t100");
    }

    #[tokio::test]
    async fn test_offset_advances_by_listed_entries() {
        let base = BasePlaylist::new("user-1", "Everything", "remote-base");
        let mut service = MockService::new();
        service
            .expect_list_playlist_tracks()
            .withf(|_, _, offset| *offset == 0)
            .times(1)
            .returning(|_, _, _| Ok(TrackPage::with_skipped(page(0..60, 130).items, 80, 130)));
        service
            .expect_list_playlist_tracks()
            .withf(|_, _, offset| *offset == 80)
            .times(1)
            .returning(|_, _, _| Ok(page(80..130, 130)));

        let aggregator = TrackAggregator::new(Arc::new(service), Arc::new(bases_with(base.clone())))
            .with_page_size(80);
        let set = aggregator
            .aggregate("user-1", &base.id, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(set.len(), 110);
        assert_eq!(set.api_calls, 2);
    }

    #[tokio::test]
    async fn test_page_size_is_clamped() {
        let aggregator = TrackAggregator::new(Arc::new(MockService::new()), Arc::new(MockBases::new()));
        assert_eq!(aggregator.page_size(), 100);

        let aggregator = aggregator.with_page_size(500);
        assert_eq!(aggregator.page_size(), 100);

        let aggregator = aggregator.with_page_size(0);
        assert_eq!(aggregator.page_size(), 1);
    }

    #[tokio::test]
    async fn test_resolve_genres_batches_distinct_artists() {
        let mut service = MockService::new();
        service
            .expect_get_artists()
            .withf(|ids| ids.len() == 50)
            .times(1)
            .returning(|ids| {
                Ok(ids
                    .iter()
                    .map(|id| RemoteArtist {
                        id: id.clone(),
                        name: id.clone(),
                        genres: vec![format!("genre-{}", id)],
                    })
                    .collect())
            });
        service
            .expect_get_artists()
            .withf(|ids| ids.len() == 10)
            .times(1)
            .returning(|_| Ok(vec![]));

        let artists: Vec<String> = (0..60).map(|n| format!("a{}", n)).collect();
        let mut set = PlaylistTrackSet {
            playlist_id: "remote-base".to_string(),
            tracks: artists
                .iter()
                .enumerate()
                .map(|(n, a)| track(n, &[a.as_str(), "a0"]))
                .collect(),
            api_calls: 1,
            artist_genres: HashMap::new(),
        };

        let aggregator = TrackAggregator::new(Arc::new(service), Arc::new(MockBases::new()));
        aggregator
            .resolve_genres(&mut set, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(set.api_calls, 3);
        let genres: Vec<_> = set.genres_of(&set.tracks[1]).collect();
        assert_eq!(genres, vec!["genre-a1", "genre-a0"]);
        assert_eq!(set.genres_of(&set.tracks[55]).count(), 1);
    }

    #[test]
    fn test_genres_of_unknown_artist_is_empty() {
        let set = PlaylistTrackSet {
            tracks: vec![track(1, &["nobody"])],
            ..PlaylistTrackSet::default()
        };
        assert_eq!(set.genres_of(&set.tracks[0]).count(), 0);
    }
}
