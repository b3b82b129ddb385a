//! Spotify Web API connector implementation
//!
//! Implements the `RemotePlaylistService` trait for the Spotify Web API v1.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::playlist::{
    RemoteArtist, RemotePlaylist, RemotePlaylistService, TrackPage, MAX_ARTISTS_PER_LOOKUP,
    MAX_PAGE_SIZE, MAX_TRACKS_PER_ADD,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::SpotifyError;
use crate::types::{
    AddTracksRequest, ArtistsResponse, CreatePlaylistRequest, PlaylistItem,
    PlaylistTracksResponse, SpotifyPlaylist,
};

/// Spotify Web API base URL
pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

/// Per-request timeout unless one is configured
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Spotify Web API connector
///
/// Every trait method maps to exactly one HTTP request. Nothing is retried,
/// and the injected `HttpClient` is expected to send each request once.
///
/// # Example
///
/// ```ignore
/// use provider_spotify::SpotifyConnector;
/// use bridge_traits::playlist::RemotePlaylistService;
///
/// let connector = SpotifyConnector::new(http_client, access_token);
/// let page = connector.list_playlist_tracks("37i9dQZF1DXcBWIGoYBM5M", 100, 0).await?;
/// ```
pub struct SpotifyConnector {
    http_client: Arc<dyn HttpClient>,

    /// OAuth 2.0 access token with playlist-modify scopes
    access_token: String,

    base_url: String,

    request_timeout: Duration,
}

impl SpotifyConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self {
            http_client,
            access_token,
            base_url: SPOTIFY_API_BASE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Point the connector at another API root (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Timeout attached to every request.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    fn authorize(&self, request: HttpRequest) -> HttpRequest {
        request
            .bearer_token(self.access_token.as_str())
            .header("Accept", "application/json")
            .timeout(self.request_timeout)
    }

    /// Send a request and turn non-2xx answers into `SpotifyError`.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self
            .http_client
            .execute(self.authorize(request))
            .await
            .map_err(|e| SpotifyError::NetworkError(e.to_string()))?;

        if response.is_success() {
            debug!(status = response.status, "API request succeeded");
            return Ok(response);
        }

        warn!(status = response.status, "API request failed");
        let retry_after = response
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("retry-after"))
            .map(|(_, value)| value.as_str());
        Err(SpotifyError::from_status(response.status, retry_after, &response.body).into())
    }

    fn parse<T: DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
        serde_json::from_slice(&response.body).map_err(|e| {
            SpotifyError::ParseError(format!("Failed to parse {}: {}", what, e)).into()
        })
    }
}

#[async_trait]
impl RemotePlaylistService for SpotifyConnector {
    #[instrument(skip(self), fields(playlist_id = %playlist_id))]
    async fn list_playlist_tracks(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<TrackPage> {
        let url = format!(
            "{}/playlists/{}/tracks?limit={}&offset={}",
            self.base_url,
            urlencoding::encode(playlist_id),
            limit.clamp(1, MAX_PAGE_SIZE),
            offset
        );

        let response = self.send(HttpRequest::get(url)).await?;
        let page: PlaylistTracksResponse = Self::parse(&response, "playlist tracks")?;

        let listed = page.items.len();
        let items: Vec<_> = page
            .items
            .into_iter()
            .filter_map(PlaylistItem::into_remote_track)
            .collect();

        if items.len() < listed {
            debug!(
                skipped = listed - items.len(),
                "Skipped unavailable or local playlist entries"
            );
        }

        Ok(TrackPage::with_skipped(items, listed as u32, page.total))
    }

    #[instrument(skip(self), fields(playlist_id = %playlist_id))]
    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        // Spotify has no hard delete; unfollowing removes it from the library.
        let url = format!(
            "{}/playlists/{}/followers",
            self.base_url,
            urlencoding::encode(playlist_id)
        );

        self.send(HttpRequest::delete(url)).await?;
        info!("Unfollowed playlist");
        Ok(())
    }

    #[instrument(skip(self, description))]
    async fn create_playlist(
        &self,
        name: &str,
        description: &str,
        is_public: bool,
    ) -> Result<RemotePlaylist> {
        let url = format!("{}/me/playlists", self.base_url);
        let request = HttpRequest::post(url).json(&CreatePlaylistRequest {
            name,
            description,
            public: is_public,
        })?;

        let response = self.send(request).await?;
        let playlist: SpotifyPlaylist = Self::parse(&response, "created playlist")?;

        info!(remote_playlist_id = %playlist.id, "Created playlist");
        Ok(playlist.into())
    }

    #[instrument(skip(self, uris), fields(playlist_id = %playlist_id, count = uris.len()))]
    async fn add_tracks_to_playlist(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        if uris.len() > MAX_TRACKS_PER_ADD {
            return Err(SpotifyError::ApiError {
                status_code: 400,
                message: format!(
                    "At most {} URIs per request, got {}",
                    MAX_TRACKS_PER_ADD,
                    uris.len()
                ),
            }
            .into());
        }

        let url = format!(
            "{}/playlists/{}/tracks",
            self.base_url,
            urlencoding::encode(playlist_id)
        );
        let request = HttpRequest::post(url).json(&AddTracksRequest { uris })?;

        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, artist_ids), fields(count = artist_ids.len()))]
    async fn get_artists(&self, artist_ids: &[String]) -> Result<Vec<RemoteArtist>> {
        if artist_ids.is_empty() {
            return Ok(Vec::new());
        }
        if artist_ids.len() > MAX_ARTISTS_PER_LOOKUP {
            return Err(SpotifyError::ApiError {
                status_code: 400,
                message: format!(
                    "At most {} artist ids per request, got {}",
                    MAX_ARTISTS_PER_LOOKUP,
                    artist_ids.len()
                ),
            }
            .into());
        }

        let url = format!(
            "{}/artists?ids={}",
            self.base_url,
            urlencoding::encode(&artist_ids.join(","))
        );

        let response = self.send(HttpRequest::get(url)).await?;
        let artists: ArtistsResponse = Self::parse(&response, "artists")?;

        Ok(artists
            .artists
            .into_iter()
            .flatten()
            .map(RemoteArtist::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::http::HttpMethod;
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn connector(mock_http: MockHttpClient) -> SpotifyConnector {
        SpotifyConnector::new(Arc::new(mock_http), "test_token".to_string())
            .with_base_url("https://api.test/v1/")
    }

    #[tokio::test]
    async fn test_list_playlist_tracks_success() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.method, HttpMethod::Get);
            assert_eq!(
                req.url,
                "https://api.test/v1/playlists/base1/tracks?limit=100&offset=200"
            );
            assert_eq!(
                req.headers.get("Authorization"),
                Some(&"Bearer test_token".to_string())
            );

            let body = r#"{
                "items": [
                    {
                        "is_local": false,
                        "track": {
                            "id": "t1",
                            "name": "Song",
                            "uri": "spotify:track:t1",
                            "duration_ms": 180000,
                            "popularity": 80,
                            "explicit": false,
                            "album": { "id": "al1" },
                            "artists": [{ "id": "ar1" }]
                        }
                    },
                    { "is_local": false, "track": null }
                ],
                "total": 202,
                "limit": 100,
                "offset": 200,
                "next": null
            }"#;
            Ok(HttpResponse::new(200, body))
        });

        let page = connector(mock_http)
            .list_playlist_tracks("base1", 100, 200)
            .await
            .unwrap();

        assert_eq!(page.total, 202);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.listed, 2);
        assert_eq!(page.items[0].popularity, 80);
    }

    #[tokio::test]
    async fn test_list_playlist_tracks_api_error() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(404, "Not found")));

        let err = connector(mock_http)
            .list_playlist_tracks("missing", 100, 0)
            .await
            .unwrap_err();

        match err {
            BridgeError::RemoteStatus { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_playlist_tracks_malformed_body() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "{not json")));

        let err = connector(mock_http)
            .list_playlist_tracks("base1", 100, 0)
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::OperationFailed(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|_| {
            Err(BridgeError::OperationFailed("connection reset".to_string()))
        });

        let err = connector(mock_http)
            .delete_playlist("p1")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Network error"));
    }

    #[tokio::test]
    async fn test_delete_playlist_unfollows() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.method, HttpMethod::Delete);
            assert_eq!(req.url, "https://api.test/v1/playlists/p1/followers");
            Ok(HttpResponse::new(200, ""))
        });

        connector(mock_http).delete_playlist("p1").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_playlist_sends_body() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.method, HttpMethod::Post);
            assert_eq!(req.url, "https://api.test/v1/me/playlists");

            let body: serde_json::Value =
                serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
            assert_eq!(body["name"], "[Mix] > Hits");
            assert_eq!(body["description"], "Managed by sync");
            assert_eq!(body["public"], true);

            Ok(HttpResponse::new(
                201,
                r#"{ "id": "new1", "name": "[Mix] > Hits" }"#,
            ))
        });

        let playlist = connector(mock_http)
            .create_playlist("[Mix] > Hits", "Managed by sync", true)
            .await
            .unwrap();

        assert_eq!(playlist.id, "new1");
        assert_eq!(playlist.name, "[Mix] > Hits");
    }

    #[tokio::test]
    async fn test_create_playlist_unauthorized() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(401, "The access token expired")));

        let err = connector(mock_http)
            .create_playlist("x", "", false)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn test_add_tracks_posts_uris() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.url, "https://api.test/v1/playlists/p1/tracks");
            let body: serde_json::Value =
                serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
            assert_eq!(body["uris"][0], "spotify:track:a");
            assert_eq!(body["uris"][1], "spotify:track:b");
            Ok(HttpResponse::new(201, r#"{ "snapshot_id": "s1" }"#))
        });

        let uris = vec!["spotify:track:a".to_string(), "spotify:track:b".to_string()];
        connector(mock_http)
            .add_tracks_to_playlist("p1", &uris)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_tracks_rejects_oversized_batch() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(0);

        let uris: Vec<String> = (0..101).map(|i| format!("spotify:track:{i}")).collect();
        let err = connector(mock_http)
            .add_tracks_to_playlist("p1", &uris)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn test_rate_limit_keeps_status() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|_| {
            let mut response = HttpResponse::new(429, "");
            response
                .headers
                .insert("retry-after".to_string(), "3".to_string());
            Ok(response)
        });

        let err = connector(mock_http)
            .list_playlist_tracks("p1", 100, 0)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(429));
        assert!(err.to_string().contains("retry after 3 seconds"));
    }

    #[tokio::test]
    async fn test_get_artists_joins_ids() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.url, "https://api.test/v1/artists?ids=ar1%2Car2");
            Ok(HttpResponse::new(
                200,
                r#"{ "artists": [
                    { "id": "ar1", "name": "One", "genres": ["synthpop"] },
                    { "id": "ar2", "name": "Two", "genres": [] }
                ] }"#,
            ))
        });

        let ids = vec!["ar1".to_string(), "ar2".to_string()];
        let artists = connector(mock_http).get_artists(&ids).await.unwrap();

        assert_eq!(artists.len(), 2);
        assert_eq!(artists[0].genres, vec!["synthpop"]);
    }

    #[tokio::test]
    async fn test_get_artists_empty_skips_request() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(0);

        let artists = connector(mock_http).get_artists(&[]).await.unwrap();
        assert!(artists.is_empty());
    }

    #[tokio::test]
    async fn test_all_local_page_still_reports_listed_entries() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|_| {
            let items: Vec<String> = (0..100)
                .map(|i| {
                    format!(
                        r#"{{ "is_local": true, "track": {{ "id": null, "name": "Local {i}", "uri": "spotify:local:{i}" }} }}"#
                    )
                })
                .collect();
            let body = format!(r#"{{ "items": [{}], "total": 150 }}"#, items.join(","));
            Ok(HttpResponse::new(200, body))
        });

        let page = connector(mock_http)
            .list_playlist_tracks("base1", 100, 0)
            .await
            .unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.listed, 100);
        assert_eq!(page.total, 150);
    }

    #[tokio::test]
    async fn test_configured_request_timeout_is_attached() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.timeout, Some(Duration::from_secs(7)));
            Ok(HttpResponse::new(200, ""))
        });

        let connector = connector(mock_http).with_request_timeout(Duration::from_secs(7));
        assert_eq!(connector.request_timeout(), Duration::from_secs(7));
        connector.delete_playlist("p1").await.unwrap();
    }

    #[tokio::test]
    async fn test_default_request_timeout() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.timeout, Some(DEFAULT_REQUEST_TIMEOUT));
            Ok(HttpResponse::new(200, ""))
        });

        SpotifyConnector::new(Arc::new(mock_http), "t".to_string())
            .delete_playlist("p1")
            .await
            .unwrap();
    }
}
