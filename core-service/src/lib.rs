//! Core service façade and bootstrap helpers.
//!
//! This crate wires a [`CoreConfig`] into a running sync engine: the SQLite
//! pool and repositories, the Spotify connector over the configured
//! `HttpClient`, the lifecycle event bus and the [`SyncOrchestrator`]. Desktop
//! apps typically keep the default `desktop-shims` feature, which supplies a
//! `reqwest` based HTTP client; other hosts inject their own.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::playlist::RemotePlaylistService;
use core_library::db::{create_pool, DatabaseConfig};
use core_library::{
    BasePlaylistRepository, ChildPlaylistRepository, SqliteBasePlaylistRepository,
    SqliteChildPlaylistRepository,
};
use core_runtime::{CoreConfig, EventBus, EventStream};
use core_sync::{
    SqliteSyncEventRepository, SyncConfig, SyncEvent, SyncEventRepository, SyncOrchestrator,
};
use provider_spotify::SpotifyConnector;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop::ReqwestHttpClient;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    base_playlists: Arc<dyn BasePlaylistRepository>,
    child_playlists: Arc<dyn ChildPlaylistRepository>,
    event_bus: Arc<EventBus>,
    orchestrator: Arc<SyncOrchestrator>,
}

impl CoreService {
    /// Bootstrap the engine for one access token.
    ///
    /// Opens (and migrates) the database at `config.database_path` and points
    /// the Spotify connector at `config.api_base_url`, with
    /// `config.request_timeout_secs` attached to every request.
    pub async fn bootstrap(config: CoreConfig, access_token: impl Into<String>) -> Result<Self> {
        config.validate()?;

        let pool = create_pool(DatabaseConfig::new(config.database_path.clone()))
            .await
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;

        let base_playlists: Arc<dyn BasePlaylistRepository> =
            Arc::new(SqliteBasePlaylistRepository::new(pool.clone()));
        let child_playlists: Arc<dyn ChildPlaylistRepository> =
            Arc::new(SqliteChildPlaylistRepository::new(pool.clone()));
        let events: Arc<dyn SyncEventRepository> =
            Arc::new(SqliteSyncEventRepository::new(pool));

        let service: Arc<dyn RemotePlaylistService> = Arc::new(
            SpotifyConnector::new(Arc::clone(&config.http_client), access_token.into())
                .with_base_url(config.api_base_url.as_str())
                .with_request_timeout(Duration::from_secs(config.request_timeout_secs)),
        );

        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        let orchestrator = SyncOrchestrator::new(
            SyncConfig::from(&config.sync),
            service,
            Arc::clone(&base_playlists),
            Arc::clone(&child_playlists),
            events,
            Arc::clone(&config.clock),
            Arc::clone(&event_bus),
        );

        info!(api_base_url = %config.api_base_url, "Core service ready");

        Ok(Self {
            base_playlists,
            child_playlists,
            event_bus,
            orchestrator: Arc::new(orchestrator),
        })
    }

    /// Run a full sync of one base playlist. See
    /// [`SyncOrchestrator::sync_base_playlist`].
    pub async fn sync_base_playlist(
        &self,
        user_id: &str,
        base_playlist_id: &str,
    ) -> Result<SyncEvent> {
        Ok(self
            .orchestrator
            .sync_base_playlist(user_id, base_playlist_id)
            .await?)
    }

    pub async fn sync_base_playlist_with_cancel(
        &self,
        user_id: &str,
        base_playlist_id: &str,
        cancel: CancellationToken,
    ) -> Result<SyncEvent> {
        Ok(self
            .orchestrator
            .sync_base_playlist_with_cancel(user_id, base_playlist_id, cancel)
            .await?)
    }

    pub async fn get_event(&self, event_id: &str, user_id: &str) -> Result<SyncEvent> {
        Ok(self.orchestrator.get_event(event_id, user_id).await?)
    }

    pub async fn list_history(
        &self,
        user_id: &str,
        base_playlist_id: &str,
        limit: u32,
    ) -> Result<Vec<SyncEvent>> {
        Ok(self
            .orchestrator
            .list_history(user_id, base_playlist_id, limit)
            .await?)
    }

    pub async fn is_sync_in_progress(&self, user_id: &str, base_playlist_id: &str) -> Result<bool> {
        Ok(self
            .orchestrator
            .is_sync_in_progress(user_id, base_playlist_id)
            .await?)
    }

    /// Stream of sync and library notifications emitted from now on.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Record store for base playlists.
    pub fn base_playlists(&self) -> Arc<dyn BasePlaylistRepository> {
        Arc::clone(&self.base_playlists)
    }

    /// Record store for child playlists.
    pub fn child_playlists(&self) -> Arc<dyn ChildPlaylistRepository> {
        Arc::clone(&self.child_playlists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
    use core_library::{BasePlaylist, ChildPlaylist};
    use core_runtime::{CoreEvent, SyncUpdate};
    use core_sync::SyncStatus;
    use std::sync::Mutex;

    /// Answers the handful of endpoints a single-child sync touches.
    #[derive(Default)]
    struct CannedSpotify {
        requests: Mutex<Vec<(HttpMethod, String)>>,
        timeouts: Mutex<Vec<Option<Duration>>>,
    }

    #[async_trait]
    impl HttpClient for CannedSpotify {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((request.method, request.url.clone()));
            self.timeouts.lock().unwrap().push(request.timeout);

            let url = request.url.as_str();
            let response = if url.contains("/playlists/remote-base/tracks") {
                HttpResponse::new(
                    200,
                    r#"{
                        "items": [
                            { "is_local": false, "track": {
                                "id": "t1", "name": "One", "uri": "spotify:track:t1",
                                "duration_ms": 200000, "popularity": 90, "explicit": false,
                                "album": { "id": "al1" }, "artists": [{ "id": "ar1" }] } },
                            { "is_local": false, "track": {
                                "id": "t2", "name": "Two", "uri": "spotify:track:t2",
                                "duration_ms": 180000, "popularity": 20, "explicit": true,
                                "album": { "id": "al2" }, "artists": [{ "id": "ar2" }] } }
                        ],
                        "total": 2
                    }"#,
                )
            } else if url.ends_with("/me/playlists") {
                HttpResponse::new(201, r#"{ "id": "new1", "name": "[Mix] > All" }"#)
            } else if url.ends_with("/playlists/new1/tracks") {
                HttpResponse::new(201, r#"{ "snapshot_id": "s1" }"#)
            } else {
                HttpResponse::new(404, "unexpected endpoint")
            };
            Ok(response)
        }
    }

    async fn service(http: Arc<CannedSpotify>) -> CoreService {
        let config = CoreConfig::builder()
            .database_path(":memory:")
            .api_base_url("https://api.test/v1")
            .http_client(http)
            .build()
            .unwrap();

        CoreService::bootstrap(config, "token").await.unwrap()
    }

    #[tokio::test]
    async fn test_configured_request_timeout_reaches_connector() {
        let http = Arc::new(CannedSpotify::default());
        let config = CoreConfig::builder()
            .database_path(":memory:")
            .api_base_url("https://api.test/v1")
            .http_client(Arc::clone(&http) as Arc<dyn HttpClient>)
            .request_timeout_secs(5)
            .build()
            .unwrap();
        let core = CoreService::bootstrap(config, "token").await.unwrap();

        let base = BasePlaylist::new("user-1", "Mix", "remote-base");
        core.base_playlists().insert(&base).await.unwrap();
        let child = ChildPlaylist::new("user-1", &base.id, "All");
        core.child_playlists().insert(&child).await.unwrap();

        core.sync_base_playlist("user-1", &base.id).await.unwrap();

        let timeouts = http.timeouts.lock().unwrap();
        assert_eq!(timeouts.len(), 3);
        assert!(timeouts
            .iter()
            .all(|timeout| *timeout == Some(Duration::from_secs(5))));
    }

    #[tokio::test]
    async fn test_bootstrap_and_sync() {
        let http = Arc::new(CannedSpotify::default());
        let core = service(Arc::clone(&http)).await;

        let base = BasePlaylist::new("user-1", "Mix", "remote-base");
        core.base_playlists().insert(&base).await.unwrap();
        let child = ChildPlaylist::new("user-1", &base.id, "All");
        core.child_playlists().insert(&child).await.unwrap();

        let mut stream = core.subscribe_events();

        let event = core.sync_base_playlist("user-1", &base.id).await.unwrap();

        assert_eq!(event.status, SyncStatus::Completed);
        assert_eq!(event.tracks_processed, 2);
        assert_eq!(event.total_api_requests, 3);
        assert_eq!(event.child_playlist_ids, vec![child.id.clone()]);

        let stored = core
            .child_playlists()
            .find_by_id(&child.id, "user-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.remote_playlist_id.as_deref(), Some("new1"));

        let first = stream.recv().await.unwrap();
        assert!(matches!(first, CoreEvent::Sync(SyncUpdate::Started { .. })));

        let requests = http.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].0, HttpMethod::Post);
    }

    #[tokio::test]
    async fn test_history_and_lookup_through_facade() {
        let core = service(Arc::new(CannedSpotify::default())).await;

        let base = BasePlaylist::new("user-1", "Mix", "remote-base");
        core.base_playlists().insert(&base).await.unwrap();

        let event = core.sync_base_playlist("user-1", &base.id).await.unwrap();
        assert_eq!(event.total_api_requests, 0);

        let history = core.list_history("user-1", &base.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);

        let fetched = core
            .get_event(&event.id.to_string(), "user-1")
            .await
            .unwrap();
        assert_eq!(fetched.id, event.id);

        assert!(matches!(
            core.get_event(&event.id.to_string(), "someone-else").await,
            Err(CoreError::Sync(_))
        ));
        assert!(!core.is_sync_in_progress("user-1", &base.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_base_is_sync_error() {
        let core = service(Arc::new(CannedSpotify::default())).await;

        let result = core.sync_base_playlist("user-1", "missing").await;

        assert!(matches!(
            result,
            Err(CoreError::Sync(core_sync::SyncError::BasePlaylistNotFound { .. }))
        ));
    }
}
