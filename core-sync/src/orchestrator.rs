//! # Sync Orchestrator
//!
//! Runs one sync of a base playlist end to end.
//!
//! ## Workflow
//!
//! 1. Refuse to start if the base playlist already has an in-progress sync
//! 2. Record an in-progress `SyncEvent`
//! 3. Load the active child playlists (none: complete immediately)
//! 4. Aggregate the base playlist tracks, resolving artist genres when a
//!    child filters on them
//! 5. Route tracks to children, then rebuild every routed child in order:
//!    delete its remote playlist, create a fresh one, store the new id and
//!    add the routed URIs in batches
//! 6. Record the event as `Completed`, or as `Failed` on the first error
//!
//! Work is strictly sequential and never retried. Every remote call that was
//! started counts toward the event's `total_api_requests`, including the one
//! that failed. A call skipped because the sync was already cancelled does not.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::SyncOrchestrator;
//!
//! let event = orchestrator.sync_base_playlist("user-1", &base_id).await?;
//! println!("{} tracks, {} requests", event.tracks_processed, event.total_api_requests);
//! ```

use crate::aggregator::{ensure_not_cancelled, until_cancelled, TrackAggregator};
use crate::error::ReconcileStep;
use crate::repository::SyncEventRepository;
use crate::router::{RoutedPlaylist, TrackRouter};
use crate::{Result, SyncError, SyncEvent, SyncEventId};
use bridge_traits::playlist::{RemotePlaylistService, MAX_PAGE_SIZE, MAX_TRACKS_PER_ADD};
use bridge_traits::time::Clock;
use core_library::{BasePlaylist, BasePlaylistRepository, ChildPlaylist, ChildPlaylistRepository};
use core_runtime::config::{SyncSettings, DEFAULT_MANAGED_BANNER};
use core_runtime::events::{CoreEvent, EventBus, LibraryUpdate, SyncUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Sync orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Tracks requested per listing page
    pub page_size: u32,

    /// URIs sent per add call
    pub add_batch_size: usize,

    /// Visibility of recreated child playlists
    pub public_playlists: bool,

    /// Prefix of every child playlist description
    pub managed_banner: String,

    /// Timeout for an entire sync (seconds)
    pub sync_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            add_batch_size: MAX_TRACKS_PER_ADD,
            public_playlists: false,
            managed_banner: DEFAULT_MANAGED_BANNER.to_string(),
            sync_timeout_secs: 3600, // 1 hour
        }
    }
}

impl From<&SyncSettings> for SyncConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            page_size: settings.page_size.clamp(1, MAX_PAGE_SIZE),
            add_batch_size: settings.add_batch_size.clamp(1, MAX_TRACKS_PER_ADD),
            public_playlists: settings.public_playlists,
            managed_banner: settings.managed_banner.clone(),
            sync_timeout_secs: settings.sync_timeout_secs,
        }
    }
}

/// Display name of the remote playlist rebuilt for `child`.
pub fn child_playlist_name(base: &BasePlaylist, child: &ChildPlaylist) -> String {
    format!("[{}] > {}", base.name, child.name)
}

/// Description of the remote playlist rebuilt for `child`.
pub fn child_playlist_description(banner: &str, child: &ChildPlaylist) -> String {
    match child.description.as_deref().map(str::trim) {
        Some(description) if !description.is_empty() => format!("{} {}", banner, description),
        _ => banner.to_string(),
    }
}

pub struct SyncOrchestrator {
    config: SyncConfig,
    service: Arc<dyn RemotePlaylistService>,
    base_playlists: Arc<dyn BasePlaylistRepository>,
    child_playlists: Arc<dyn ChildPlaylistRepository>,
    events: Arc<dyn SyncEventRepository>,
    aggregator: TrackAggregator,
    router: TrackRouter,
    clock: Arc<dyn Clock>,
    event_bus: Arc<EventBus>,
}

impl SyncOrchestrator {
    pub fn new(
        config: SyncConfig,
        service: Arc<dyn RemotePlaylistService>,
        base_playlists: Arc<dyn BasePlaylistRepository>,
        child_playlists: Arc<dyn ChildPlaylistRepository>,
        events: Arc<dyn SyncEventRepository>,
        clock: Arc<dyn Clock>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let aggregator = TrackAggregator::new(Arc::clone(&service), Arc::clone(&base_playlists))
            .with_page_size(config.page_size);

        Self {
            config,
            service,
            base_playlists,
            child_playlists,
            events,
            aggregator,
            router: TrackRouter::new(),
            clock,
            event_bus,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Sync a base playlist into all of its active children.
    ///
    /// # Errors
    ///
    /// - [`SyncError::SyncInProgress`] if another sync of this base playlist is running;
    ///   no event is recorded and nothing remote is touched
    /// - [`SyncError::BasePlaylistNotFound`] if the owner has no such base playlist
    /// - any error that aborted the sync; the event is then recorded as failed
    pub async fn sync_base_playlist(&self, user_id: &str, base_playlist_id: &str) -> Result<SyncEvent> {
        self.sync_base_playlist_with_cancel(user_id, base_playlist_id, CancellationToken::new())
            .await
    }

    /// Like [`sync_base_playlist`](Self::sync_base_playlist), aborting with
    /// [`SyncError::Cancelled`] once `cancel` fires.
    #[instrument(skip(self, cancel))]
    pub async fn sync_base_playlist_with_cancel(
        &self,
        user_id: &str,
        base_playlist_id: &str,
        cancel: CancellationToken,
    ) -> Result<SyncEvent> {
        if self.events.has_in_progress(user_id, base_playlist_id).await? {
            warn!("Sync already in progress, refusing to start another");
            return Err(SyncError::SyncInProgress {
                base_playlist_id: base_playlist_id.to_string(),
            });
        }

        let base = self
            .base_playlists
            .find_by_id(base_playlist_id, user_id)
            .await?
            .ok_or_else(|| SyncError::BasePlaylistNotFound {
                base_playlist_id: base_playlist_id.to_string(),
            })?;

        let mut event = SyncEvent::start(user_id, &base.id, self.clock.unix_timestamp());
        self.events.insert(&event).await?;

        self.event_bus
            .emit(CoreEvent::Sync(SyncUpdate::Started {
                sync_event_id: event.id.to_string(),
                user_id: user_id.to_string(),
                base_playlist_id: base.id.clone(),
            }))
            .ok();

        info!(sync_event_id = %event.id, "Sync started");

        let outcome = match tokio::time::timeout(
            Duration::from_secs(self.config.sync_timeout_secs),
            self.execute(&mut event, &base, &cancel),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(SyncError::Timeout(self.config.sync_timeout_secs)),
        };

        match outcome {
            Ok(children_reconciled) => self.finish(event, children_reconciled).await,
            Err(e) => Err(self.abort(event, e).await),
        }
    }

    /// Look up one sync event of `user_id`.
    pub async fn get_event(&self, event_id: &str, user_id: &str) -> Result<SyncEvent> {
        let id = SyncEventId::from_string(event_id)?;
        self.events
            .find_by_id(&id, user_id)
            .await?
            .ok_or_else(|| SyncError::EventNotFound {
                event_id: event_id.to_string(),
            })
    }

    /// Sync history of a base playlist, most recent first.
    pub async fn list_history(
        &self,
        user_id: &str,
        base_playlist_id: &str,
        limit: u32,
    ) -> Result<Vec<SyncEvent>> {
        self.events.get_history(user_id, base_playlist_id, limit).await
    }

    pub async fn is_sync_in_progress(&self, user_id: &str, base_playlist_id: &str) -> Result<bool> {
        self.events.has_in_progress(user_id, base_playlist_id).await
    }

    /// Steps 3 to 5. Returns the number of children rebuilt.
    #[instrument(skip_all, fields(sync_event_id = %event.id))]
    async fn execute(
        &self,
        event: &mut SyncEvent,
        base: &BasePlaylist,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let children = self
            .child_playlists
            .list_active_children(&base.id, &event.user_id)
            .await?;

        if children.is_empty() {
            info!("No active child playlists, nothing to reconcile");
            return Ok(0);
        }

        let mut set = match self.aggregator.aggregate(&event.user_id, &base.id, cancel).await {
            Ok(set) => set,
            Err(failure) => {
                event.add_api_requests(failure.api_calls);
                event.tracks_processed = failure.tracks_fetched;
                return Err(failure.error);
            }
        };

        if TrackRouter::requires_genres(&children) {
            if let Err(failure) = self.aggregator.resolve_genres(&mut set, cancel).await {
                event.add_api_requests(failure.api_calls);
                event.tracks_processed = failure.tracks_fetched;
                return Err(failure.error);
            }
        }

        event.add_api_requests(set.api_calls);
        event.tracks_processed = set.len() as u64;
        self.save_progress(event).await;

        self.event_bus
            .emit(CoreEvent::Sync(SyncUpdate::TracksAggregated {
                sync_event_id: event.id.to_string(),
                track_count: event.tracks_processed,
                api_requests: event.total_api_requests,
            }))
            .ok();

        let table = self.router.route(&set, &children)?;
        info!(
            tracks = set.len(),
            routed_children = table.len(),
            routed_tracks = table.total_routed(),
            "Tracks routed"
        );

        let mut reconciled = 0;
        for child in &children {
            let Some(routed) = table.for_child(&child.id) else {
                debug!(child_id = %child.id, "No matching tracks, leaving child untouched");
                continue;
            };

            ensure_not_cancelled(cancel)?;

            event.record_child(&child.id);
            let remote_playlist_id = self.reconcile_child(event, base, child, routed, cancel).await?;
            reconciled += 1;
            self.save_progress(event).await;

            self.event_bus
                .emit(CoreEvent::Sync(SyncUpdate::ChildReconciled {
                    sync_event_id: event.id.to_string(),
                    child_playlist_id: child.id.clone(),
                    remote_playlist_id,
                    tracks_added: routed.track_uris.len() as u64,
                }))
                .ok();
        }

        Ok(reconciled)
    }

    /// Delete, recreate and repopulate one child's remote playlist.
    /// Returns the new remote playlist id.
    #[instrument(skip_all, fields(child_id = %child.id, tracks = routed.track_uris.len()))]
    async fn reconcile_child(
        &self,
        event: &mut SyncEvent,
        base: &BasePlaylist,
        child: &ChildPlaylist,
        routed: &RoutedPlaylist,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let failed = |step: ReconcileStep, message: String| SyncError::Reconciliation {
            child_id: child.id.clone(),
            step,
            message,
        };

        match routed.remote_playlist_id.as_deref() {
            Some(previous) => {
                ensure_not_cancelled(cancel)?;
                event.add_api_requests(1);
                debug!(remote_playlist_id = previous, "Deleting previous remote playlist");
                until_cancelled(cancel, self.service.delete_playlist(previous))
                    .await?
                    .map_err(|e| failed(ReconcileStep::DeletePlaylist, e.to_string()))?;
            }
            None => debug!("Child has never been synced, nothing to delete"),
        }

        ensure_not_cancelled(cancel)?;
        event.add_api_requests(1);
        let name = child_playlist_name(base, child);
        let description = child_playlist_description(&self.config.managed_banner, child);
        let created = until_cancelled(
            cancel,
            self.service
                .create_playlist(&name, &description, self.config.public_playlists),
        )
        .await?
        .map_err(|e| failed(ReconcileStep::CreatePlaylist, e.to_string()))?;

        self.child_playlists
            .set_remote_playlist_id(&child.id, &child.user_id, &created.id)
            .await
            .map_err(|e| failed(ReconcileStep::PersistRemoteId, e.to_string()))?;

        self.event_bus
            .emit(CoreEvent::Library(LibraryUpdate::RemotePlaylistReplaced {
                child_playlist_id: child.id.clone(),
                previous_remote_id: routed.remote_playlist_id.clone(),
                remote_playlist_id: created.id.clone(),
            }))
            .ok();

        for (batch, uris) in routed.track_uris.chunks(self.config.add_batch_size).enumerate() {
            ensure_not_cancelled(cancel)?;
            event.add_api_requests(1);
            debug!(batch, size = uris.len(), "Adding tracks");
            until_cancelled(cancel, self.service.add_tracks_to_playlist(&created.id, uris))
                .await?
                .map_err(|e| failed(ReconcileStep::AddTracks { batch }, e.to_string()))?;
        }

        info!(remote_playlist_id = %created.id, "Child playlist rebuilt");
        Ok(created.id)
    }

    /// Best-effort write of the running counters.
    async fn save_progress(&self, event: &SyncEvent) {
        if let Err(e) = self.events.update(event).await {
            warn!(sync_event_id = %event.id, error = %e, "Failed to record sync progress");
        }
    }

    /// Record completion. If that write fails the event is recorded as failed
    /// instead, so the in-progress row never outlives the sync.
    async fn finish(&self, event: SyncEvent, children_reconciled: u64) -> Result<SyncEvent> {
        let in_progress = event.clone();
        let event = match event.complete(self.clock.unix_timestamp()) {
            Ok(event) => event,
            Err(e) => return Err(self.abort(in_progress, e).await),
        };

        if let Err(e) = self.events.update(&event).await {
            error!(sync_event_id = %event.id, error = %e, "Failed to record sync completion");
            return Err(self.abort(in_progress, e).await);
        }

        self.event_bus
            .emit(CoreEvent::Sync(SyncUpdate::Completed {
                sync_event_id: event.id.to_string(),
                tracks_processed: event.tracks_processed,
                total_api_requests: event.total_api_requests,
                children_reconciled,
                duration_secs: event.duration_secs().unwrap_or(0),
            }))
            .ok();

        info!(
            sync_event_id = %event.id,
            tracks_processed = event.tracks_processed,
            total_api_requests = event.total_api_requests,
            children_reconciled,
            "Sync completed"
        );
        Ok(event)
    }

    /// Record the failure and hand back the error that caused it.
    async fn abort(&self, event: SyncEvent, cause: SyncError) -> SyncError {
        error!(sync_event_id = %event.id, error = %cause, "Sync failed");

        let message = cause.to_string();
        let (sync_event_id, tracks_processed, total_api_requests) =
            (event.id.to_string(), event.tracks_processed, event.total_api_requests);

        match event.fail(message.clone(), self.clock.unix_timestamp()) {
            Ok(failed) => {
                if let Err(e) = self.events.update(&failed).await {
                    error!(%sync_event_id, error = %e, "Failed to record sync failure");
                }
            }
            Err(e) => error!(%sync_event_id, error = %e, "Sync event was already finalized"),
        }

        self.event_bus
            .emit(CoreEvent::Sync(SyncUpdate::Failed {
                sync_event_id,
                message,
                tracks_processed,
                total_api_requests,
            }))
            .ok();

        cause
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child_with_description(description: Option<&str>) -> ChildPlaylist {
        let mut child = ChildPlaylist::new("user-1", "base-1", "Chill");
        child.description = description.map(str::to_string);
        child
    }

    #[test]
    fn test_child_playlist_name() {
        let base = BasePlaylist::new("user-1", "Everything", "remote-base");
        let child = child_with_description(None);
        assert_eq!(child_playlist_name(&base, &child), "[Everything] > Chill");
    }

    #[test]
    fn test_child_playlist_description() {
        assert_eq!(
            child_playlist_description("Managed.", &child_with_description(Some("Slow songs"))),
            "Managed. Slow songs"
        );
        assert_eq!(
            child_playlist_description("Managed.", &child_with_description(None)),
            "Managed."
        );
        assert_eq!(
            child_playlist_description("Managed.", &child_with_description(Some("  "))),
            "Managed."
        );
    }

    #[test]
    fn test_sync_config_from_settings() {
        let settings = SyncSettings::default()
            .with_page_size(50)
            .with_add_batch_size(20)
            .with_public_playlists(true)
            .with_managed_banner("Auto")
            .with_sync_timeout_secs(60);

        let config = SyncConfig::from(&settings);

        assert_eq!(config.page_size, 50);
        assert_eq!(config.add_batch_size, 20);
        assert!(config.public_playlists);
        assert_eq!(config.managed_banner, "Auto");
        assert_eq!(config.sync_timeout_secs, 60);
    }

    #[test]
    fn test_default_config_matches_remote_limits() {
        let config = SyncConfig::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.add_batch_size, 100);
        assert!(!config.public_playlists);
    }
}
