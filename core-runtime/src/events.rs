//! # Event Bus System
//!
//! Typed lifecycle notifications over `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The sync orchestrator publishes what it is doing (sync started, child
//! playlist rebuilt, sync finished or failed) so hosts can update UI or
//! metrics without polling the sync event history.
//!
//! ```text
//! ┌──────────────────┐   emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ SyncOrchestrator ├─────────>│ EventBus  ├────────────>│ Subscriber │
//! └──────────────────┘          └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncUpdate};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Sync(SyncUpdate::Started {
//!         sync_event_id: "evt-1".to_string(),
//!         user_id: "user-1".to_string(),
//!         base_playlist_id: "base-1".to_string(),
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Sync started");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - `emit` fails only when nobody is subscribed; publishers ignore that with `.ok()`.
//! - `RecvError::Lagged(n)`: the subscriber missed `n` events and may continue.
//! - `RecvError::Closed`: every sender is gone; treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Sync lifecycle
    Sync(SyncUpdate),
    /// Record store changes made by the engine
    Library(LibraryUpdate),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncUpdate::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncUpdate::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Library(LibraryUpdate::RemotePlaylistReplaced { .. }) => {
                EventSeverity::Info
            }
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Progress of a single base playlist sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncUpdate {
    /// Sync event record created in progress.
    Started {
        sync_event_id: String,
        user_id: String,
        base_playlist_id: String,
    },
    /// Base playlist fully aggregated.
    TracksAggregated {
        sync_event_id: String,
        track_count: u64,
        api_requests: u64,
    },
    /// A child playlist was deleted, recreated and repopulated.
    ChildReconciled {
        sync_event_id: String,
        child_playlist_id: String,
        remote_playlist_id: String,
        tracks_added: u64,
    },
    Completed {
        sync_event_id: String,
        tracks_processed: u64,
        total_api_requests: u64,
        children_reconciled: u64,
        duration_secs: u64,
    },
    Failed {
        sync_event_id: String,
        message: String,
        tracks_processed: u64,
        total_api_requests: u64,
    },
}

impl SyncUpdate {
    fn description(&self) -> &str {
        match self {
            SyncUpdate::Started { .. } => "Sync started",
            SyncUpdate::TracksAggregated { .. } => "Base playlist tracks aggregated",
            SyncUpdate::ChildReconciled { .. } => "Child playlist reconciled",
            SyncUpdate::Completed { .. } => "Sync completed successfully",
            SyncUpdate::Failed { .. } => "Sync failed",
        }
    }

    /// Identifier of the sync event record this update belongs to.
    pub fn sync_event_id(&self) -> &str {
        match self {
            SyncUpdate::Started { sync_event_id, .. }
            | SyncUpdate::TracksAggregated { sync_event_id, .. }
            | SyncUpdate::ChildReconciled { sync_event_id, .. }
            | SyncUpdate::Completed { sync_event_id, .. }
            | SyncUpdate::Failed { sync_event_id, .. } => sync_event_id,
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryUpdate {
    /// A child playlist now points at a freshly created remote playlist.
    RemotePlaylistReplaced {
        child_playlist_id: String,
        previous_remote_id: Option<String>,
        remote_playlist_id: String,
    },
}

impl LibraryUpdate {
    fn description(&self) -> &str {
        match self {
            LibraryUpdate::RemotePlaylistReplaced { .. } => "Child remote playlist replaced",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every `subscribe()` call creates an
/// independent receiver that sees events emitted after it was created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` that skips events rejected by a filter.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream, SyncUpdate};
///
/// let event_bus = EventBus::default();
/// let failures = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Sync(SyncUpdate::Failed { .. })));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(id: &str) -> CoreEvent {
        CoreEvent::Sync(SyncUpdate::Started {
            sync_event_id: id.to_string(),
            user_id: "user-1".to_string(),
            base_playlist_id: "base-1".to_string(),
        })
    }

    fn failed(id: &str) -> CoreEvent {
        CoreEvent::Sync(SyncUpdate::Failed {
            sync_event_id: id.to_string(),
            message: "boom".to_string(),
            tracks_processed: 100,
            total_api_requests: 2,
        })
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_fails() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(started("evt-1")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.emit(started("evt-1")).unwrap(), 2);

        assert_eq!(first.recv().await.unwrap(), started("evt-1"));
        assert_eq!(second.recv().await.unwrap(), started("evt-1"));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| event.severity() == EventSeverity::Error);

        bus.emit(started("evt-1")).unwrap();
        bus.emit(failed("evt-1")).unwrap();

        assert_eq!(stream.recv().await.unwrap(), failed("evt-1"));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for i in 0..5 {
            bus.emit(started(&format!("evt-{}", i))).unwrap();
        }

        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(3)))));
        assert_eq!(stream.try_recv().unwrap().unwrap(), started("evt-3"));
    }

    #[test]
    fn test_severity_and_description() {
        assert_eq!(failed("evt-1").severity(), EventSeverity::Error);
        assert_eq!(started("evt-1").severity(), EventSeverity::Debug);
        assert_eq!(failed("evt-1").description(), "Sync failed");

        let replaced = CoreEvent::Library(LibraryUpdate::RemotePlaylistReplaced {
            child_playlist_id: "child-1".to_string(),
            previous_remote_id: None,
            remote_playlist_id: "remote-2".to_string(),
        });
        assert_eq!(replaced.severity(), EventSeverity::Info);
    }

    #[test]
    fn test_sync_event_id_accessor() {
        let CoreEvent::Sync(update) = failed("evt-9") else {
            panic!("expected sync update");
        };
        assert_eq!(update.sync_event_id(), "evt-9");
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(started("evt-1")).unwrap();
        assert_eq!(json["type"], "Sync");
        assert_eq!(json["payload"]["event"], "Started");
        assert_eq!(json["payload"]["base_playlist_id"], "base-1");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, started("evt-1"));
    }
}
