use core_library::LibraryError;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Sync already in progress for base playlist {base_playlist_id}")]
    SyncInProgress { base_playlist_id: String },

    #[error("Base playlist {base_playlist_id} not found")]
    BasePlaylistNotFound { base_playlist_id: String },

    #[error("Failed to aggregate playlist {playlist_id} at offset {offset}: {message}")]
    Aggregation {
        playlist_id: String,
        offset: u32,
        message: String,
    },

    #[error("Routing failed: {0}")]
    Routing(#[from] RoutingError),

    #[error("Reconciliation of child playlist {child_id} failed during {step}: {message}")]
    Reconciliation {
        child_id: String,
        step: ReconcileStep,
        message: String,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Sync timeout after {0} seconds")]
    Timeout(u64),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Sync event {event_id} not found")]
    EventNotFound { event_id: String },

    #[error("Invalid sync event ID: {0}")]
    InvalidEventId(String),

    #[error("Invalid sync status: {0}")]
    InvalidStatus(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },
}

impl From<LibraryError> for SyncError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::InvalidFilterRules { child_id, message } => {
                SyncError::Routing(RoutingError::UnreadableRules { child_id, message })
            }
            other => SyncError::Persistence(other.to_string()),
        }
    }
}

/// Reasons a child's filter rules cannot be compiled.
///
/// Any of these aborts routing for the whole base playlist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("child {child_id}: stored filter rules are unreadable: {message}")]
    UnreadableRules { child_id: String, message: String },

    #[error("child {child_id}: unsupported filter schema version {version}")]
    UnsupportedVersion { child_id: String, version: u32 },

    #[error("child {child_id}: unknown attribute '{attribute}'")]
    UnknownAttribute { child_id: String, attribute: String },

    #[error("child {child_id}: attribute '{attribute}' cannot be used in a {kind} predicate")]
    KindMismatch {
        child_id: String,
        attribute: String,
        kind: String,
    },

    #[error("child {child_id}: range on '{attribute}' has min {min} greater than max {max}")]
    InvertedRange {
        child_id: String,
        attribute: String,
        min: i64,
        max: i64,
    },

    #[error("child {child_id}: '{value}' is not a valid value for '{attribute}'")]
    InvalidValue {
        child_id: String,
        attribute: String,
        value: String,
    },
}

/// Step of a child playlist rebuild, carried by reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStep {
    DeletePlaylist,
    CreatePlaylist,
    PersistRemoteId,
    AddTracks { batch: usize },
}

impl fmt::Display for ReconcileStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileStep::DeletePlaylist => write!(f, "delete playlist"),
            ReconcileStep::CreatePlaylist => write!(f, "create playlist"),
            ReconcileStep::PersistRemoteId => write!(f, "persist remote playlist id"),
            ReconcileStep::AddTracks { batch } => write!(f, "add tracks (batch {})", batch),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
