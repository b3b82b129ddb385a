//! # Playlist Sync Engine
//!
//! Rebuilds filtered child playlists from a base playlist on the remote
//! music service.
//!
//! ## Overview
//!
//! A sync pulls every track of a base playlist, decides which tracks each
//! active child playlist keeps, and replaces each routed child's remote
//! playlist with a fresh one holding exactly those tracks. Every attempt is
//! recorded as a [`SyncEvent`].
//!
//! ## Components
//!
//! - **Sync Event State Machine** (`event`): sync attempt record with validated transitions
//! - **Repository** (`repository`): Database persistence for sync events
//! - **Track Aggregator** (`aggregator`): Paginated retrieval of a playlist's tracks
//! - **Track Router** (`router`): Filter rule evaluation, tracks to children
//! - **Sync Orchestrator** (`orchestrator`): Guarded, sequential sync workflow

pub mod aggregator;
pub mod error;
pub mod event;
pub mod orchestrator;
pub mod repository;
pub mod router;

pub use aggregator::{AggregationFailure, PlaylistTrackSet, TrackAggregator};
pub use error::{ReconcileStep, Result, RoutingError, SyncError};
pub use event::{SyncEvent, SyncEventId, SyncStatus};
pub use orchestrator::{SyncConfig, SyncOrchestrator};
pub use repository::{SqliteSyncEventRepository, SyncEventRepository};
pub use router::{CompiledRules, RoutedPlaylist, RoutingTable, TrackRouter};
