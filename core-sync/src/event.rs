//! # Sync Event State Machine
//!
//! Audit record of one sync attempt for a base playlist.
//!
//! ## Overview
//!
//! A sync event is created `InProgress` when a sync passes its guard, is
//! updated in place as work is done and ends in exactly one terminal state.
//! Events are never deleted by the engine; they form the sync history.
//!
//! ## State Machine
//!
//! ```text
//! InProgress → Completed
//!     ↓
//!     └──────→ Failed
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::SyncEvent;
//!
//! let mut event = SyncEvent::start("user-1", "base-1", clock.unix_timestamp());
//! event.add_api_requests(3);
//! event.tracks_processed = 250;
//! event.record_child("child-1");
//!
//! let event = event.complete(clock.unix_timestamp())?;
//! ```

use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a sync event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncEventId(Uuid);

impl SyncEventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a sync event ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| SyncError::InvalidEventId(e.to_string()))?,
        ))
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SyncEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncEventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SyncEventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// Status Types
// ============================================================================

/// The current status of a sync event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Sync is running; at most one per base playlist
    InProgress,
    Completed,
    /// Sync aborted; `error_message` says why
    Failed,
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Completed | SyncStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::InProgress => "in_progress",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "in_progress" => Ok(SyncStatus::InProgress),
            "completed" => Ok(SyncStatus::Completed),
            "failed" => Ok(SyncStatus::Failed),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Sync Event
// ============================================================================

/// One sync attempt of a base playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub id: SyncEventId,
    pub user_id: String,
    pub base_playlist_id: String,
    /// Children whose reconciliation began, in processing order
    pub child_playlist_ids: Vec<String>,
    pub status: SyncStatus,
    /// Unix seconds
    pub started_at: i64,
    /// Unix seconds; set on entering a terminal state
    pub completed_at: Option<i64>,
    /// Tracks aggregated from the base playlist
    pub tracks_processed: u64,
    /// Every remote call attempted during the sync
    pub total_api_requests: u64,
    pub error_message: Option<String>,
    pub created_at: i64,
}

impl SyncEvent {
    /// Create an in-progress event stamped with `now` (Unix seconds).
    pub fn start(user_id: impl Into<String>, base_playlist_id: impl Into<String>, now: i64) -> Self {
        Self {
            id: SyncEventId::new(),
            user_id: user_id.into(),
            base_playlist_id: base_playlist_id.into(),
            child_playlist_ids: Vec::new(),
            status: SyncStatus::InProgress,
            started_at: now,
            completed_at: None,
            tracks_processed: 0,
            total_api_requests: 0,
            error_message: None,
            created_at: now,
        }
    }

    /// Note that reconciliation of `child_id` has begun.
    pub fn record_child(&mut self, child_id: impl Into<String>) {
        let child_id = child_id.into();
        if !self.child_playlist_ids.contains(&child_id) {
            self.child_playlist_ids.push(child_id);
        }
    }

    pub fn add_api_requests(&mut self, count: u64) {
        self.total_api_requests += count;
    }

    /// Mark the event as completed
    ///
    /// # Errors
    ///
    /// Returns an error if the event is not in progress
    pub fn complete(mut self, now: i64) -> Result<Self> {
        self.validate_transition(SyncStatus::Completed)?;
        self.status = SyncStatus::Completed;
        self.completed_at = Some(now);
        Ok(self)
    }

    /// Mark the event as failed with an error message
    ///
    /// # Errors
    ///
    /// Returns an error if the event is not in progress
    pub fn fail(mut self, error_message: impl Into<String>, now: i64) -> Result<Self> {
        self.validate_transition(SyncStatus::Failed)?;
        self.status = SyncStatus::Failed;
        self.completed_at = Some(now);
        self.error_message = Some(error_message.into());
        Ok(self)
    }

    /// Seconds between start and completion, once terminal
    pub fn duration_secs(&self) -> Option<u64> {
        self.completed_at
            .map(|end| end.saturating_sub(self.started_at).max(0) as u64)
    }

    fn validate_transition(&self, to: SyncStatus) -> Result<()> {
        let valid = matches!(
            (self.status, to),
            (SyncStatus::InProgress, SyncStatus::Completed)
                | (SyncStatus::InProgress, SyncStatus::Failed)
        );

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.status.as_str(),
                    to.as_str()
                ),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
