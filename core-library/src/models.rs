//! Domain models for the playlist record store
//!
//! Base playlists point at a remote playlist whose tracks are redistributed;
//! child playlists own a remote playlist that is rebuilt from their filter rules.

use crate::error::LibraryError;
use crate::filter::FilterRuleSet;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// Base Playlist
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BasePlaylist {
    pub id: String,
    /// Owner; every lookup is scoped by it
    pub user_id: String,
    /// Display name, used in child playlist names
    pub name: String,
    /// Playlist on the remote service whose tracks are aggregated
    pub remote_playlist_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BasePlaylist {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        remote_playlist_id: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            name: name.into(),
            remote_playlist_id: remote_playlist_id.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() {
            return Err("Base playlist owner cannot be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("Base playlist name cannot be empty".to_string());
        }
        if self.remote_playlist_id.trim().is_empty() {
            return Err("Base playlist remote id cannot be empty".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Child Playlist
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildPlaylist {
    pub id: String,
    pub user_id: String,
    pub base_playlist_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Current remote playlist; replaced on every sync that routes tracks here
    pub remote_playlist_id: Option<String>,
    /// `None` keeps every base playlist track
    pub filter_rules: Option<FilterRuleSet>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ChildPlaylist {
    pub fn new(
        user_id: impl Into<String>,
        base_playlist_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            base_playlist_id: base_playlist_id.into(),
            name: name.into(),
            description: None,
            remote_playlist_id: None,
            filter_rules: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_filter_rules(mut self, rules: FilterRuleSet) -> Self {
        self.filter_rules = Some(rules);
        self
    }

    pub fn with_remote_playlist_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_playlist_id = Some(remote_id.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() {
            return Err("Child playlist owner cannot be empty".to_string());
        }
        if self.base_playlist_id.trim().is_empty() {
            return Err("Child playlist must reference a base playlist".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("Child playlist name cannot be empty".to_string());
        }
        Ok(())
    }

    /// Filter rules serialized for storage.
    pub(crate) fn filter_rules_json(&self) -> crate::Result<Option<String>> {
        self.filter_rules
            .as_ref()
            .map(|rules| {
                rules.to_json().map_err(|e| LibraryError::InvalidFilterRules {
                    child_id: self.id.clone(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }
}

/// Row shape of `child_playlists`; rules are still raw JSON.
#[derive(Debug, FromRow)]
pub(crate) struct ChildPlaylistRow {
    pub id: String,
    pub user_id: String,
    pub base_playlist_id: String,
    pub name: String,
    pub description: Option<String>,
    pub remote_playlist_id: Option<String>,
    pub filter_rules: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<ChildPlaylistRow> for ChildPlaylist {
    type Error = LibraryError;

    fn try_from(row: ChildPlaylistRow) -> Result<Self, Self::Error> {
        let filter_rules = match row.filter_rules.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(json) => Some(FilterRuleSet::from_json(json).map_err(|e| {
                LibraryError::InvalidFilterRules {
                    child_id: row.id.clone(),
                    message: e.to_string(),
                }
            })?),
        };

        Ok(ChildPlaylist {
            id: row.id,
            user_id: row.user_id,
            base_playlist_id: row.base_playlist_id,
            name: row.name,
            description: row.description,
            remote_playlist_id: row.remote_playlist_id,
            filter_rules,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::attributes;

    fn row(filter_rules: Option<&str>) -> ChildPlaylistRow {
        ChildPlaylistRow {
            id: "child-1".to_string(),
            user_id: "user-1".to_string(),
            base_playlist_id: "base-1".to_string(),
            name: "Chill".to_string(),
            description: None,
            remote_playlist_id: Some("remote-1".to_string()),
            filter_rules: filter_rules.map(str::to_string),
            is_active: true,
            created_at: 1,
            updated_at: 1,
        }
    }

    #[test]
    fn test_base_playlist_validation() {
        let base = BasePlaylist::new("user-1", "Everything", "37i9dQZF1DXcBWIGoYBM5M");
        assert!(base.validate().is_ok());

        let mut invalid = base.clone();
        invalid.name = "  ".to_string();
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_child_playlist_builder() {
        let rules = FilterRuleSet::new().range(attributes::POPULARITY, Some(50), None);
        let child = ChildPlaylist::new("user-1", "base-1", "Popular")
            .with_description("Only the hits")
            .with_filter_rules(rules.clone())
            .with_remote_playlist_id("remote-9");

        assert!(child.is_active);
        assert_eq!(child.description.as_deref(), Some("Only the hits"));
        assert_eq!(child.filter_rules, Some(rules));
        assert_eq!(child.remote_playlist_id.as_deref(), Some("remote-9"));
        assert!(child.validate().is_ok());
        assert!(!child.inactive().is_active);
    }

    #[test]
    fn test_row_without_rules_is_pass_through() {
        let child = ChildPlaylist::try_from(row(None)).unwrap();
        assert!(child.filter_rules.is_none());

        let child = ChildPlaylist::try_from(row(Some("  "))).unwrap();
        assert!(child.filter_rules.is_none());
    }

    #[test]
    fn test_row_with_unreadable_rules_is_rejected() {
        let err = ChildPlaylist::try_from(row(Some("{\"version\":"))).unwrap_err();
        assert!(matches!(
            err,
            LibraryError::InvalidFilterRules { ref child_id, .. } if child_id == "child-1"
        ));
    }
}
