//! # Track Router
//!
//! Decides which aggregated tracks belong to which child playlist.
//!
//! Each active child's [`FilterRuleSet`] is compiled once (attribute names,
//! predicate kinds, bounds and schema version are checked here) and then
//! evaluated against every track in base playlist order. A track matches when
//! it satisfies every predicate; a child without rules takes every track.
//!
//! Routing is pure: no I/O, and any compile error rejects the whole call.

use crate::aggregator::PlaylistTrackSet;
use crate::error::RoutingError;
use bridge_traits::playlist::RemoteTrack;
use core_library::filter::{attributes, FilterRuleSet, Predicate, FILTER_SCHEMA_VERSION};
use core_library::ChildPlaylist;
use std::collections::HashSet;
use tracing::debug;

// ============================================================================
// Compiled Rules
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumericAttribute {
    Popularity,
    DurationMs,
}

impl NumericAttribute {
    fn value(self, track: &RemoteTrack) -> i64 {
        match self {
            NumericAttribute::Popularity => i64::from(track.popularity),
            NumericAttribute::DurationMs => i64::try_from(track.duration_ms).unwrap_or(i64::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CompiledPredicate {
    Range {
        attribute: NumericAttribute,
        min: Option<i64>,
        max: Option<i64>,
    },
    /// Lowercased genres
    Genre(HashSet<String>),
    Artist(HashSet<String>),
    Album(HashSet<String>),
    Explicit(HashSet<bool>),
}

impl CompiledPredicate {
    fn matches(&self, track: &RemoteTrack, set: &PlaylistTrackSet) -> bool {
        match self {
            CompiledPredicate::Range { attribute, min, max } => {
                let value = attribute.value(track);
                min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
            }
            CompiledPredicate::Genre(include) => set
                .genres_of(track)
                .any(|genre| include.contains(&genre.to_lowercase())),
            CompiledPredicate::Artist(include) => {
                track.artist_ids.iter().any(|id| include.contains(id))
            }
            CompiledPredicate::Album(include) => track
                .album_id
                .as_ref()
                .map_or(false, |album| include.contains(album)),
            CompiledPredicate::Explicit(include) => include.contains(&track.explicit),
        }
    }
}

/// A child's filter rules, validated and ready to evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRules {
    child_id: String,
    predicates: Vec<CompiledPredicate>,
}

impl CompiledRules {
    /// Validate `rules` for `child_id`. `None` compiles to a pass-through.
    pub fn compile(child_id: &str, rules: Option<&FilterRuleSet>) -> Result<Self, RoutingError> {
        let predicates = match rules {
            None => Vec::new(),
            Some(rules) => {
                if rules.version != FILTER_SCHEMA_VERSION {
                    return Err(RoutingError::UnsupportedVersion {
                        child_id: child_id.to_string(),
                        version: rules.version,
                    });
                }
                rules
                    .predicates
                    .iter()
                    .map(|p| compile_predicate(child_id, p))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(Self {
            child_id: child_id.to_string(),
            predicates,
        })
    }

    pub fn child_id(&self) -> &str {
        &self.child_id
    }

    pub fn is_pass_through(&self) -> bool {
        self.predicates.is_empty()
    }

    /// True when every predicate holds for `track`.
    pub fn matches(&self, track: &RemoteTrack, set: &PlaylistTrackSet) -> bool {
        self.predicates.iter().all(|p| p.matches(track, set))
    }
}

fn compile_predicate(child_id: &str, predicate: &Predicate) -> Result<CompiledPredicate, RoutingError> {
    match predicate {
        Predicate::Range { attribute, min, max } => {
            let numeric = match attribute.as_str() {
                attributes::POPULARITY => NumericAttribute::Popularity,
                attributes::DURATION_MS => NumericAttribute::DurationMs,
                other => return Err(unsupported(child_id, other, "range")),
            };
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(RoutingError::InvertedRange {
                        child_id: child_id.to_string(),
                        attribute: attribute.clone(),
                        min: *min,
                        max: *max,
                    });
                }
            }
            Ok(CompiledPredicate::Range {
                attribute: numeric,
                min: *min,
                max: *max,
            })
        }
        Predicate::Set { attribute, include } => match attribute.as_str() {
            attributes::GENRE => Ok(CompiledPredicate::Genre(
                include.iter().map(|g| g.trim().to_lowercase()).collect(),
            )),
            attributes::ARTIST => Ok(CompiledPredicate::Artist(include.iter().cloned().collect())),
            attributes::ALBUM => Ok(CompiledPredicate::Album(include.iter().cloned().collect())),
            attributes::EXPLICIT => include
                .iter()
                .map(|value| match value.trim().to_lowercase().as_str() {
                    "true" => Ok(true),
                    "false" => Ok(false),
                    _ => Err(RoutingError::InvalidValue {
                        child_id: child_id.to_string(),
                        attribute: attribute.clone(),
                        value: value.clone(),
                    }),
                })
                .collect::<Result<HashSet<_>, _>>()
                .map(CompiledPredicate::Explicit),
            other => Err(unsupported(child_id, other, "set")),
        },
    }
}

fn unsupported(child_id: &str, attribute: &str, kind: &str) -> RoutingError {
    let known = [
        attributes::POPULARITY,
        attributes::DURATION_MS,
        attributes::GENRE,
        attributes::ARTIST,
        attributes::ALBUM,
        attributes::EXPLICIT,
    ];
    if known.contains(&attribute) {
        RoutingError::KindMismatch {
            child_id: child_id.to_string(),
            attribute: attribute.to_string(),
            kind: kind.to_string(),
        }
    } else {
        RoutingError::UnknownAttribute {
            child_id: child_id.to_string(),
            attribute: attribute.to_string(),
        }
    }
}

// ============================================================================
// Routing Table
// ============================================================================

/// Tracks routed to one child playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedPlaylist {
    pub child_id: String,
    /// Remote playlist the child currently points at; `None` before its first sync
    pub remote_playlist_id: Option<String>,
    /// Matching track URIs in base playlist order; never empty
    pub track_uris: Vec<String>,
}

/// Routing result, ordered like the children it was built from.
///
/// Children without a single matching track have no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    entries: Vec<RoutedPlaylist>,
}

impl RoutingTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoutedPlaylist> {
        self.entries.iter()
    }

    pub fn for_child(&self, child_id: &str) -> Option<&RoutedPlaylist> {
        self.entries.iter().find(|e| e.child_id == child_id)
    }

    /// Entry keyed by the child's current remote playlist id.
    pub fn for_remote_playlist(&self, remote_playlist_id: &str) -> Option<&RoutedPlaylist> {
        self.entries
            .iter()
            .find(|e| e.remote_playlist_id.as_deref() == Some(remote_playlist_id))
    }

    /// Sum of routed URIs over every child.
    pub fn total_routed(&self) -> usize {
        self.entries.iter().map(|e| e.track_uris.len()).sum()
    }
}

impl IntoIterator for RoutingTable {
    type Item = RoutedPlaylist;
    type IntoIter = std::vec::IntoIter<RoutedPlaylist>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// ============================================================================
// Router
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct TrackRouter;

impl TrackRouter {
    pub fn new() -> Self {
        Self
    }

    /// Whether any active child filters on genre, which requires artist
    /// genres to be resolved before routing.
    pub fn requires_genres(children: &[ChildPlaylist]) -> bool {
        children.iter().filter(|c| c.is_active).any(|c| {
            c.filter_rules
                .as_ref()
                .map_or(false, |rules| rules.references(attributes::GENRE))
        })
    }

    /// Route every track of `set` to the active children it matches.
    ///
    /// # Errors
    ///
    /// Returns the first [`RoutingError`] met while compiling rules; no
    /// partial table is produced.
    pub fn route(
        &self,
        set: &PlaylistTrackSet,
        children: &[ChildPlaylist],
    ) -> Result<RoutingTable, RoutingError> {
        let compiled = children
            .iter()
            .filter(|c| c.is_active)
            .map(|c| {
                CompiledRules::compile(&c.id, c.filter_rules.as_ref())
                    .map(|rules| (c, rules))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(compiled.len());
        for (child, rules) in compiled {
            let track_uris: Vec<String> = set
                .tracks
                .iter()
                .filter(|track| rules.matches(track, set))
                .map(|track| track.uri.clone())
                .collect();

            debug!(
                child_id = %child.id,
                matched = track_uris.len(),
                pass_through = rules.is_pass_through(),
                "Routed child playlist"
            );

            if !track_uris.is_empty() {
                entries.push(RoutedPlaylist {
                    child_id: child.id.clone(),
                    remote_playlist_id: child.remote_playlist_id.clone(),
                    track_uris,
                });
            }
        }

        Ok(RoutingTable { entries })
    }
}
