//! # Filter Rule Sets
//!
//! Persisted description of which base playlist tracks a child playlist keeps.
//!
//! ## Schema
//!
//! A rule set is a versioned, named list of predicates stored as JSON:
//!
//! ```json
//! {
//!   "version": 1,
//!   "name": "Popular rock",
//!   "predicates": [
//!     { "kind": "range", "attribute": "popularity", "min": 50, "max": 100 },
//!     { "kind": "set", "attribute": "genre", "include": ["rock"] }
//!   ]
//! }
//! ```
//!
//! A track matches when it satisfies every predicate. This module only owns
//! the shape; attribute names and bounds are checked when the rules are
//! compiled for routing.

use serde::{Deserialize, Serialize};

/// Current schema version written by this crate.
pub const FILTER_SCHEMA_VERSION: u32 = 1;

/// Attribute names understood by the router.
pub mod attributes {
    /// Numeric, 0-100
    pub const POPULARITY: &str = "popularity";
    /// Numeric, milliseconds
    pub const DURATION_MS: &str = "duration_ms";
    /// Categorical, union of the track's artists' genres
    pub const GENRE: &str = "genre";
    /// Categorical, artist ids
    pub const ARTIST: &str = "artist";
    /// Categorical, album id
    pub const ALBUM: &str = "album";
    /// Categorical, "true" / "false"
    pub const EXPLICIT: &str = "explicit";
}

/// Single constraint on one track attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Inclusive bounds over a numeric attribute; a missing bound is unbounded.
    Range {
        attribute: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    /// Inclusion list over a categorical attribute. An empty list matches nothing.
    Set {
        attribute: String,
        include: Vec<String>,
    },
}

impl Predicate {
    pub fn attribute(&self) -> &str {
        match self {
            Predicate::Range { attribute, .. } | Predicate::Set { attribute, .. } => attribute,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRuleSet {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub predicates: Vec<Predicate>,
}

impl Default for FilterRuleSet {
    fn default() -> Self {
        Self {
            version: FILTER_SCHEMA_VERSION,
            name: None,
            predicates: Vec::new(),
        }
    }
}

impl FilterRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn range(mut self, attribute: impl Into<String>, min: Option<i64>, max: Option<i64>) -> Self {
        self.predicates.push(Predicate::Range {
            attribute: attribute.into(),
            min,
            max,
        });
        self
    }

    pub fn include<I, S>(mut self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.predicates.push(Predicate::Set {
            attribute: attribute.into(),
            include: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Whether any predicate constrains `attribute`.
    pub fn references(&self, attribute: &str) -> bool {
        self.predicates.iter().any(|p| p.attribute() == attribute)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
