//! # Spotify Provider
//!
//! Implements `RemotePlaylistService` for the Spotify Web API.
//!
//! ## Overview
//!
//! This module provides:
//! - Paginated playlist track listing
//! - Playlist creation, unfollow (delete) and track appends
//! - Batched artist lookup for genre data
//!
//! The connector receives an already valid access token. Token refresh is the
//! host's responsibility.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::SpotifyConnector;
pub use error::{Result, SpotifyError};
