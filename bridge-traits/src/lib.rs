//! # Host Bridge Traits
//!
//! Contracts between the sync core and the outside world.
//!
//! ## Overview
//!
//! The core never talks to the network or the system clock directly. Each
//! capability it needs is a trait defined here and implemented elsewhere:
//!
//! | Trait | Purpose | Implementation |
//! |-------|---------|----------------|
//! | [`HttpClient`](http::HttpClient) | Async HTTP, opt-in transport retry | `bridge-desktop` |
//! | [`RemotePlaylistService`](playlist::RemotePlaylistService) | Playlist read/create/delete/add | `provider-spotify` |
//! | [`Clock`](time::Clock) | Time source for sync event stamps | [`SystemClock`], [`FixedClock`] |
//! | [`LoggerSink`](time::LoggerSink) | Forward structured logs to the host | [`ConsoleLogger`](time::ConsoleLogger) |
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Implementations
//! convert their own errors into it and keep the remote status code when there
//! is one.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind an `Arc`.

pub mod error;
pub mod http;
pub mod playlist;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use playlist::{
    RemoteArtist, RemotePlaylist, RemotePlaylistService, RemoteTrack, TrackPage,
    MAX_ARTISTS_PER_LOOKUP, MAX_PAGE_SIZE, MAX_TRACKS_PER_ADD,
};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
