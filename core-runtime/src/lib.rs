//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by every crate in the workspace:
//! - Logging and tracing setup
//! - Configuration management
//! - Lifecycle event bus
//!
//! ## Overview
//!
//! Nothing in here knows about playlists beyond the shape of the settings and
//! the events; the sync engine itself lives in `core-sync`.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, SyncSettings};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream, LibraryUpdate, SyncUpdate};
