//! # Core Configuration Module
//!
//! Builder-based configuration for the playlist sync core.
//!
//! ## Overview
//!
//! [`CoreConfig`] carries everything the service needs at bootstrap: where the
//! SQLite database lives, how to reach the remote music API, the bridges to
//! inject (HTTP client, clock) and the [`SyncSettings`] that shape every sync.
//! Validation is fail-fast: `build()` refuses inconsistent settings instead of
//! letting a sync discover them halfway through.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, SyncSettings};
//!
//! let config = CoreConfig::builder()
//!     .database_path("/var/lib/playlist-sync/sync.db")
//!     .sync_settings(SyncSettings::default().with_public_playlists(true))
//!     .build()?;
//! ```
//!
//! Without the `desktop-shims` feature an [`HttpClient`] must be injected with
//! [`CoreConfigBuilder::http_client`]; `build()` reports
//! [`Error::CapabilityMissing`] otherwise.

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, SystemClock, MAX_PAGE_SIZE, MAX_TRACKS_PER_ADD};
use std::path::PathBuf;
use std::sync::Arc;

/// Default remote API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Banner prepended to every managed child playlist description.
pub const DEFAULT_MANAGED_BANNER: &str =
    "Managed by playlist-sync, do not edit: changes are overwritten on the next sync.";

/// Knobs for a single base playlist sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Tracks requested per listing page (1..=100)
    pub page_size: u32,
    /// URIs per add call (1..=100)
    pub add_batch_size: usize,
    /// Visibility of recreated child playlists
    pub public_playlists: bool,
    pub managed_banner: String,
    /// Upper bound for a whole sync
    pub sync_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            add_batch_size: MAX_TRACKS_PER_ADD,
            public_playlists: false,
            managed_banner: DEFAULT_MANAGED_BANNER.to_string(),
            sync_timeout_secs: 3600,
        }
    }
}

impl SyncSettings {
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_add_batch_size(mut self, batch_size: usize) -> Self {
        self.add_batch_size = batch_size;
        self
    }

    pub fn with_public_playlists(mut self, public: bool) -> Self {
        self.public_playlists = public;
        self
    }

    pub fn with_managed_banner(mut self, banner: impl Into<String>) -> Self {
        self.managed_banner = banner.into();
        self
    }

    pub fn with_sync_timeout_secs(mut self, secs: u64) -> Self {
        self.sync_timeout_secs = secs;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.add_batch_size == 0 || self.add_batch_size > MAX_TRACKS_PER_ADD {
            return Err(Error::Config(format!(
                "Add batch size must be between 1 and {}, got {}",
                MAX_TRACKS_PER_ADD, self.add_batch_size
            )));
        }

        if self.sync_timeout_secs == 0 {
            return Err(Error::Config(
                "Sync timeout must be greater than 0 seconds".to_string(),
            ));
        }

        Ok(())
    }
}

/// Core configuration for the playlist sync service.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Base URL of the remote music API
    pub api_base_url: String,

    /// Per-request timeout for the default HTTP client
    pub request_timeout_secs: u64,

    /// HTTP client used by the remote playlist connector
    pub http_client: Arc<dyn HttpClient>,

    /// Time source for sync event timestamps
    pub clock: Arc<dyn Clock>,

    pub sync: SyncSettings,

    /// Capacity of the lifecycle event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("http_client", &"HttpClient { ... }")
            .field("clock", &"Clock { ... }")
            .field("sync", &self.sync)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if !(self.api_base_url.starts_with("https://") || self.api_base_url.starts_with("http://"))
        {
            return Err(Error::Config(format!(
                "API base URL must be an http(s) URL, got '{}'",
                self.api_base_url
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "Request timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        self.sync.validate()
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout_secs: u64) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(std::time::Duration::from_secs(timeout_secs))
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout_secs: u64) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                  Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                  Other hosts: inject an adapter with CoreConfigBuilder::http_client."
            .to_string(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    sync: Option<SyncSettings>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the SQLite database path. Use `":memory:"` for an in-memory store.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    /// Injects the HTTP client. Required unless `desktop-shims` is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn sync_settings(mut self, settings: SyncSettings) -> Self {
        self.sync = Some(settings);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the final `CoreConfig`.
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let request_timeout_secs = self.request_timeout_secs.unwrap_or(30);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout_secs.max(1))?,
        };

        let config = CoreConfig {
            database_path,
            api_base_url: self
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            request_timeout_secs,
            http_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            sync: self.sync.unwrap_or_default(),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
