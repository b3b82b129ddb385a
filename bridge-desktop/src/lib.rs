//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`; one attempt per request, with opt-in
//!   transport retry on 5xx/429
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new()?);
//! let config = CoreConfig::builder()
//!     .database_path("sync.db")
//!     .http_client(http_client)
//!     .build()?;
//! ```

mod http;

pub use http::ReqwestHttpClient;
