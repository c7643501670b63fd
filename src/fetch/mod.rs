//! Remote retrieval from the config service.
//!
//! # Data Flow
//! ```text
//! Registry::refresh
//!     → RemoteFetcher::fetch_document("{app}-default.properties")
//!     → GET {uri}/{path} (Basic auth)
//!     → failure: log, wait retry interval, repeat (until shutdown)
//!     → body bytes
//!
//! SECURE_STORE_UPDATED
//!     → RemoteFetcher::fetch_secure_material()
//!     → GET {uri}/secure-store/download → zip bytes or None
//! ```

pub mod client;

pub use client::{RemoteFetcher, SECURE_STORE_PATH};
