//! Runtime configuration client.
//!
//! Fetches `{app}-default.properties` from a central config service, overlays a local
//! override file, decrypts `{cipher}` values, interpolates `${...}` placeholders and
//! keeps the result in a registry that can be refreshed live from broker
//! notifications.
//!
//! ```ignore
//! let registry = Registry::builder("console")
//!     .bootstrap_path("/opt/cc/bootstrap.toml")
//!     .init()
//!     .await?;
//!
//! let pool = registry.get_or("db.pool.size", 10).to_int(View::Shared)?;
//!
//! let ctx = registry.open_context();
//! let url = registry.get("db.url").read(View::Context(&ctx), &[registry.get("db.host")]);
//!
//! registry.close().await;
//! ```

// Core
pub mod crypto;
pub mod error;
pub mod fetch;
pub mod refresh;
pub mod registry;

// Client configuration
pub mod config;

// Cross-cutting concerns
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use crypto::{AesGcmCipher, Cipher, CipherGateway, CryptoError};
pub use error::{ConfigError, ConfigResult};
pub use fetch::RemoteFetcher;
pub use lifecycle::Shutdown;
pub use refresh::{ChannelKind, ChannelState, InMemoryBus, MessageBus};
pub use registry::{ConfigContext, Registry, RegistryBuilder, ValueCell, View};
