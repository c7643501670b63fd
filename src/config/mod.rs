//! Client-side configuration.
//!
//! # Data Flow
//! ```text
//! bootstrap file (TOML or .properties)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (endpoint checks)
//!     → BootstrapSettings + ClientOptions
//!     → Registry::builder
//!
//! After the first refresh:
//!     registry values → schema.rs (RefresherFlags, BrokerSettings, TransportOptions)
//!
//! Local overrides:
//!     {server.config.path}/{app}-local.properties → properties.rs → merged over remote
//!     watcher.rs detects change → Registry::refresh
//! ```
//!
//! # Design Decisions
//! - Process properties (`cc.home`, `server.config.path`, ...) come from an
//!   injectable `Environment`, never read ad hoc from `std::env`
//! - All bootstrap fields have defaults; only the endpoint is required

pub mod environment;
pub mod loader;
pub mod properties;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use environment::Environment;
pub use properties::Properties;
pub use schema::{BootstrapSettings, BrokerSettings, ClientOptions, RefresherFlags, TransportOptions};
