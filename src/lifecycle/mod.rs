//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Registry::close → Shutdown::trigger
//!     → pending fetch retries return Cancelled
//!     → listener loops exit → consumers, session, connection closed
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → daemon calls Registry::close
//! ```
//!
//! # Design Decisions
//! - One latched signal per registry; every background wait selects on it
//! - Ordered shutdown: consumers, then session, then connection

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
