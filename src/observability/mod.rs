//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, reloadable filter)
//!     → metrics.rs (counters, gauges)
//!
//! Remote control:
//!     LOGGER_UPDATED / init → log_manager.rs → logger-config/get → filter reload
//! ```
//!
//! # Design Decisions
//! - Structured fields rather than formatted messages
//! - Metrics are cheap (atomic increments) and off until an exporter is installed

pub mod log_manager;
pub mod logging;
pub mod metrics;

pub use log_manager::{FilterLogManager, LogReconfigurer, NoopLogManager};
