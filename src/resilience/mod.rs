//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Fetch from config service:
//!     → reqwest client timeout (per attempt deadline)
//!     → On failure: retries.rs (log, wait fixed interval, try again)
//!     → On shutdown: RetryCancelled → ConfigError::Cancelled
//! ```
//!
//! # Design Decisions
//! - Every HTTP attempt has a deadline
//! - Retrying never gives up on its own; only shutdown stops it

pub mod retries;

pub use retries::{RetryCancelled, RetryPolicy};
