//! HTTP integration for services embedding the client.
//!
//! # Data Flow
//! ```text
//! request
//!     → middleware/context.rs (open ConfigContext, insert as extension)
//!     → handler reads cells with View::Context(&ctx)
//!     → response; context cleared
//! ```

pub mod middleware;

pub use middleware::config_context_middleware;
