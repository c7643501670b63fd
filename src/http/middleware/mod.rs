//! Axum middleware for services that read configuration per request.

pub mod context;

pub use context::config_context_middleware;
