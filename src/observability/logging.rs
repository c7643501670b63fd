//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Keep the level filter reloadable at runtime
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the built-in default directives
//! - The filter sits behind a reload layer so the log manager can swap it

use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Handle used to replace the active level filter.
pub type LogReloadHandle = reload::Handle<EnvFilter, Registry>;

/// Build the initial filter: `RUST_LOG` if set and valid, else `default_directives`.
pub fn initial_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Install the global subscriber and return the filter reload handle.
pub fn init_logging(
    default_directives: &str,
) -> Result<LogReloadHandle, tracing_subscriber::util::TryInitError> {
    let (filter, handle) = reload::Layer::new(initial_filter(default_directives));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(handle)
}
