//! Error types shared across the client.

use thiserror::Error;

use crate::crypto::CryptoError;

/// Errors surfaced by the configuration client.
///
/// Only `Bootstrap` and `Format` are expected to reach application code during
/// normal operation. Transport trouble is retried inside the fetcher and message
/// bus trouble degrades live reload instead of failing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The client cannot start: endpoint missing or invalid, bootstrap source unreadable.
    #[error("Bootstrap error: {0}")]
    Bootstrap(String),

    /// A typed accessor could not parse the underlying value.
    #[error("Config '{key}' value {value:?} is not a valid {target}")]
    Format {
        key: String,
        value: Option<String>,
        target: &'static str,
    },

    /// A fetch retry loop was cancelled before it succeeded.
    #[error("Fetch of '{path}' cancelled")]
    Cancelled { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The secure store archive could not be read.
    #[error("Secure store archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Log manager error: {0}")]
    LogManager(String),
}

impl ConfigError {
    pub(crate) fn format(key: &str, value: Option<String>, target: &'static str) -> Self {
        Self::Format {
            key: key.to_string(),
            value,
            target,
        }
    }
}

/// Result type for configuration client operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
