//! Bootstrap validation.
//!
//! # Responsibilities
//! - Require a config service endpoint
//! - Require an absolute http(s) URL
//!
//! # Design Decisions
//! - Pure function: BootstrapSettings → Result<Url, ValidationError>
//! - Runs before any network I/O so a bad bootstrap fails fast

use thiserror::Error;
use url::Url;

use crate::config::schema::BootstrapSettings;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Config service URI is not set")]
    MissingUri,

    #[error("Config service URI '{uri}' is invalid: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Config service URI '{uri}' must use http or https")]
    UnsupportedScheme { uri: String },
}

/// Validate the endpoint and return it parsed.
pub fn validate_bootstrap(settings: &BootstrapSettings) -> Result<Url, ValidationError> {
    let uri = settings
        .uri
        .as_deref()
        .map(str::trim)
        .filter(|uri| !uri.is_empty())
        .ok_or(ValidationError::MissingUri)?;

    let url = Url::parse(uri).map_err(|e| ValidationError::InvalidUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ValidationError::UnsupportedScheme {
            uri: uri.to_string(),
        }),
    }
}
