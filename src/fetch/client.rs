//! HTTP client for the config service.
//!
//! # Responsibilities
//! - Build authenticated GET requests against the service base URL
//! - Retry transport failures and error statuses forever at a fixed interval
//! - Stop retrying when the registry shuts down
//!
//! # Design Decisions
//! - Every response body is read before the next attempt so connections are reused
//! - "No secure material" (404, 204, empty body) is a normal result, not a retry

use bytes::Bytes;
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::schema::{BootstrapSettings, ClientOptions};
use crate::config::validation::validate_bootstrap;
use crate::crypto::CipherGateway;
use crate::error::{ConfigError, ConfigResult};
use crate::lifecycle::Shutdown;
use crate::resilience::RetryPolicy;

/// Path of the secure material archive.
pub const SECURE_STORE_PATH: &str = "secure-store/download";

/// Failure of a single attempt. Always retried.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),
}

/// Outcome of one secure-material attempt.
enum Material {
    Present(Bytes),
    Absent,
}

/// Authenticated, retrying reader of config service resources.
#[derive(Clone)]
pub struct RemoteFetcher {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    retry: RetryPolicy,
    shutdown: Shutdown,
}

impl RemoteFetcher {
    /// Build a fetcher. The password is decrypted here if it carries the cipher marker.
    pub fn new(
        bootstrap: &BootstrapSettings,
        cipher: &CipherGateway,
        options: &ClientOptions,
        shutdown: Shutdown,
    ) -> ConfigResult<Self> {
        let url = validate_bootstrap(bootstrap).map_err(|e| ConfigError::Bootstrap(e.to_string()))?;

        let password = cipher
            .decrypt_if_encrypted(&bootstrap.password)
            .map_err(|e| ConfigError::Bootstrap(format!("cannot decrypt password: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(options.request_timeout())
            .build()
            .map_err(|e| ConfigError::Bootstrap(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: url.as_str().trim_end_matches('/').to_string(),
            username: bootstrap.username.clone(),
            password,
            retry: RetryPolicy::fixed(options.retry_interval()),
            shutdown,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of a resource below the base URL.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET a document, retrying until it is served with a success status.
    pub async fn fetch_document(&self, path: &str) -> ConfigResult<Bytes> {
        let url = self.url_for(path);
        tracing::debug!(url = %url, "Fetching document");
        let url = url.as_str();

        self.retry
            .run(path, &self.shutdown, move || async move {
                let response = self.send(url).await?;
                let status = response.status();
                let body = response.bytes().await?;
                if status.is_success() {
                    Ok(body)
                } else {
                    Err(AttemptError::Status(status))
                }
            })
            .await
            .map_err(|cancelled| {
                tracing::info!(path, attempts = cancelled.attempts, "Fetch cancelled");
                ConfigError::Cancelled {
                    path: path.to_string(),
                }
            })
    }

    /// GET the secure material archive. `Ok(None)` when the service has none.
    pub async fn fetch_secure_material(&self) -> ConfigResult<Option<Bytes>> {
        let url = self.url_for(SECURE_STORE_PATH);
        let url = url.as_str();

        let material = self
            .retry
            .run(SECURE_STORE_PATH, &self.shutdown, move || async move {
                let response = self.send(url).await?;
                let status = response.status();
                let body = response.bytes().await?;
                match status {
                    StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => Ok(Material::Absent),
                    s if s.is_success() && body.is_empty() => Ok(Material::Absent),
                    s if s.is_success() => Ok(Material::Present(body)),
                    s => Err(AttemptError::Status(s)),
                }
            })
            .await
            .map_err(|_| ConfigError::Cancelled {
                path: SECURE_STORE_PATH.to_string(),
            })?;

        match material {
            Material::Present(body) => Ok(Some(body)),
            Material::Absent => {
                tracing::info!("No secure material published");
                Ok(None)
            }
        }
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, AttemptError> {
        let mut request = self.client.get(url);
        if !self.username.is_empty() || !self.password.is_empty() {
            request = request.basic_auth(&self.username, Some(&self.password));
        }
        Ok(request.send().await?)
    }
}

impl std::fmt::Debug for RemoteFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFetcher")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bootstrap(uri: &str) -> BootstrapSettings {
        BootstrapSettings {
            uri: Some(uri.to_string()),
            username: "svc".to_string(),
            password: "pw".to_string(),
        }
    }

    #[test]
    fn test_url_for_joins_single_slash() {
        let fetcher = RemoteFetcher::new(
            &bootstrap("http://localhost:8888/config-service/"),
            &CipherGateway::disabled(),
            &ClientOptions::default(),
            Shutdown::new(),
        )
        .unwrap();
        assert_eq!(
            fetcher.url_for("console-default.properties"),
            "http://localhost:8888/config-service/console-default.properties"
        );
        assert_eq!(
            fetcher.url_for("/secure-store/download"),
            "http://localhost:8888/config-service/secure-store/download"
        );
    }

    #[test]
    fn test_rejects_bad_bootstrap() {
        let err = RemoteFetcher::new(
            &BootstrapSettings::default(),
            &CipherGateway::disabled(),
            &ClientOptions::default(),
            Shutdown::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Bootstrap(_)));
    }

    #[test]
    fn test_encrypted_password_requires_key() {
        let mut settings = bootstrap("http://localhost:8888");
        settings.password = "{cipher}AAAA".to_string();
        let err = RemoteFetcher::new(
            &settings,
            &CipherGateway::disabled(),
            &ClientOptions::default(),
            Shutdown::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Bootstrap(_)));
    }

    #[test]
    fn test_debug_hides_password() {
        let fetcher = RemoteFetcher::new(
            &bootstrap("http://localhost:8888"),
            &CipherGateway::disabled(),
            &ClientOptions::default(),
            Shutdown::new(),
        )
        .unwrap();
        assert!(!format!("{:?}", fetcher).contains("pw"));
    }
}
