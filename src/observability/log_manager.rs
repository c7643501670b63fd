//! Remote log level management.
//!
//! The config service publishes logger settings at `logger-config/get` as a JSON array
//! of filter directive lists (`["info", "config_client::refresh=debug"]`). A local file
//! `{server.config.path}/logging-local.filter` can add directives on top.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing_subscriber::EnvFilter;

use crate::error::{ConfigError, ConfigResult};
use crate::fetch::RemoteFetcher;
use crate::observability::logging::LogReloadHandle;

pub const LOGGER_CONFIG_PATH: &str = "logger-config/get";
pub const LOCAL_FILTER_FILE: &str = "logging-local.filter";

/// Reconfigures logging from the config service.
#[async_trait]
pub trait LogReconfigurer: Send + Sync {
    async fn refresh(&self, fetcher: &RemoteFetcher) -> ConfigResult<()>;
}

/// Does nothing. Used when no log manager is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogManager;

#[async_trait]
impl LogReconfigurer for NoopLogManager {
    async fn refresh(&self, _fetcher: &RemoteFetcher) -> ConfigResult<()> {
        Ok(())
    }
}

/// Swaps the `EnvFilter` of the global subscriber.
pub struct FilterLogManager {
    handle: LogReloadHandle,
    local_filter: Option<PathBuf>,
}

impl FilterLogManager {
    pub fn new(handle: LogReloadHandle) -> Self {
        Self {
            handle,
            local_filter: None,
        }
    }

    /// Also read directives from `{config_dir}/logging-local.filter`.
    pub fn with_local_filter(mut self, config_dir: &Path) -> Self {
        self.local_filter = Some(config_dir.join(LOCAL_FILTER_FILE));
        self
    }

    fn local_directives(&self) -> ConfigResult<Vec<String>> {
        let Some(path) = &self.local_filter else {
            return Ok(Vec::new());
        };
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(parse_filter_file(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }
}

#[async_trait]
impl LogReconfigurer for FilterLogManager {
    async fn refresh(&self, fetcher: &RemoteFetcher) -> ConfigResult<()> {
        let body = fetcher.fetch_document(LOGGER_CONFIG_PATH).await?;
        let mut directives = parse_remote_directives(&body)?;
        directives.extend(self.local_directives()?);

        let filter = build_filter(&directives)?;
        let rendered = filter.to_string();
        self.handle
            .reload(filter)
            .map_err(|e| ConfigError::LogManager(e.to_string()))?;

        tracing::info!(filter = %rendered, "Log filter reloaded");
        Ok(())
    }
}

/// Decode the remote JSON array of directive lists.
pub fn parse_remote_directives(body: &[u8]) -> ConfigResult<Vec<String>> {
    let entries: Vec<String> = serde_json::from_slice(body)
        .map_err(|e| ConfigError::LogManager(format!("invalid logger config: {}", e)))?;
    Ok(entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect())
}

/// One directive list per non-comment line.
pub fn parse_filter_file(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Join directive lists into one filter. An empty list yields `info`.
pub fn build_filter(directives: &[String]) -> ConfigResult<EnvFilter> {
    if directives.is_empty() {
        return Ok(EnvFilter::new("info"));
    }
    EnvFilter::try_new(directives.join(","))
        .map_err(|e| ConfigError::LogManager(format!("invalid filter directive: {}", e)))
}
