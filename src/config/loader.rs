//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::config::properties::{self, Properties};
use crate::config::schema::{BootstrapSettings, ClientOptions};

/// Error type for bootstrap loading.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Layout of a TOML bootstrap file.
///
/// ```toml
/// [bootstrap]
/// uri = "https://cc.example.com/config-service"
/// username = "config-client"
/// password = "{cipher}..."
///
/// [client]
/// retry_interval_ms = 5000
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BootstrapFile {
    pub bootstrap: BootstrapSettings,
    pub client: ClientOptions,
}

/// Load bootstrap settings from a `.toml` or `.properties` file.
///
/// Any extension other than `toml` is read as a property file.
pub fn load_bootstrap(path: &Path) -> Result<BootstrapFile, LoaderError> {
    let content = fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if path.extension().is_some_and(|ext| ext == "toml") {
        return toml::from_str(&content).map_err(LoaderError::Parse);
    }

    Ok(BootstrapFile {
        bootstrap: BootstrapSettings::from_properties(&properties::parse(&content)),
        client: ClientOptions::default(),
    })
}

/// Path of the per-application local override file.
pub fn local_override_path(config_dir: &Path, application_name: &str) -> PathBuf {
    config_dir.join(format!("{}-local.properties", application_name))
}

/// Read the local override file. A missing file is `Ok(None)`.
pub fn load_local_overrides(
    config_dir: &Path,
    application_name: &str,
) -> std::io::Result<Option<Properties>> {
    let path = local_override_path(config_dir, application_name);
    match properties::load(&path) {
        Ok(props) => Ok(Some(props)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_toml_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bootstrap.toml");
        fs::write(
            &path,
            "[bootstrap]\nuri = \"http://localhost:8888/config\"\nusername = \"svc\"\n\n[client]\nretry_interval_ms = 250\n",
        )
        .unwrap();

        let file = load_bootstrap(&path).unwrap();
        assert_eq!(file.bootstrap.uri.as_deref(), Some("http://localhost:8888/config"));
        assert_eq!(file.bootstrap.username, "svc");
        assert_eq!(file.bootstrap.password, "");
        assert_eq!(file.client.retry_interval_ms, 250);
        assert_eq!(file.client.request_timeout_secs, 30);
    }

    #[test]
    fn test_load_properties_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bootstrap.properties");
        fs::write(&path, "spring.cloud.config.uri=http://localhost:8888/config\n").unwrap();

        let file = load_bootstrap(&path).unwrap();
        assert_eq!(file.bootstrap.uri.as_deref(), Some("http://localhost:8888/config"));
        assert_eq!(file.client.retry_interval_ms, 5000);
    }

    #[test]
    fn test_missing_bootstrap_file() {
        let err = load_bootstrap(Path::new("/nonexistent/bootstrap.toml")).unwrap_err();
        assert!(matches!(err, LoaderError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/bootstrap.toml"));
    }

    #[test]
    fn test_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bootstrap.toml");
        fs::write(&path, "[bootstrap\nuri = 1").unwrap();
        assert!(matches!(load_bootstrap(&path), Err(LoaderError::Parse(_))));
    }

    #[test]
    fn test_local_overrides() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_local_overrides(dir.path(), "console").unwrap().is_none());

        fs::write(local_override_path(dir.path(), "console"), "b=3\nc=4\n").unwrap();
        let props = load_local_overrides(dir.path(), "console").unwrap().unwrap();
        assert_eq!(props["b"], "3");
        assert_eq!(props["c"], "4");
    }
}
