//! Local override file watcher.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Watches the local override file and signals each change.
///
/// The parent directory is watched so the file may be created after startup.
pub struct LocalOverrideWatcher {
    path: PathBuf,
    change_tx: mpsc::UnboundedSender<()>,
}

impl LocalOverrideWatcher {
    /// Returns the watcher and a receiver that yields once per detected change.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (change_tx, change_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                change_tx,
            },
            change_rx,
        )
    }

    /// Start watching. Dropping the returned watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.change_tx;
        let path = self.path.clone();
        let file_name = path.file_name().map(|name| name.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if touches_file {
                        tracing::info!(path = ?path, "Local override change detected");
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Local override watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detects_file_creation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console-local.properties");

        let (watcher, mut rx) = LocalOverrideWatcher::new(&path);
        let _watcher = watcher.run().unwrap();

        std::fs::write(&path, "a=1\n").unwrap();
        let changed = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await;
        assert!(matches!(changed, Ok(Some(()))));
    }
}
