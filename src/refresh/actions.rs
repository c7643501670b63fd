//! Registry-backed refresh actions.
//!
//! Actions hold a weak reference so the background listeners never keep a closed
//! registry alive.

use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::error::ConfigResult;
use crate::refresh::listener::{ChannelKind, RefreshAction};
use crate::registry::Registry;

/// `CONFIG_UPDATED`: re-fetch and merge the configuration document.
pub struct ConfigRefreshAction {
    registry: Weak<Registry>,
}

#[async_trait]
impl RefreshAction for ConfigRefreshAction {
    async fn run(&self) -> ConfigResult<()> {
        match self.registry.upgrade() {
            Some(registry) => registry.refresh().await,
            None => Ok(()),
        }
    }
}

/// `LOGGER_UPDATED`: re-apply the remote log configuration.
pub struct LoggerRefreshAction {
    registry: Weak<Registry>,
}

#[async_trait]
impl RefreshAction for LoggerRefreshAction {
    async fn run(&self) -> ConfigResult<()> {
        match self.registry.upgrade() {
            Some(registry) => registry.refresh_loggers().await,
            None => Ok(()),
        }
    }
}

/// `SECURE_STORE_UPDATED`: download and extract the secure material archive.
pub struct SecureStoreRefreshAction {
    registry: Weak<Registry>,
}

#[async_trait]
impl RefreshAction for SecureStoreRefreshAction {
    async fn run(&self) -> ConfigResult<()> {
        match self.registry.upgrade() {
            Some(registry) => registry.download_secure_store().await.map(|_| ()),
            None => Ok(()),
        }
    }
}

/// The action run by each channel.
#[derive(Clone)]
pub struct RefreshActions {
    pub config: Arc<dyn RefreshAction>,
    pub logger: Arc<dyn RefreshAction>,
    pub secure_store: Arc<dyn RefreshAction>,
}

impl RefreshActions {
    pub fn for_registry(registry: &Arc<Registry>) -> Self {
        let weak = Arc::downgrade(registry);
        Self {
            config: Arc::new(ConfigRefreshAction {
                registry: weak.clone(),
            }),
            logger: Arc::new(LoggerRefreshAction {
                registry: weak.clone(),
            }),
            secure_store: Arc::new(SecureStoreRefreshAction { registry: weak }),
        }
    }

    pub fn get(&self, kind: ChannelKind) -> Arc<dyn RefreshAction> {
        match kind {
            ChannelKind::Config => self.config.clone(),
            ChannelKind::Logger => self.logger.clone(),
            ChannelKind::SecureStore => self.secure_store.clone(),
        }
    }
}
