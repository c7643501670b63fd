//! Process-wide configuration registry.
//!
//! # Responsibilities
//! - Map every requested key to one long-lived [`ValueCell`]
//! - Merge fetched documents: decrypt, interpolate, publish
//! - Hand out [`ConfigContext`] handles and clear them on request
//! - Own the background refresher and local override watcher
//!
//! # Data Flow
//! ```text
//! init
//!     → RegistryBuilder::build (bootstrap, cipher, fetcher; no I/O)
//!     → refresh: GET {app}-default.properties
//!         → local {app}-local.properties overrides per key
//!         → merge: decrypt {cipher} → ${...} from Environment → set_shared
//!         → synthetic keys cc.home, server.hostname
//!     → gating flags → log manager refresh → RefreshCoordinator task
//!
//! close
//!     → shutdown signal (retries cancelled, listeners stop)
//!     → RefreshHandle::close (ordered teardown)
//! ```
//!
//! # Design Decisions
//! - Lookups never fail; an unknown key creates an empty cell
//! - Merges are serialized; readers never block on them
//! - Contexts are tracked weakly, so dropping a handle frees its values

pub mod cell;
pub mod context;
pub mod interpolate;
pub mod secure_store;

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use dashmap::DashMap;
use notify::RecommendedWatcher;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::environment::Environment;
use crate::config::loader::{load_bootstrap, load_local_overrides, local_override_path};
use crate::config::properties::{self, Properties};
use crate::config::schema::{
    self, BootstrapSettings, BrokerSettings, ClientOptions, RefresherFlags,
    LOCAL_WATCH_ENABLED_KEY,
};
use crate::config::watcher::LocalOverrideWatcher;
use crate::crypto::CipherGateway;
use crate::error::{ConfigError, ConfigResult};
use crate::fetch::RemoteFetcher;
use crate::lifecycle::Shutdown;
use crate::observability::log_manager::{LogReconfigurer, NoopLogManager};
use crate::observability::metrics;
use crate::refresh::{
    ChannelKind, ChannelState, ChannelStates, MessageBus, RefreshActions, RefreshCoordinator,
    RefreshHandle,
};

pub use cell::{ValueCell, View};
pub use context::{ConfigContext, ContextGuard};

use context::ContextState;
use interpolate::interpolate_environment;

pub const DEFAULT_APPLICATION_NAME: &str = "application";
pub const CC_HOME_KEY: &str = "cc.home";
pub const SERVER_HOSTNAME_KEY: &str = "server.hostname";
pub const SERVER_CONFIG_PATH_KEY: &str = "server.config.path";
pub const BOOTSTRAP_LOCATION_KEY: &str = "spring.cloud.bootstrap.location";

#[derive(Default)]
struct Background {
    refresher: Option<JoinHandle<RefreshHandle>>,
    watcher: Option<RecommendedWatcher>,
    watch_task: Option<JoinHandle<()>>,
}

/// Builder for a [`Registry`].
pub struct RegistryBuilder {
    application_name: String,
    bootstrap: Option<BootstrapSettings>,
    bootstrap_path: Option<PathBuf>,
    environment: Environment,
    cipher: Option<CipherGateway>,
    options: Option<ClientOptions>,
    log_manager: Arc<dyn LogReconfigurer>,
    message_bus: Option<Arc<dyn MessageBus>>,
}

impl RegistryBuilder {
    fn new(application_name: &str) -> Self {
        let application_name = match application_name.trim() {
            "" => DEFAULT_APPLICATION_NAME.to_string(),
            name => name.to_string(),
        };
        Self {
            application_name,
            bootstrap: None,
            bootstrap_path: None,
            environment: Environment::from_process(),
            cipher: None,
            options: None,
            log_manager: Arc::new(NoopLogManager),
            message_bus: None,
        }
    }

    /// Use these settings instead of reading a bootstrap file.
    pub fn bootstrap(mut self, settings: BootstrapSettings) -> Self {
        self.bootstrap = Some(settings);
        self
    }

    /// Read bootstrap settings from this file (`.toml` or `.properties`).
    pub fn bootstrap_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.bootstrap_path = Some(path.into());
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Defaults to a gateway keyed from `config.cipher.key`.
    pub fn cipher(mut self, cipher: CipherGateway) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Overrides options from the bootstrap file.
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn log_manager(mut self, log_manager: Arc<dyn LogReconfigurer>) -> Self {
        self.log_manager = log_manager;
        self
    }

    pub fn message_bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.message_bus = Some(bus);
        self
    }

    /// Assemble the registry without any network I/O.
    pub fn build(self) -> ConfigResult<Arc<Registry>> {
        let (bootstrap, file_options) = match self.bootstrap {
            Some(settings) => (settings, ClientOptions::default()),
            None => {
                let path = self
                    .bootstrap_path
                    .or_else(|| self.environment.get(BOOTSTRAP_LOCATION_KEY).map(PathBuf::from))
                    .ok_or_else(|| {
                        ConfigError::Bootstrap(format!(
                            "no bootstrap settings given and {} is not set",
                            BOOTSTRAP_LOCATION_KEY
                        ))
                    })?;
                let file = load_bootstrap(&path).map_err(|e| ConfigError::Bootstrap(e.to_string()))?;
                (file.bootstrap, file.client)
            }
        };
        let options = self.options.unwrap_or(file_options);

        let cipher = match self.cipher {
            Some(cipher) => cipher,
            None => CipherGateway::from_environment(&self.environment)
                .map_err(|e| ConfigError::Bootstrap(e.to_string()))?,
        };

        let shutdown = Shutdown::new();
        let fetcher = RemoteFetcher::new(&bootstrap, &cipher, &options, shutdown.clone())?;

        tracing::info!(
            application = %self.application_name,
            uri = %fetcher.base_url(),
            "Config client created"
        );

        Ok(Arc::new(Registry {
            application_name: self.application_name,
            environment: self.environment,
            cipher,
            options,
            fetcher,
            log_manager: self.log_manager,
            message_bus: self.message_bus,
            cells: DashMap::new(),
            contexts: DashMap::new(),
            merge_lock: Mutex::new(()),
            channels: ChannelStates::default(),
            background: tokio::sync::Mutex::new(Background::default()),
            shutdown,
        }))
    }

    /// Build, fetch the initial configuration and start background refresh.
    pub async fn init(self) -> ConfigResult<Arc<Registry>> {
        let registry = self.build()?;
        registry.refresh().await?;

        let flags = RefresherFlags::from_registry(&registry);
        if flags.log_manager {
            if let Err(e) = registry.refresh_loggers().await {
                tracing::error!(error = %e, "Error in refreshing loggers");
            }
        }

        if flags.any_channel() {
            registry.start_refresher(flags).await;
        } else {
            for kind in ChannelKind::ALL {
                registry.channels.insert(kind, ChannelState::Disabled);
            }
        }

        if registry.options.watch_local_overrides
            || schema::flag(&registry, LOCAL_WATCH_ENABLED_KEY, false)
        {
            registry.start_local_watch().await;
        }

        Ok(registry)
    }
}

/// The configuration registry. Share it as `Arc<Registry>`.
pub struct Registry {
    application_name: String,
    environment: Environment,
    cipher: CipherGateway,
    options: ClientOptions,
    fetcher: RemoteFetcher,
    log_manager: Arc<dyn LogReconfigurer>,
    message_bus: Option<Arc<dyn MessageBus>>,
    cells: DashMap<String, Arc<ValueCell>>,
    contexts: DashMap<Uuid, Weak<ContextState>>,
    merge_lock: Mutex<()>,
    channels: ChannelStates,
    background: tokio::sync::Mutex<Background>,
    shutdown: Shutdown,
}

impl Registry {
    pub fn builder(application_name: &str) -> RegistryBuilder {
        RegistryBuilder::new(application_name)
    }

    /// Initialize with bootstrap settings from `spring.cloud.bootstrap.location`.
    pub async fn init(application_name: &str) -> ConfigResult<Arc<Registry>> {
        Self::builder(application_name).init().await
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn cipher(&self) -> &CipherGateway {
        &self.cipher
    }

    pub fn fetcher(&self) -> &RemoteFetcher {
        &self.fetcher
    }

    /// Fetch the remote document, apply local overrides and merge.
    pub async fn refresh(&self) -> ConfigResult<()> {
        let result = self.refresh_inner().await;
        match &result {
            Ok(()) => {
                metrics::record_refresh("success");
                tracing::info!(application = %self.application_name, "Configurations refreshed");
            }
            Err(e) => {
                metrics::record_refresh("failure");
                tracing::warn!(application = %self.application_name, error = %e, "Refresh failed");
            }
        }
        result
    }

    async fn refresh_inner(&self) -> ConfigResult<()> {
        let path = format!("{}-default.properties", self.application_name);
        let body = self.fetcher.fetch_document(&path).await?;
        let mut document = properties::parse(&String::from_utf8_lossy(&body));

        if let Some(dir) = self.environment.get(SERVER_CONFIG_PATH_KEY) {
            if let Some(local) = load_local_overrides(Path::new(&dir), &self.application_name)? {
                tracing::info!(
                    keys = ?local.keys().collect::<Vec<_>>(),
                    "Configurations overridden from local file"
                );
                document.extend(local);
            }
        }

        self.merge_properties(&document);
        Ok(())
    }

    /// Merge a parsed document. See [`Registry::merge`].
    pub fn merge_properties(&self, document: &Properties) {
        self.merge(document.iter().map(|(key, value)| (key, Some(value))));
    }

    /// Publish entries into their cells.
    ///
    /// Every key gets a cell. `None` values leave an existing value untouched.
    /// Marked values are decrypted first; a value that cannot be decrypted is logged
    /// and the previous value kept. Then `${name}` placeholders are filled from the
    /// environment.
    pub fn merge<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let _guard = self.merge_lock.lock().unwrap_or_else(PoisonError::into_inner);

        for (key, value) in entries {
            let key = key.as_ref();
            let cell = self.cell(key, None);
            let Some(value) = value else {
                continue;
            };

            let plain = match self.cipher.decrypt_if_encrypted(value.as_ref()) {
                Ok(plain) => plain,
                Err(e) => {
                    tracing::error!(key, error = %e, "Cannot decrypt value, keeping previous");
                    continue;
                }
            };
            cell.set_shared(Some(interpolate_environment(&plain, &self.environment)));
        }

        self.add_default_configurations();
        metrics::record_config_keys(self.cells.len());
    }

    fn add_default_configurations(&self) {
        for key in [CC_HOME_KEY, SERVER_HOSTNAME_KEY] {
            let cell = self.cell(key, None);
            if cell.shared().is_none() {
                cell.set_shared(Some(self.environment.get(key).unwrap_or_default()));
            }
        }
    }

    fn cell(&self, key: &str, default: Option<String>) -> Arc<ValueCell> {
        if let Some(cell) = self.cells.get(key) {
            return cell.clone();
        }
        self.cells
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(ValueCell::new(key, default)))
            .clone()
    }

    /// The cell for `key`, created empty if unknown.
    pub fn get(&self, key: &str) -> Arc<ValueCell> {
        self.cell(key, None)
    }

    /// The cell for `key`, created with `default` if unknown.
    ///
    /// The default only applies on creation; an existing cell is returned as is.
    pub fn get_or<D: Display>(&self, key: &str, default: D) -> Arc<ValueCell> {
        if let Some(cell) = self.cells.get(key) {
            return cell.clone();
        }
        self.cell(key, Some(default.to_string()))
    }

    /// Snapshot of cells whose key starts with `prefix`, sorted by key.
    pub fn get_all(&self, prefix: Option<&str>) -> Vec<Arc<ValueCell>> {
        let prefix = prefix.unwrap_or("");
        let mut cells: Vec<Arc<ValueCell>> = self
            .cells
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.value().clone())
            .collect();
        cells.sort_by(|a, b| a.key().cmp(b.key()));
        cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Open a context for one unit of work.
    pub fn open_context(&self) -> ConfigContext {
        self.contexts.retain(|_, state| state.strong_count() > 0);
        let context = ConfigContext::new();
        self.contexts.insert(context.id(), context.downgrade());
        context
    }

    /// Clear `ctx` at the end of its unit of work. Other contexts keep their pins.
    pub fn clear_context(&self, ctx: &ConfigContext) {
        ctx.clear();
        self.contexts.retain(|_, state| state.strong_count() > 0);
    }

    /// Number of contexts still referenced somewhere.
    pub fn live_contexts(&self) -> usize {
        self.contexts
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    /// Download the secure material archive into `{cc.home}/server/certificates`.
    ///
    /// Returns the number of files written; 0 when nothing is published.
    pub async fn download_secure_store(&self) -> ConfigResult<usize> {
        let Some(archive) = self.fetcher.fetch_secure_material().await? else {
            return Ok(0);
        };

        let cc_home = self.get(CC_HOME_KEY).value(View::Shared).unwrap_or_default();
        let target = secure_store::certificates_dir(&cc_home);
        let written = tokio::task::spawn_blocking(move || {
            secure_store::extract_archive(&archive, &target)
        })
        .await
        .map_err(|e| ConfigError::Io(std::io::Error::other(e)))??;

        tracing::info!(files = written, "Secure stores downloaded");
        Ok(written)
    }

    /// Re-apply the remote log configuration.
    pub async fn refresh_loggers(&self) -> ConfigResult<()> {
        self.log_manager.refresh(&self.fetcher).await
    }

    /// Raw GET of a resource below the service base URL, with retry.
    pub async fn fetch_content(&self, path: &str) -> ConfigResult<bytes::Bytes> {
        self.fetcher.fetch_document(path).await
    }

    pub fn channel_state(&self, kind: ChannelKind) -> ChannelState {
        self.channels
            .get(&kind)
            .map(|state| *state)
            .unwrap_or(ChannelState::Disabled)
    }

    async fn start_refresher(self: &Arc<Self>, flags: RefresherFlags) {
        let coordinator = RefreshCoordinator::new(
            self.application_name.clone(),
            self.message_bus.clone(),
            BrokerSettings::from_registry(self),
            flags,
            RefreshActions::for_registry(self),
            self.channels.clone(),
        );
        for kind in ChannelKind::ALL {
            let state = if flags.is_enabled(kind) {
                ChannelState::Disconnected
            } else {
                ChannelState::Disabled
            };
            self.channels.insert(kind, state);
        }

        let task = tokio::spawn(coordinator.start(self.shutdown.clone()));
        self.background.lock().await.refresher = Some(task);
    }

    async fn start_local_watch(self: &Arc<Self>) {
        let Some(dir) = self.environment.get(SERVER_CONFIG_PATH_KEY) else {
            tracing::warn!("Local override watch enabled but server.config.path is not set");
            return;
        };
        let path = local_override_path(Path::new(&dir), &self.application_name);
        let (watcher, mut changes) = LocalOverrideWatcher::new(&path);
        let watcher = match watcher.run() {
            Ok(watcher) => watcher,
            Err(e) => {
                tracing::error!(path = ?path, error = %e, "Failed to watch local overrides");
                return;
            }
        };

        let registry = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = changes.recv() => {
                        if changed.is_none() {
                            break;
                        }
                        while changes.try_recv().is_ok() {}
                        let Some(registry) = registry.upgrade() else {
                            break;
                        };
                        if let Err(e) = registry.refresh().await {
                            tracing::error!(
                                error = %e,
                                "Failed to reload local overrides. Keeping current configuration."
                            );
                        }
                    }
                    _ = shutdown.wait() => break,
                }
            }
        });

        let mut background = self.background.lock().await;
        background.watcher = Some(watcher);
        background.watch_task = Some(task);
    }

    /// Stop background refresh, cancel pending fetch retries and close the bus.
    pub async fn close(&self) {
        self.shutdown.trigger();

        let (watcher, watch_task, refresher) = {
            let mut background = self.background.lock().await;
            (
                background.watcher.take(),
                background.watch_task.take(),
                background.refresher.take(),
            )
        };
        drop(watcher);
        if let Some(task) = watch_task {
            task.abort();
        }
        if let Some(refresher) = refresher {
            match refresher.await {
                Ok(handle) => handle.close().await,
                Err(e) => tracing::error!(error = %e, "Refresher task failed"),
            }
        }
        tracing::info!(application = %self.application_name, "Config client closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("application_name", &self.application_name)
            .field("keys", &self.cells.len())
            .field("fetcher", &self.fetcher)
            .finish()
    }
}
