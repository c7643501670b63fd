//! Refresh coordinator.
//!
//! # Responsibilities
//! - Decide which channels run, based on the gating flags and broker settings
//! - Connect once, open one session, subscribe one consumer per enabled channel
//! - Spawn a listener task per consumer
//! - Tear everything down in order on close
//!
//! # Channel states
//! ```text
//! Disabled      flag off, or no broker URL / no bus (terminal)
//! Disconnected  enabled but connect or subscribe failed (never retried)
//! Subscribed    listener running
//! Closed        consumer closed during shutdown
//! ```
//!
//! # Design Decisions
//! - Bus failures degrade live reload; they never fail the host process
//! - Each close step is guarded on its own so one failure cannot skip the rest

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::task::JoinHandle;

use crate::config::schema::{BrokerSettings, RefresherFlags};
use crate::lifecycle::Shutdown;
use crate::refresh::actions::RefreshActions;
use crate::refresh::bus::{BusConnection, BusConsumer, BusSession, MessageBus};
use crate::refresh::listener::{ChangeListener, ChannelKind};

const LISTENER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disabled,
    Disconnected,
    Subscribed,
    Closed,
}

/// Live channel states, shared with the registry.
pub type ChannelStates = Arc<DashMap<ChannelKind, ChannelState>>;

pub struct RefreshCoordinator {
    application_name: String,
    bus: Option<Arc<dyn MessageBus>>,
    settings: BrokerSettings,
    flags: RefresherFlags,
    actions: RefreshActions,
    states: ChannelStates,
}

impl RefreshCoordinator {
    pub fn new(
        application_name: impl Into<String>,
        bus: Option<Arc<dyn MessageBus>>,
        settings: BrokerSettings,
        flags: RefresherFlags,
        actions: RefreshActions,
        states: ChannelStates,
    ) -> Self {
        Self {
            application_name: application_name.into(),
            bus,
            settings,
            flags,
            actions,
            states,
        }
    }

    /// Connect and subscribe. Always returns a handle, even when nothing started.
    pub async fn start(self, shutdown: Shutdown) -> RefreshHandle {
        tracing::info!(
            config = self.flags.config,
            logger = self.flags.logger,
            secure_store = self.flags.secure_store,
            "Starting refresher"
        );

        let mut handle = RefreshHandle::new(self.states.clone());
        for kind in ChannelKind::ALL {
            let state = if self.flags.is_enabled(kind) {
                ChannelState::Disconnected
            } else {
                ChannelState::Disabled
            };
            self.states.insert(kind, state);
        }

        if !self.settings.is_configured() {
            tracing::info!("Broker URL is empty and refresher will not be started");
            self.disable_all();
            return handle;
        }
        let Some(bus) = self.bus.clone() else {
            tracing::warn!("No message bus configured and refresher will not be started");
            self.disable_all();
            return handle;
        };

        tracing::debug!(
            broker_url = %self.settings.url,
            ssl = self.settings.ssl_enabled,
            transport = ?self.settings.transport,
            "Connecting to broker"
        );

        let connection = match bus.connect(&self.settings).await {
            Ok(connection) => connection,
            Err(e) => {
                tracing::error!(
                    broker_url = %self.settings.url,
                    application = %self.application_name,
                    error = %e,
                    "Error in initializing configuration refresher. Configuration changes will not be refreshed"
                );
                return handle;
            }
        };

        let session = match connection.create_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "Error in creating broker session");
                handle.connection = Some(connection);
                return handle;
            }
        };

        for kind in ChannelKind::ALL {
            if !self.flags.is_enabled(kind) {
                continue;
            }
            let topic = self.settings.topic(kind, &self.application_name);
            match session.subscribe(&topic).await {
                Ok(consumer) => {
                    let listener = ChangeListener::new(kind, self.actions.get(kind));
                    let task_consumer = consumer.clone();
                    let task_shutdown = shutdown.clone();
                    handle.tasks.push(tokio::spawn(async move {
                        listener.run(task_consumer, task_shutdown).await;
                    }));
                    handle.consumers.push((kind, consumer));
                    self.states.insert(kind, ChannelState::Subscribed);
                    tracing::info!(channel = %kind, topic = %topic, "Subscribed to update topic");
                }
                Err(e) => {
                    tracing::error!(
                        channel = %kind,
                        topic = %topic,
                        error = %e,
                        "Error in subscribing to update topic"
                    );
                }
            }
        }

        handle.session = Some(session);
        handle.connection = Some(connection);
        tracing::info!("Configuration refresher started and listening for configuration updates");
        handle
    }

    fn disable_all(&self) {
        for kind in ChannelKind::ALL {
            self.states.insert(kind, ChannelState::Disabled);
        }
    }
}

/// Owns the bus objects and listener tasks of a started coordinator.
pub struct RefreshHandle {
    connection: Option<Box<dyn BusConnection>>,
    session: Option<Box<dyn BusSession>>,
    consumers: Vec<(ChannelKind, Arc<dyn BusConsumer>)>,
    tasks: Vec<JoinHandle<()>>,
    states: ChannelStates,
}

impl RefreshHandle {
    fn new(states: ChannelStates) -> Self {
        Self {
            connection: None,
            session: None,
            consumers: Vec::new(),
            tasks: Vec::new(),
            states,
        }
    }

    /// Channels with a live consumer.
    pub fn subscribed(&self) -> Vec<ChannelKind> {
        self.consumers.iter().map(|(kind, _)| *kind).collect()
    }

    /// Close consumers, then the session, then the connection, then join listeners.
    pub async fn close(mut self) {
        for (kind, consumer) in self.consumers.drain(..) {
            match consumer.close().await {
                Ok(()) => tracing::info!(channel = %kind, "Update consumer closed"),
                Err(e) => tracing::error!(channel = %kind, error = %e, "Error in closing update consumer"),
            }
            self.states.insert(kind, ChannelState::Closed);
        }

        if let Some(session) = self.session.take() {
            match session.close().await {
                Ok(()) => tracing::info!("Session closed"),
                Err(e) => tracing::error!(error = %e, "Error in closing the broker session"),
            }
        }

        if let Some(connection) = self.connection.take() {
            match connection.close().await {
                Ok(()) => tracing::info!("Connection closed"),
                Err(e) => tracing::error!(error = %e, "Error in closing the broker connection"),
            }
        }

        let tasks: Vec<JoinHandle<()>> = self.tasks.drain(..).collect();
        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();
        if tokio::time::timeout(LISTENER_STOP_TIMEOUT, join_all(tasks)).await.is_err() {
            tracing::warn!("Listeners did not stop in time, aborting");
            for abort in aborts {
                abort.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigResult;
    use crate::refresh::listener::RefreshAction;
    use crate::refresh::memory::{BusObject, InMemoryBus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl RefreshAction for Counting {
        async fn run(&self) -> ConfigResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn actions() -> (RefreshActions, Arc<Counting>) {
        let config = Arc::new(Counting::default());
        let noop: Arc<dyn RefreshAction> = Arc::new(Counting::default());
        (
            RefreshActions {
                config: config.clone(),
                logger: noop.clone(),
                secure_store: noop,
            },
            config,
        )
    }

    fn settings(url: &str) -> BrokerSettings {
        BrokerSettings {
            url: url.to_string(),
            config_topic: crate::config::schema::DEFAULT_CONFIG_TOPIC.to_string(),
            logger_topic: crate::config::schema::DEFAULT_LOGGER_TOPIC.to_string(),
            secure_store_topic: crate::config::schema::DEFAULT_SECURE_STORE_TOPIC.to_string(),
            ..Default::default()
        }
    }

    fn flags() -> RefresherFlags {
        RefresherFlags {
            log_manager: false,
            config: true,
            logger: false,
            secure_store: true,
        }
    }

    #[tokio::test]
    async fn test_subscribes_enabled_channels() {
        let bus = InMemoryBus::new();
        let states = ChannelStates::default();
        let (actions, config) = actions();
        let coordinator = RefreshCoordinator::new(
            "console",
            Some(Arc::new(bus.clone())),
            settings("vm://broker"),
            flags(),
            actions,
            states.clone(),
        );

        let handle = coordinator.start(Shutdown::new()).await;
        assert_eq!(handle.subscribed(), vec![ChannelKind::Config, ChannelKind::SecureStore]);
        assert_eq!(*states.get(&ChannelKind::Config).unwrap(), ChannelState::Subscribed);
        assert_eq!(*states.get(&ChannelKind::Logger).unwrap(), ChannelState::Disabled);

        bus.publish_text("jms/cc.console.config.update", "CONFIG_UPDATED");
        for _ in 0..100 {
            if config.0.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(config.0.load(Ordering::SeqCst), 1);

        handle.close().await;
        assert_eq!(*states.get(&ChannelKind::Config).unwrap(), ChannelState::Closed);
        let log: Vec<BusObject> = bus.close_log().into_iter().map(|(object, _)| object).collect();
        assert_eq!(
            log,
            vec![
                BusObject::Consumer,
                BusObject::Consumer,
                BusObject::Session,
                BusObject::Connection
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_broker_url_disables_everything() {
        let bus = InMemoryBus::new();
        let states = ChannelStates::default();
        let coordinator = RefreshCoordinator::new(
            "console",
            Some(Arc::new(bus.clone())),
            settings(""),
            flags(),
            actions().0,
            states.clone(),
        );

        let handle = coordinator.start(Shutdown::new()).await;
        assert!(handle.subscribed().is_empty());
        assert_eq!(bus.connection_count(), 0);
        for kind in ChannelKind::ALL {
            assert_eq!(*states.get(&kind).unwrap(), ChannelState::Disabled);
        }
        handle.close().await;
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_disconnected() {
        let states = ChannelStates::default();
        let coordinator = RefreshCoordinator::new(
            "console",
            Some(Arc::new(InMemoryBus::unreachable())),
            settings("vm://broker"),
            flags(),
            actions().0,
            states.clone(),
        );

        let handle = coordinator.start(Shutdown::new()).await;
        assert!(handle.subscribed().is_empty());
        assert_eq!(*states.get(&ChannelKind::Config).unwrap(), ChannelState::Disconnected);
        assert_eq!(*states.get(&ChannelKind::Logger).unwrap(), ChannelState::Disabled);
        handle.close().await;
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_per_channel() {
        let bus = InMemoryBus::new();
        bus.reject_topic("jms/cc.console.securestore.update");
        let states = ChannelStates::default();
        let coordinator = RefreshCoordinator::new(
            "console",
            Some(Arc::new(bus.clone())),
            settings("vm://broker"),
            flags(),
            actions().0,
            states.clone(),
        );

        let handle = coordinator.start(Shutdown::new()).await;
        assert_eq!(handle.subscribed(), vec![ChannelKind::Config]);
        assert_eq!(
            *states.get(&ChannelKind::SecureStore).unwrap(),
            ChannelState::Disconnected
        );
        handle.close().await;
    }

    #[tokio::test]
    async fn test_close_continues_past_failures() {
        let bus = InMemoryBus::new();
        bus.fail_close(BusObject::Consumer);
        bus.fail_close(BusObject::Session);
        let coordinator = RefreshCoordinator::new(
            "console",
            Some(Arc::new(bus.clone())),
            settings("vm://broker"),
            flags(),
            actions().0,
            ChannelStates::default(),
        );

        coordinator.start(Shutdown::new()).await.close().await;
        let log = bus.close_log();
        assert_eq!(log.len(), 4);
        assert_eq!(log[3].0, BusObject::Connection);
    }
}
