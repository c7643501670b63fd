//! Per-topic change listener.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ConfigResult;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::refresh::bus::{BusConsumer, BusMessage};

/// The three notification channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Config,
    Logger,
    SecureStore,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [ChannelKind::Config, ChannelKind::Logger, ChannelKind::SecureStore];

    /// Text a message must contain to trigger this channel's action.
    pub fn marker(&self) -> &'static str {
        match self {
            ChannelKind::Config => "CONFIG_UPDATED",
            ChannelKind::Logger => "LOGGER_UPDATED",
            ChannelKind::SecureStore => "SECURE_STORE_UPDATED",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Config => "config",
            ChannelKind::Logger => "logger",
            ChannelKind::SecureStore => "secure_store",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a listener did with one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Applied,
    Ignored,
    Failed,
}

impl Dispatch {
    fn as_str(&self) -> &'static str {
        match self {
            Dispatch::Applied => "applied",
            Dispatch::Ignored => "ignored",
            Dispatch::Failed => "failed",
        }
    }
}

/// Work triggered by a recognized notification.
#[async_trait]
pub trait RefreshAction: Send + Sync {
    async fn run(&self) -> ConfigResult<()>;
}

/// Consumes one topic and runs its action on each marked message.
pub struct ChangeListener {
    kind: ChannelKind,
    action: Arc<dyn RefreshAction>,
}

impl ChangeListener {
    pub fn new(kind: ChannelKind, action: Arc<dyn RefreshAction>) -> Self {
        Self { kind, action }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Handle one message. Never fails; action errors are logged.
    pub async fn on_message(&self, message: &BusMessage) -> Dispatch {
        let outcome = match message {
            BusMessage::Text(text) if text.contains(self.kind.marker()) => {
                tracing::info!(channel = %self.kind, message = %text, "Update message received");
                match self.action.run().await {
                    Ok(()) => Dispatch::Applied,
                    Err(e) => {
                        tracing::error!(channel = %self.kind, error = %e, "Error in applying update");
                        Dispatch::Failed
                    }
                }
            }
            _ => {
                tracing::debug!(channel = %self.kind, "Ignoring unrecognized message");
                Dispatch::Ignored
            }
        };
        metrics::record_notification(self.kind.as_str(), outcome.as_str());
        outcome
    }

    /// Process messages until the consumer closes or shutdown fires.
    pub async fn run(&self, consumer: Arc<dyn BusConsumer>, shutdown: Shutdown) {
        tracing::debug!(channel = %self.kind, topic = consumer.topic(), "Listener started");
        loop {
            tokio::select! {
                message = consumer.recv() => match message {
                    Some(message) => {
                        self.on_message(&message).await;
                    }
                    None => break,
                },
                _ = shutdown.wait() => break,
            }
        }
        tracing::debug!(channel = %self.kind, "Listener stopped");
    }
}
