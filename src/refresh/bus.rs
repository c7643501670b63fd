//! Publish/subscribe abstraction used by the refresh coordinator.
//!
//! The object hierarchy mirrors a JMS-style broker: a connection yields a session,
//! a session yields one consumer per topic. Each level is closed independently.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::schema::BrokerSettings;

/// A message delivered on a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Cannot connect to broker at {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("Cannot subscribe to topic {topic}: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("Bus object already closed")]
    Closed,

    #[error("Bus transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn connect(&self, settings: &BrokerSettings) -> Result<Box<dyn BusConnection>, BusError>;
}

#[async_trait]
pub trait BusConnection: Send + Sync {
    async fn create_session(&self) -> Result<Box<dyn BusSession>, BusError>;
    async fn close(&self) -> Result<(), BusError>;
}

#[async_trait]
pub trait BusSession: Send + Sync {
    async fn subscribe(&self, topic: &str) -> Result<Arc<dyn BusConsumer>, BusError>;
    async fn close(&self) -> Result<(), BusError>;
}

#[async_trait]
pub trait BusConsumer: Send + Sync {
    fn topic(&self) -> &str;

    /// Next message, or `None` once the consumer is closed.
    async fn recv(&self) -> Option<BusMessage>;

    async fn close(&self) -> Result<(), BusError>;
}
