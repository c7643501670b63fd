//! In-process message bus.
//!
//! Each subscription gets its own unbounded channel; `publish` fans a message out to
//! every open subscription of the topic. Useful for single-process deployments and
//! for exercising the refresh path in tests, including connect, subscribe and close
//! failures.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::sync::mpsc;

use crate::config::schema::BrokerSettings;
use crate::lifecycle::Shutdown;
use crate::refresh::bus::{
    BusConnection, BusConsumer, BusError, BusMessage, BusSession, MessageBus,
};

/// Which bus object a close-log entry or injected failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusObject {
    Consumer,
    Session,
    Connection,
}

struct BusState {
    reachable: AtomicBool,
    connects: AtomicUsize,
    subscribers: DashMap<String, Vec<mpsc::UnboundedSender<BusMessage>>>,
    rejected_topics: DashSet<String>,
    failing_close: DashSet<BusObject>,
    close_log: Mutex<Vec<(BusObject, String)>>,
}

impl BusState {
    fn record_close(&self, object: BusObject, name: &str) -> Result<(), BusError> {
        self.close_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((object, name.to_string()));
        if self.failing_close.contains(&object) {
            return Err(BusError::Transport(format!("{:?} close failed", object)));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct InMemoryBus {
    state: Arc<BusState>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(BusState {
                reachable: AtomicBool::new(true),
                connects: AtomicUsize::new(0),
                subscribers: DashMap::new(),
                rejected_topics: DashSet::new(),
                failing_close: DashSet::new(),
                close_log: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A bus that refuses every connection.
    pub fn unreachable() -> Self {
        let bus = Self::new();
        bus.set_reachable(false);
        bus
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make subscriptions to `topic` fail.
    pub fn reject_topic(&self, topic: impl Into<String>) {
        self.state.rejected_topics.insert(topic.into());
    }

    /// Make closing objects of this kind report an error.
    pub fn fail_close(&self, object: BusObject) {
        self.state.failing_close.insert(object);
    }

    /// Deliver to every open subscription of `topic`; returns the delivery count.
    pub fn publish(&self, topic: &str, message: BusMessage) -> usize {
        let Some(mut senders) = self.state.subscribers.get_mut(topic) else {
            return 0;
        };
        senders.retain(|tx| tx.send(message.clone()).is_ok());
        senders.len()
    }

    pub fn publish_text(&self, topic: &str, text: impl Into<String>) -> usize {
        self.publish(topic, BusMessage::Text(text.into()))
    }

    /// Open subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.state
            .subscribers
            .get(topic)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Successful connections made so far.
    pub fn connection_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Close attempts in the order they happened.
    pub fn close_log(&self) -> Vec<(BusObject, String)> {
        self.state
            .close_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn connect(&self, settings: &BrokerSettings) -> Result<Box<dyn BusConnection>, BusError> {
        if !self.state.reachable.load(Ordering::SeqCst) {
            return Err(BusError::Connect {
                url: settings.url.clone(),
                reason: "connection refused".to_string(),
            });
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            state: self.state.clone(),
            url: settings.url.clone(),
        }))
    }
}

struct MemoryConnection {
    state: Arc<BusState>,
    url: String,
}

#[async_trait]
impl BusConnection for MemoryConnection {
    async fn create_session(&self) -> Result<Box<dyn BusSession>, BusError> {
        Ok(Box::new(MemorySession {
            state: self.state.clone(),
        }))
    }

    async fn close(&self) -> Result<(), BusError> {
        self.state.record_close(BusObject::Connection, &self.url)
    }
}

struct MemorySession {
    state: Arc<BusState>,
}

#[async_trait]
impl BusSession for MemorySession {
    async fn subscribe(&self, topic: &str) -> Result<Arc<dyn BusConsumer>, BusError> {
        if self.state.rejected_topics.contains(topic) {
            return Err(BusError::Subscribe {
                topic: topic.to_string(),
                reason: "not authorized".to_string(),
            });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .subscribers
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        Ok(Arc::new(MemoryConsumer {
            state: self.state.clone(),
            topic: topic.to_string(),
            rx: tokio::sync::Mutex::new(rx),
            closed: Shutdown::new(),
        }))
    }

    async fn close(&self) -> Result<(), BusError> {
        self.state.record_close(BusObject::Session, "session")
    }
}

struct MemoryConsumer {
    state: Arc<BusState>,
    topic: String,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<BusMessage>>,
    closed: Shutdown,
}

#[async_trait]
impl BusConsumer for MemoryConsumer {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn recv(&self) -> Option<BusMessage> {
        if self.closed.is_triggered() {
            return None;
        }
        tokio::select! {
            message = async { self.rx.lock().await.recv().await } => message,
            _ = self.closed.wait() => None,
        }
    }

    async fn close(&self) -> Result<(), BusError> {
        self.closed.trigger();
        self.rx.lock().await.close();
        self.state.record_close(BusObject::Consumer, &self.topic)
    }
}
