//! Notification-driven refresh.
//!
//! # Data Flow
//! ```text
//! Registry::init (any channel enabled)
//!     → coordinator.rs: connect → session → one consumer per enabled channel
//!     → listener.rs: per consumer task
//!         text containing CONFIG_UPDATED       → Registry::refresh
//!         text containing LOGGER_UPDATED       → log manager refresh
//!         text containing SECURE_STORE_UPDATED → secure material download
//!
//! Registry::close
//!     → consumers closed → session closed → connection closed → tasks joined
//! ```
//!
//! # Design Decisions
//! - The broker itself is behind the `MessageBus` trait (bus.rs); memory.rs is the
//!   in-process implementation
//! - Listener failures are logged per message; the subscription stays alive

pub mod actions;
pub mod bus;
pub mod coordinator;
pub mod listener;
pub mod memory;

pub use actions::RefreshActions;
pub use bus::{BusConnection, BusConsumer, BusError, BusMessage, BusSession, MessageBus};
pub use coordinator::{ChannelState, ChannelStates, RefreshCoordinator, RefreshHandle};
pub use listener::{ChangeListener, ChannelKind, Dispatch, RefreshAction};
pub use memory::{BusObject, InMemoryBus};
