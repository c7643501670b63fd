//! Configuration schema definitions.
//!
//! Two groups of settings live here:
//! - settings the client needs before it can talk to the config service
//!   ([`BootstrapSettings`], [`ClientOptions`]), loaded from a local file;
//! - settings read back out of the registry after the first refresh
//!   ([`RefresherFlags`], [`BrokerSettings`], [`TransportOptions`]).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::properties::Properties;
use crate::refresh::ChannelKind;
use crate::registry::{Registry, View};

pub const BOOTSTRAP_URI_KEY: &str = "spring.cloud.config.uri";
pub const BOOTSTRAP_USERNAME_KEY: &str = "spring.cloud.config.username";
pub const BOOTSTRAP_PASSWORD_KEY: &str = "spring.cloud.config.password";

pub const LOG_MANAGER_ENABLED_KEY: &str = "logger.manager.enabled";
pub const CONFIG_REFRESHER_ENABLED_KEY: &str = "config.update.refresher.enabled";
pub const LOGGER_REFRESHER_ENABLED_KEY: &str = "logger.update.refresher.enabled";
pub const SECURE_STORE_REFRESHER_ENABLED_KEY: &str = "secureStore.update.refresher.enabled";
pub const LOCAL_WATCH_ENABLED_KEY: &str = "config.local.watch.enabled";

pub const TRANSPORT_PREFIX: &str = "config.activeMQConnectionFactory";
pub const BROKER_URL_KEY: &str = "config.activeMQConnectionFactory.brokerURL";
pub const BROKER_SSL_ENABLED_KEY: &str = "activemq.broker.ssl.enabled";
pub const CONFIG_TOPIC_KEY: &str = "jms.config.update.topic";
pub const LOGGER_TOPIC_KEY: &str = "jms.logger.update.topic";
pub const SECURE_STORE_TOPIC_KEY: &str = "jms.securestore.update.topic";

pub const APPLICATION_NAME_TOKEN: &str = "%application.name%";
pub const DEFAULT_CONFIG_TOPIC: &str = "jms/cc.%application.name%.config.update";
pub const DEFAULT_LOGGER_TOPIC: &str = "jms/cc.%application.name%.logger.update";
pub const DEFAULT_SECURE_STORE_TOPIC: &str = "jms/cc.%application.name%.securestore.update";

/// Connection settings for the config service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapSettings {
    /// Base URL of the config service. Required.
    pub uri: Option<String>,

    /// HTTP Basic user name.
    pub username: String,

    /// HTTP Basic password, optionally `{cipher}`-encrypted.
    pub password: String,
}

impl BootstrapSettings {
    /// Read the `spring.cloud.config.*` keys of a bootstrap property file.
    pub fn from_properties(properties: &Properties) -> Self {
        Self {
            uri: properties.get(BOOTSTRAP_URI_KEY).cloned(),
            username: properties.get(BOOTSTRAP_USERNAME_KEY).cloned().unwrap_or_default(),
            password: properties.get(BOOTSTRAP_PASSWORD_KEY).cloned().unwrap_or_default(),
        }
    }
}

/// Tuning for the remote fetcher.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Fixed wait between failed fetch attempts in milliseconds.
    pub retry_interval_ms: u64,

    /// Per-attempt HTTP timeout in seconds.
    pub request_timeout_secs: u64,

    /// Watch the local override file even when `config.local.watch.enabled` is unset.
    pub watch_local_overrides: bool,
}

impl ClientOptions {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            retry_interval_ms: 5000,
            request_timeout_secs: 30,
            watch_local_overrides: false,
        }
    }
}

/// Read a boolean flag from the registry, falling back to `default` on a bad value.
pub fn flag(registry: &Registry, key: &str, default: bool) -> bool {
    match registry.get_or(key, default).to_bool(View::Shared) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, default, "Invalid boolean flag, using default");
            default
        }
    }
}

/// Which refresh paths are switched on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefresherFlags {
    pub log_manager: bool,
    pub config: bool,
    pub logger: bool,
    pub secure_store: bool,
}

impl RefresherFlags {
    pub fn from_registry(registry: &Registry) -> Self {
        let log_manager = flag(registry, LOG_MANAGER_ENABLED_KEY, false);
        Self {
            log_manager,
            config: flag(registry, CONFIG_REFRESHER_ENABLED_KEY, false),
            // Logger refresh needs the log manager.
            logger: log_manager && flag(registry, LOGGER_REFRESHER_ENABLED_KEY, false),
            secure_store: flag(registry, SECURE_STORE_REFRESHER_ENABLED_KEY, false),
        }
    }

    pub fn is_enabled(&self, channel: ChannelKind) -> bool {
        match channel {
            ChannelKind::Config => self.config,
            ChannelKind::Logger => self.logger,
            ChannelKind::SecureStore => self.secure_store,
        }
    }

    pub fn any_channel(&self) -> bool {
        self.config || self.logger || self.secure_store
    }
}

/// Message broker settings for the refresh coordinator.
#[derive(Debug, Clone, Default)]
pub struct BrokerSettings {
    pub url: String,
    pub ssl_enabled: bool,
    pub config_topic: String,
    pub logger_topic: String,
    pub secure_store_topic: String,
    pub transport: TransportOptions,
}

impl BrokerSettings {
    pub fn from_registry(registry: &Registry) -> Self {
        let text = |key: &str, default: &str| {
            registry
                .get_or(key, default)
                .value(View::Shared)
                .unwrap_or_default()
        };

        let prefix = format!("{}.", TRANSPORT_PREFIX);
        let transport = TransportOptions::from_entries(
            registry
                .get_all(Some(&prefix))
                .into_iter()
                .filter_map(|cell| {
                    let name = cell.key()[prefix.len()..].replace('.', "");
                    cell.value(View::Shared).map(|value| (name, value))
                }),
        );

        Self {
            url: registry
                .get(BROKER_URL_KEY)
                .value(View::Shared)
                .unwrap_or_default(),
            ssl_enabled: flag(registry, BROKER_SSL_ENABLED_KEY, true),
            config_topic: text(CONFIG_TOPIC_KEY, DEFAULT_CONFIG_TOPIC),
            logger_topic: text(LOGGER_TOPIC_KEY, DEFAULT_LOGGER_TOPIC),
            secure_store_topic: text(SECURE_STORE_TOPIC_KEY, DEFAULT_SECURE_STORE_TOPIC),
            transport,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// Topic name for a channel with the application name substituted.
    pub fn topic(&self, channel: ChannelKind, application_name: &str) -> String {
        let template = match channel {
            ChannelKind::Config => &self.config_topic,
            ChannelKind::Logger => &self.logger_topic,
            ChannelKind::SecureStore => &self.secure_store_topic,
        };
        template.replace(APPLICATION_NAME_TOKEN, application_name)
    }
}

/// Transport tuning for the broker connection.
///
/// Populated from registry entries under `config.activeMQConnectionFactory.`; the
/// key suffix with dots removed names the option (case-insensitive).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub connect_timeout: Option<Duration>,
    pub close_timeout: Option<Duration>,
    pub send_timeout: Option<Duration>,
    pub use_async_send: Option<bool>,
    pub max_reconnect_attempts: Option<u32>,
}

impl TransportOptions {
    /// Apply `(name, value)` pairs; bad entries are logged and skipped.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut options = Self::default();
        for (name, value) in entries {
            if let Err(reason) = options.apply(&name, &value) {
                tracing::error!(
                    property = %name,
                    value = %value,
                    reason = %reason,
                    "Error in setting transport property"
                );
            }
        }
        options
    }

    /// Set a single option by its property name.
    pub fn apply(&mut self, name: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        match name.to_ascii_lowercase().as_str() {
            // Read separately into BrokerSettings::url.
            "brokerurl" => {}
            "username" => self.user_name = Some(value.to_string()),
            "password" => self.password = Some(value.to_string()),
            "clientid" => self.client_id = Some(value.to_string()),
            "connectresponsetimeout" | "connecttimeout" => {
                self.connect_timeout = Some(parse_millis(value)?)
            }
            "closetimeout" => self.close_timeout = Some(parse_millis(value)?),
            "sendtimeout" => self.send_timeout = Some(parse_millis(value)?),
            "useasyncsend" => {
                self.use_async_send = Some(match value.to_ascii_lowercase().as_str() {
                    "true" => true,
                    "false" => false,
                    _ => return Err(format!("'{}' is not a boolean", value)),
                })
            }
            "maxreconnectattempts" => {
                self.max_reconnect_attempts = Some(
                    value
                        .parse()
                        .map_err(|_| format!("'{}' is not a non-negative integer", value))?,
                )
            }
            _ => return Err("unknown property".to_string()),
        }
        Ok(())
    }
}

fn parse_millis(value: &str) -> Result<Duration, String> {
    match value.parse::<u64>() {
        Ok(0) => Err("timeout must be greater than zero".to_string()),
        Ok(ms) => Ok(Duration::from_millis(ms)),
        Err(_) => Err(format!("'{}' is not a duration in milliseconds", value)),
    }
}
