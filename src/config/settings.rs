use serde::Deserialize;

use crate::broker::routing::RoutingMode;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub store: StoreSettings,
    pub log: LogSettings,
}

/// Where the server listens and how many connections it accepts.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub routing: RoutingMode,
}

/// Retention policy of the message store. `0` disables a limit.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StoreSettings {
    pub max_messages: usize,
    pub message_ttl_secs: u64,
}

impl StoreSettings {
    pub fn ttl_seconds(&self) -> Option<i64> {
        (self.message_ttl_secs > 0).then(|| i64::try_from(self.message_ttl_secs).unwrap_or(i64::MAX))
    }

    pub fn message_cap(&self) -> Option<usize> {
        (self.max_messages > 0).then_some(self.max_messages)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled from
/// defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub store: Option<PartialStoreSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_connections: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub routing: Option<RoutingMode>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialStoreSettings {
    pub max_messages: Option<usize>,
    pub message_ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Settings {
    /// Fill every field missing from `partial` with its default.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();
        let server = partial.server.unwrap_or_default();
        let broker = partial.broker.unwrap_or_default();
        let store = partial.store.unwrap_or_default();
        let log = partial.log.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
                max_connections: server
                    .max_connections
                    .unwrap_or(default.server.max_connections),
            },
            broker: BrokerSettings {
                routing: broker.routing.unwrap_or(default.broker.routing),
            },
            store: StoreSettings {
                max_messages: store.max_messages.unwrap_or(default.store.max_messages),
                message_ttl_secs: store
                    .message_ttl_secs
                    .unwrap_or(default.store.message_ttl_secs),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 4000,
                max_connections: 1000,
            },
            broker: BrokerSettings {
                routing: RoutingMode::Shared,
            },
            store: StoreSettings {
                max_messages: 10_000,
                message_ttl_secs: 3600,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
