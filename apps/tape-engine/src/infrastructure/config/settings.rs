//! Engine Configuration Settings
//!
//! Configuration types for the tape engine, loaded from environment
//! variables. Every option has a default matching the reference broker
//! deployment (`localhost:5672`, queue `trades`); nothing is required.

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct AmqpSettings {
    /// Broker host name.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Inbound queue name.
    pub queue: String,
}

impl Default for AmqpSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            queue: "trades".to_string(),
        }
    }
}

impl AmqpSettings {
    /// AMQP URI for the default vhost on this broker.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("amqp://{}:{}/%2f", self.host, self.port)
    }
}

/// Notification bus settings.
#[derive(Debug, Clone)]
pub struct BusSettings {
    /// Per-subscriber buffer capacity of the trade broadcast channel.
    pub capacity: usize,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            capacity: crate::infrastructure::broadcast::DEFAULT_BUS_CAPACITY,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Broker connection settings.
    pub amqp: AmqpSettings,
    /// Notification bus settings.
    pub bus: BusSettings,
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// Recognized variables: `TAPE_AMQP_HOST`, `TAPE_AMQP_PORT`,
    /// `TAPE_QUEUE`, `TAPE_BUS_CAPACITY`.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is set but unparseable or
    /// empty, or when the bus capacity is zero. Unset variables take
    /// their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = AmqpSettings::default();

        let host = match std::env::var("TAPE_AMQP_HOST") {
            Ok(v) if v.is_empty() => {
                return Err(ConfigError::EmptyValue("TAPE_AMQP_HOST".to_string()));
            }
            Ok(v) => v,
            Err(_) => defaults.host,
        };

        let queue = match std::env::var("TAPE_QUEUE") {
            Ok(v) if v.is_empty() => {
                return Err(ConfigError::EmptyValue("TAPE_QUEUE".to_string()));
            }
            Ok(v) => v,
            Err(_) => defaults.queue,
        };

        let port = parse_env("TAPE_AMQP_PORT", defaults.port)?;
        let capacity =
            validate_bus_capacity(parse_env("TAPE_BUS_CAPACITY", BusSettings::default().capacity)?)?;

        Ok(Self {
            amqp: AmqpSettings { host, port, queue },
            bus: BusSettings { capacity },
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has an empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable is set but cannot be parsed.
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidValue {
        /// The variable name.
        key: String,
        /// The rejected value.
        value: String,
    },
}

// A zero-capacity broadcast channel panics at construction, so the
// value is rejected while configuration can still fail cleanly.
fn validate_bus_capacity(capacity: usize) -> Result<usize, ConfigError> {
    if capacity == 0 {
        return Err(ConfigError::InvalidValue {
            key: "TAPE_BUS_CAPACITY".to_string(),
            value: "0".to_string(),
        });
    }
    Ok(capacity)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
