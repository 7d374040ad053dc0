//! Configuration
//!
//! Engine configuration loaded from environment variables, with `.env`
//! support via `dotenvy` in the binary.

mod settings;

pub use settings::{AmqpSettings, BusSettings, ConfigError, EngineConfig};
