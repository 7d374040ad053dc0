#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access
    )
)]

//! Tape Engine - Trade Ingestion and Aggregation
//!
//! Consumes trade execution messages from a RabbitMQ queue and maintains
//! two continuously updated views: an append-only chronological ledger of
//! individual trades, and a last-price-per-symbol snapshot. Applied trades
//! are fanned out to in-process observers in strict application order.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core trade types and the aggregate state store
//!   - `trade`: Trade records, ledger entries, sequence numbers
//!   - `ledger`: The single-writer/multi-reader trade store
//!
//! - **Application**: The observer-facing engine surface
//!   - `engine`: Ingestion entry point and query/subscription handle
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `amqp`: RabbitMQ consumer and wire codec
//!   - `broadcast`: Channel-based trade fan-out to observers
//!   - `config`: Configuration loaded from the environment
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: Tracing subscriber setup
//!
//! # Data Flow
//!
//! ```text
//! RabbitMQ ──► Codec ──► TradeStore ──► TradeBus ──► Observer 1
//!  (queue)   (decode)    (apply)       (publish)  ├─► Observer 2
//!                                                 └─► Observer N
//! ```
//!
//! The AMQP consumer is the sole writer; observers read snapshots and
//! ledger ranges, or subscribe to the live stream. A subscriber that
//! falls behind is told how many events it missed and resynchronizes
//! from the ledger rather than silently losing data.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core trade types and the aggregate state store.
pub mod domain;

/// Application layer - Engine assembly and observer-facing handle.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::ledger::TradeStore;
pub use domain::trade::{LedgerEntry, SequenceNumber, TradeRecord, UNKNOWN_FIELD};

// Engine surface
pub use application::engine::{Engine, EngineHandle};

// Broadcast bus (for integration tests)
pub use infrastructure::broadcast::{StreamError, TradeBroadcast, TradeBus, TradeSubscription};

// AMQP consumer and codec
pub use infrastructure::amqp::{
    ConsumerError, ConsumerEvent, DecodeError, TradeCodec, TradeConsumer,
};

// Configuration
pub use infrastructure::config::{AmqpSettings, BusSettings, ConfigError, EngineConfig};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::init as init_telemetry;
