//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations that connect the domain to the outside
//! world: the broker consumer, the observer fan-out channel, and the
//! ambient configuration/observability plumbing.

/// RabbitMQ consumer and trade wire codec.
pub mod amqp;

/// Broadcast channel adapter for trade fan-out.
pub mod broadcast;

/// Configuration loaded from the environment.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing subscriber setup.
pub mod telemetry;
