//! RabbitMQ Adapter
//!
//! Implements the inbound side of the engine:
//!
//! - **Codec**: permissive JSON decoding of trade messages
//! - **Consumer**: the ingestion loop pulling from the `trades` queue

pub mod codec;
pub mod consumer;

pub use codec::{DecodeError, TradeCodec};
pub use consumer::{ConsumerError, ConsumerEvent, TradeConsumer};
