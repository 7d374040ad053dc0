//! Trade Ingestion Loop
//!
//! Connects to RabbitMQ, consumes the trades queue, and drives the
//! engine: decode, apply, publish, acknowledge. This task is the single
//! writer in the system.
//!
//! # Delivery Semantics
//!
//! Messages are acknowledged manually, strictly after the trade has
//! been applied to the store (at-least-once: a crash between apply and
//! ack may redeliver, producing a duplicate ledger entry, which is
//! accepted). Malformed messages are logged, counted, and acknowledged
//! so the broker does not redeliver garbage; they never halt the loop.
//!
//! # Failure Model
//!
//! Loss of the broker connection is fatal to the loop and surfaced to
//! the owner. Retry/backoff policy belongs to the process supervisor,
//! not here.

use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::codec::TradeCodec;
use crate::application::engine::Engine;
use crate::infrastructure::config::AmqpSettings;
use crate::infrastructure::metrics;

/// Consumer tag announced to the broker.
const CONSUMER_TAG: &str = "tape-engine";

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the trade consumer.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// Initial connection to the broker failed.
    #[error("broker connection failed: {0}")]
    ConnectFailed(lapin::Error),

    /// An established broker connection or channel failed.
    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),

    /// The broker closed the delivery stream.
    #[error("delivery stream closed by broker")]
    StreamClosed,
}

// =============================================================================
// Consumer Events
// =============================================================================

/// Lifecycle events emitted by the consumer to its owner.
#[derive(Debug, Clone)]
pub enum ConsumerEvent {
    /// Connected to the broker and consuming.
    Connected,
    /// Lost the broker connection; the loop is about to return.
    Disconnected,
}

// =============================================================================
// Trade Consumer
// =============================================================================

/// The ingestion loop: broker deliveries in, applied trades out.
pub struct TradeConsumer {
    settings: AmqpSettings,
    engine: Engine,
    codec: TradeCodec,
    event_tx: mpsc::Sender<ConsumerEvent>,
    cancel: CancellationToken,
}

impl TradeConsumer {
    /// Create a new consumer.
    #[must_use]
    pub const fn new(
        settings: AmqpSettings,
        engine: Engine,
        event_tx: mpsc::Sender<ConsumerEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            engine,
            codec: TradeCodec::new(),
            event_tx,
            cancel,
        }
    }

    /// Run the ingestion loop until cancellation or broker failure.
    ///
    /// On cancellation the in-flight delivery is finished and
    /// acknowledged before the connection is released; no applied trade
    /// is silently dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`ConsumerError`] when the broker connection cannot be
    /// established or is lost. This is fatal to the loop; the owner
    /// decides whether to restart.
    pub async fn run(self) -> Result<(), ConsumerError> {
        let uri = self.settings.uri();
        tracing::info!(uri = %uri, queue = %self.settings.queue, "Connecting to broker");

        let connection = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(ConsumerError::ConnectFailed)?;
        let channel = connection.create_channel().await?;

        channel
            .queue_declare(
                &self.settings.queue,
                QueueDeclareOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let mut deliveries = channel
            .basic_consume(
                &self.settings.queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        tracing::info!(queue = %self.settings.queue, "Listening for trades");
        let _ = self.event_tx.send(ConsumerEvent::Connected).await;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Trade consumer cancelled, closing broker connection");
                    let _ = connection.close(200, "shutdown").await;
                    return Ok(());
                }
                delivery = deliveries.next() => {
                    match delivery {
                        Some(Ok(delivery)) => self.handle_delivery(delivery).await?,
                        Some(Err(e)) => {
                            let _ = self.event_tx.send(ConsumerEvent::Disconnected).await;
                            return Err(e.into());
                        }
                        None => {
                            let _ = self.event_tx.send(ConsumerEvent::Disconnected).await;
                            return Err(ConsumerError::StreamClosed);
                        }
                    }
                }
            }
        }
    }

    /// Decode one delivery, drive the engine, and acknowledge.
    async fn handle_delivery(&self, delivery: Delivery) -> Result<(), ConsumerError> {
        match self.codec.decode(&delivery.data) {
            Ok(trade) => {
                let seq = self.engine.ingest(trade);
                metrics::record_trade_applied();
                tracing::debug!(seq, "Trade applied");
            }
            Err(e) => {
                // Local recovery: drop the message, keep the loop alive.
                metrics::record_decode_failure();
                tracing::warn!(error = %e, "Dropping malformed trade message");
            }
        }

        // Ack after apply: redelivery on crash is a duplicate ledger
        // entry, never a lost trade.
        delivery.ack(BasicAckOptions::default()).await?;
        Ok(())
    }
}

impl std::fmt::Debug for TradeConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeConsumer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
