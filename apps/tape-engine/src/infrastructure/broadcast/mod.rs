//! Change Notification Bus
//!
//! Delivers applied trades from the ingestion loop's task to observer
//! tasks using a tokio broadcast channel, preserving application order.
//!
//! # Continuity Contract
//!
//! A subscription carries a sequence cursor. Live events below the
//! cursor are skipped because they are already covered by the
//! observer's ledger catch-up; delivered events advance the cursor.
//! Combined with the store's `ledger_range`, catch-up plus live stream
//! reproduce the exact insertion order with no gap and no duplicate.
//!
//! # Overflow Policy
//!
//! The channel is a bounded ring that drops the oldest events when a
//! subscriber falls behind. The loss is never silent: the lagged
//! subscriber receives [`StreamError::Overflowed`] with the number of
//! skipped events and must resynchronize from the ledger via
//! [`TradeSubscription::resume_from`] and [`TradeSubscription::resync`].
//! The publisher and all other subscribers are unaffected.

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::domain::trade::{SequenceNumber, TradeRecord};
use crate::infrastructure::metrics;

/// Default capacity of the trade broadcast channel.
pub const DEFAULT_BUS_CAPACITY: usize = 1_024;

/// One applied trade as published on the bus.
#[derive(Debug, Clone)]
pub struct TradeBroadcast {
    /// Sequence number assigned by the store.
    pub seq: SequenceNumber,
    /// The applied trade.
    pub trade: TradeRecord,
}

/// Errors surfaced to a subscriber by [`TradeSubscription::recv`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StreamError {
    /// The subscriber fell behind and the ring dropped events.
    ///
    /// Resynchronize via the ledger, then continue receiving.
    #[error("subscriber lagged, {skipped} events dropped; resynchronize from the ledger")]
    Overflowed {
        /// Number of events dropped for this subscriber.
        skipped: u64,
    },

    /// The engine has shut down; no further events will arrive.
    #[error("trade stream closed")]
    Closed,
}

/// Fan-out channel for applied trades.
///
/// The ingestion loop is the only publisher; observers subscribe
/// through [`crate::EngineHandle::subscribe`], which pairs the receiver
/// with the correct catch-up cursor.
///
/// Shutdown is an explicit [`TradeBus::close`] rather than sender drop:
/// every observer handle keeps the bus alive (it needs the ledger for
/// resync), so waiting for the last reference to go away would leave
/// blocked subscribers hanging for as long as any handle exists.
#[derive(Debug)]
pub struct TradeBus {
    tx: broadcast::Sender<TradeBroadcast>,
    closed: CancellationToken,
}

impl TradeBus {
    /// Create a bus with the given per-subscriber buffer capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Configuration loading rejects a
    /// zero capacity before it reaches this constructor.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity).0,
            closed: CancellationToken::new(),
        }
    }

    /// Create a bus with the default capacity.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }

    /// Publish an applied trade to all subscribers.
    ///
    /// Invoked only by the ingestion loop, strictly in apply order.
    /// Returns the number of receivers, or `None` when nobody is
    /// listening (not an error: observers are optional).
    pub fn publish(&self, seq: SequenceNumber, trade: TradeRecord) -> Option<usize> {
        self.tx.send(TradeBroadcast { seq, trade }).ok()
    }

    /// Close the bus, waking every subscriber blocked in `recv`.
    ///
    /// Subscribers drain events already buffered for them, then observe
    /// [`StreamError::Closed`]. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Create a subscription whose cursor starts at `next`.
    ///
    /// The receiver must be created before the cursor is captured from
    /// the store: publish always follows apply, so every trade with
    /// `seq >= next` is then guaranteed to reach this receiver, and
    /// anything older is filtered by the cursor.
    #[must_use]
    pub fn subscribe_from(&self, next: SequenceNumber) -> TradeSubscription {
        metrics::subscriber_added();
        TradeSubscription {
            rx: self.tx.subscribe(),
            closed: self.closed.clone(),
            initial: next,
            next,
        }
    }

    /// Create a subscription whose cursor is produced after the
    /// receiver exists.
    ///
    /// `cursor` is evaluated with the receiver already attached, which
    /// is what makes the no-gap guarantee hold when the cursor comes
    /// from the store: a trade applied concurrently either lands in the
    /// receiver (seq >= cursor) or is excluded by the cursor.
    #[must_use]
    pub fn subscribe_with(
        &self,
        cursor: impl FnOnce() -> SequenceNumber,
    ) -> TradeSubscription {
        metrics::subscriber_added();
        let rx = self.tx.subscribe();
        let next = cursor();
        TradeSubscription {
            rx,
            closed: self.closed.clone(),
            initial: next,
            next,
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for TradeBus {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// A single observer's ordered view of the live trade stream.
///
/// Dropping the subscription unsubscribes it.
#[derive(Debug)]
pub struct TradeSubscription {
    rx: broadcast::Receiver<TradeBroadcast>,
    closed: CancellationToken,
    initial: SequenceNumber,
    next: SequenceNumber,
}

impl TradeSubscription {
    /// Sequence number as of registration.
    ///
    /// Request `ledger_range(initial_seq())` to establish baseline
    /// state before (or while) consuming live events.
    #[must_use]
    pub const fn initial_seq(&self) -> SequenceNumber {
        self.initial
    }

    /// The cursor to resynchronize from after an overflow.
    #[must_use]
    pub const fn resume_from(&self) -> SequenceNumber {
        self.next
    }

    /// Receive the next trade at or beyond the cursor.
    ///
    /// Events below the cursor were already observed through a ledger
    /// range and are skipped. On success the cursor advances past the
    /// delivered event.
    ///
    /// # Errors
    ///
    /// [`StreamError::Overflowed`] when this subscriber lagged and
    /// events were dropped; [`StreamError::Closed`] when the engine has
    /// shut down. Events already buffered drain before the close is
    /// surfaced.
    pub async fn recv(&mut self) -> Result<(SequenceNumber, TradeRecord), StreamError> {
        loop {
            // Buffered events win over the close signal so nothing
            // published before shutdown is swallowed.
            let event = tokio::select! {
                biased;
                event = self.rx.recv() => event,
                () = self.closed.cancelled() => return Err(StreamError::Closed),
            };
            match event {
                Ok(event) if event.seq < self.next => {
                    // Covered by catch-up; deliver nothing twice.
                }
                Ok(event) => {
                    self.next = event.seq + 1;
                    return Ok((event.seq, event.trade));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    return Err(StreamError::Overflowed { skipped });
                }
                Err(broadcast::error::RecvError::Closed) => return Err(StreamError::Closed),
            }
        }
    }

    /// Advance the cursor after a ledger resynchronization.
    ///
    /// `next` is the first sequence number the observer has not yet
    /// applied. The cursor never moves backwards.
    pub const fn resync(&mut self, next: SequenceNumber) {
        if next > self.next {
            self.next = next;
        }
    }
}

impl Drop for TradeSubscription {
    fn drop(&mut self) {
        metrics::subscriber_removed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(symbol: &str, price: f64) -> TradeRecord {
        TradeRecord::new(symbol, price, 1.0, "B", "S")
    }

    #[test]
    fn receiver_count_tracks_subscriptions() {
        let bus = TradeBus::with_defaults();
        assert_eq!(bus.receiver_count(), 0);

        let sub = bus.subscribe_from(0);
        assert_eq!(bus.receiver_count(), 1);

        drop(sub);
        assert_eq!(bus.receiver_count(), 0);
    }

    #[test]
    fn publish_with_no_subscribers_returns_none() {
        let bus = TradeBus::with_defaults();
        assert!(bus.publish(0, trade("AAPL", 1.0)).is_none());
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let bus = TradeBus::with_defaults();
        let mut sub = bus.subscribe_from(0);

        bus.publish(0, trade("AAPL", 100.0));
        bus.publish(1, trade("MSFT", 50.0));

        assert_eq!(sub.recv().await.unwrap().0, 0);
        assert_eq!(sub.recv().await.unwrap().0, 1);
    }

    #[tokio::test]
    async fn cursor_skips_events_covered_by_catch_up() {
        let bus = TradeBus::with_defaults();
        // Cursor at 2: events 0 and 1 were already seen via the ledger.
        let mut sub = bus.subscribe_from(2);

        bus.publish(0, trade("AAPL", 100.0));
        bus.publish(1, trade("MSFT", 50.0));
        bus.publish(2, trade("AAPL", 101.0));

        let (seq, record) = sub.recv().await.unwrap();
        assert_eq!(seq, 2);
        assert_eq!(record.symbol, "AAPL");
        assert_eq!(record.price, 101.0);
    }

    #[tokio::test]
    async fn all_subscribers_see_every_event() {
        let bus = TradeBus::with_defaults();
        let mut a = bus.subscribe_from(0);
        let mut b = bus.subscribe_from(0);

        bus.publish(0, trade("TSLA", 250.0));

        assert_eq!(a.recv().await.unwrap().1.symbol, "TSLA");
        assert_eq!(b.recv().await.unwrap().1.symbol, "TSLA");
    }

    #[tokio::test]
    async fn lagged_subscriber_is_told_how_much_it_missed() {
        let bus = TradeBus::new(2);
        let mut sub = bus.subscribe_from(0);

        for seq in 0..6 {
            bus.publish(seq, trade("X", f64::from(u32::try_from(seq).unwrap())));
        }

        match sub.recv().await {
            Err(StreamError::Overflowed { skipped }) => assert_eq!(skipped, 4),
            other => panic!("expected overflow, got {other:?}"),
        }

        // After resync the subscriber continues from the retained tail.
        sub.resync(4);
        assert_eq!(sub.recv().await.unwrap().0, 4);
        assert_eq!(sub.recv().await.unwrap().0, 5);
    }

    #[tokio::test]
    async fn closed_bus_ends_the_stream() {
        let bus = TradeBus::with_defaults();
        let mut sub = bus.subscribe_from(0);
        drop(bus);
        assert_eq!(sub.recv().await, Err(StreamError::Closed));
    }

    #[tokio::test]
    async fn close_wakes_subscribers_while_the_bus_is_still_referenced() {
        let bus = std::sync::Arc::new(TradeBus::with_defaults());
        let mut sub = bus.subscribe_from(0);

        let waker = {
            let bus = std::sync::Arc::clone(&bus);
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                bus.close();
            })
        };

        // The subscriber's own clone of the bus keeps the sender alive;
        // close must end the wait anyway.
        assert_eq!(sub.recv().await, Err(StreamError::Closed));
        waker.await.unwrap();
    }

    #[tokio::test]
    async fn close_drains_buffered_events_first() {
        let bus = TradeBus::with_defaults();
        let mut sub = bus.subscribe_from(0);

        bus.publish(0, trade("AAPL", 100.0));
        bus.publish(1, trade("MSFT", 50.0));
        bus.close();

        assert_eq!(sub.recv().await.unwrap().0, 0);
        assert_eq!(sub.recv().await.unwrap().0, 1);
        assert_eq!(sub.recv().await, Err(StreamError::Closed));
    }

    #[test]
    fn resync_never_moves_backwards() {
        let bus = TradeBus::with_defaults();
        let mut sub = bus.subscribe_from(5);
        sub.resync(3);
        assert_eq!(sub.resume_from(), 5);
        sub.resync(7);
        assert_eq!(sub.resume_from(), 7);
    }
}
