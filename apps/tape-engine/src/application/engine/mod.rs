//! Trade Engine
//!
//! Assembles the aggregate state store and the notification bus, and
//! splits the two sides of the system apart:
//!
//! - [`Engine::ingest`] is the writer entry point, called only from the
//!   ingestion loop. Apply and publish happen as one ordered step so
//!   sequence numbers reach the bus in the order the store assigned
//!   them.
//! - [`EngineHandle`] is the observer surface: price snapshots, ledger
//!   ranges, and live subscriptions. Handles are cheap to clone and may
//!   be used from any task; no read path blocks the writer beyond the
//!   store's short critical section.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::ledger::TradeStore;
use crate::domain::trade::{LedgerEntry, SequenceNumber, TradeRecord};
use crate::infrastructure::broadcast::{TradeBus, TradeSubscription};

/// The trade ingestion and aggregation engine.
#[derive(Debug)]
pub struct Engine {
    store: Arc<TradeStore>,
    bus: Arc<TradeBus>,
}

impl Engine {
    /// Create an engine with the given bus capacity.
    ///
    /// # Panics
    ///
    /// Panics if `bus_capacity` is zero; [`crate::EngineConfig`]
    /// rejects a zero capacity before construction.
    #[must_use]
    pub fn new(bus_capacity: usize) -> Self {
        Self {
            store: Arc::new(TradeStore::new()),
            bus: Arc::new(TradeBus::new(bus_capacity)),
        }
    }

    /// Apply a decoded trade and publish it to subscribers.
    ///
    /// The single writer path. Publish follows apply, so the live
    /// stream carries sequence numbers in exactly the order the store
    /// assigned them.
    pub fn ingest(&self, trade: TradeRecord) -> SequenceNumber {
        let seq = self.store.apply(trade.clone());
        let _ = self.bus.publish(seq, trade);
        seq
    }

    /// Create an observer handle onto this engine.
    #[must_use]
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            store: Arc::clone(&self.store),
            bus: Arc::clone(&self.bus),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(crate::infrastructure::broadcast::DEFAULT_BUS_CAPACITY)
    }
}

impl Drop for Engine {
    /// Close the bus when the writer goes away.
    ///
    /// Observer handles share ownership of the bus, so waiting for the
    /// last reference would leave any subscriber blocked in `recv` for
    /// as long as it holds its own handle. The explicit close wakes
    /// them; buffered events drain before `Closed` is observed.
    fn drop(&mut self) {
        self.bus.close();
    }
}

/// Observer-facing query and subscription interface.
///
/// Consumed by the presentation layer (or any other read-only
/// collaborator). All operations are read-only with respect to engine
/// state.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    store: Arc<TradeStore>,
    bus: Arc<TradeBus>,
}

impl EngineHandle {
    /// Point-in-time copy of the last price per symbol.
    #[must_use]
    pub fn price_snapshot(&self) -> HashMap<String, f64> {
        self.store.snapshot_prices()
    }

    /// Ledger entries with sequence number >= `from`, in insertion order.
    #[must_use]
    pub fn ledger_since(&self, from: SequenceNumber) -> Vec<LedgerEntry> {
        self.store.ledger_range(from)
    }

    /// Number of trades applied so far.
    #[must_use]
    pub fn ledger_len(&self) -> usize {
        self.store.len()
    }

    /// Subscribe to the live trade stream.
    ///
    /// The receiver is created before the cursor is captured; since
    /// publish follows apply, every trade at or beyond
    /// `initial_seq()` is guaranteed to reach the subscription, and
    /// older events are filtered out. Fetch
    /// `ledger_since(subscription.initial_seq())` for baseline state;
    /// the concatenation of that range with the live stream is gapless
    /// and duplicate-free.
    #[must_use]
    pub fn subscribe(&self) -> TradeSubscription {
        self.bus.subscribe_with(|| self.store.next_seq())
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.bus.receiver_count()
    }
}
