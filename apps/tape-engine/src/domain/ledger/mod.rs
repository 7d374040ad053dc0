//! Aggregate State Store
//!
//! Owns the append-only trade ledger and the last-price map. The two
//! structures are updated as one logical transaction under a single
//! write lock, so a reader can never observe the ledger advanced
//! without the matching price update (or vice versa).
//!
//! # Access Discipline
//!
//! Single writer, multiple readers. The ingestion loop is the only
//! caller of [`TradeStore::apply`]; observers call the read operations
//! from their own tasks. All critical sections are short: apply pushes
//! one entry and writes one map slot, reads copy out what they need
//! while holding the read guard.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::domain::trade::{LedgerEntry, SequenceNumber, TradeRecord};

/// Ledger and last-price map behind one lock.
#[derive(Debug, Default)]
struct StoreInner {
    /// Append-only ledger; a trade's sequence number is its index.
    entries: Vec<LedgerEntry>,
    /// Most recent price seen per symbol. Never expired.
    last_prices: HashMap<String, f64>,
}

/// The aggregate state store: trade ledger plus last-price snapshot.
///
/// Constructed once at process start and shared by handle; there is no
/// ambient global state.
#[derive(Debug, Default)]
pub struct TradeStore {
    inner: RwLock<StoreInner>,
}

impl TradeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a trade: append it to the ledger, assign the next sequence
    /// number, and update the last price for its symbol.
    ///
    /// This is the single mutating operation. Both views change under
    /// one write guard, so the update is atomic from any reader's
    /// perspective.
    pub fn apply(&self, trade: TradeRecord) -> SequenceNumber {
        let mut inner = self.inner.write();
        let seq = inner.entries.len() as SequenceNumber;
        inner.last_prices.insert(trade.symbol.clone(), trade.price);
        inner.entries.push(LedgerEntry { seq, trade });
        seq
    }

    /// Point-in-time copy of the current last-price state.
    #[must_use]
    pub fn snapshot_prices(&self) -> HashMap<String, f64> {
        self.inner.read().last_prices.clone()
    }

    /// Ledger entries with sequence number >= `from`, in insertion order.
    ///
    /// Used by a newly attached observer to establish its baseline
    /// before switching to live notifications, and by a lagged observer
    /// to resynchronize.
    #[must_use]
    pub fn ledger_range(&self, from: SequenceNumber) -> Vec<LedgerEntry> {
        let Ok(start) = usize::try_from(from) else {
            return Vec::new();
        };
        let inner = self.inner.read();
        // seq == index, so a range query is a slice copy
        inner
            .entries
            .get(start..)
            .map(<[LedgerEntry]>::to_vec)
            .unwrap_or_default()
    }

    /// The sequence number the next applied trade will receive.
    #[must_use]
    pub fn next_seq(&self) -> SequenceNumber {
        self.inner.read().entries.len() as SequenceNumber
    }

    /// Number of entries in the ledger.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Whether the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn trade(symbol: &str, price: f64) -> TradeRecord {
        TradeRecord::new(symbol, price, 1.0, "B", "S")
    }

    #[test]
    fn apply_assigns_sequence_numbers_from_zero() {
        let store = TradeStore::new();
        assert_eq!(store.apply(trade("AAPL", 100.0)), 0);
        assert_eq!(store.apply(trade("MSFT", 50.0)), 1);
        assert_eq!(store.apply(trade("AAPL", 101.0)), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn last_price_tracks_most_recent_trade() {
        let store = TradeStore::new();
        store.apply(TradeRecord::new("AAPL", 100.0, 10.0, "B1", "S1"));
        store.apply(TradeRecord::new("MSFT", 50.0, 5.0, "B2", "S2"));
        store.apply(TradeRecord::new("AAPL", 101.0, 3.0, "B3", "S3"));

        let prices = store.snapshot_prices();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices["AAPL"], 101.0);
        assert_eq!(prices["MSFT"], 50.0);
    }

    #[test]
    fn ledger_preserves_insertion_order() {
        let store = TradeStore::new();
        store.apply(trade("AAPL", 100.0));
        store.apply(trade("MSFT", 50.0));
        store.apply(trade("AAPL", 101.0));

        let entries = store.ledger_range(0);
        let symbols: Vec<&str> = entries.iter().map(|e| e.trade.symbol.as_str()).collect();
        assert_eq!(symbols, ["AAPL", "MSFT", "AAPL"]);
        let seqs: Vec<SequenceNumber> = entries.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, [0, 1, 2]);
    }

    #[test]
    fn ledger_range_from_midpoint() {
        let store = TradeStore::new();
        for i in 0..5 {
            store.apply(trade("X", f64::from(i)));
        }

        let tail = store.ledger_range(3);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].seq, 3);
        assert_eq!(tail[1].seq, 4);
    }

    #[test]
    fn ledger_range_past_end_is_empty() {
        let store = TradeStore::new();
        store.apply(trade("X", 1.0));
        assert!(store.ledger_range(1).is_empty());
        assert!(store.ledger_range(100).is_empty());
    }

    #[test]
    fn next_seq_matches_ledger_length() {
        let store = TradeStore::new();
        assert_eq!(store.next_seq(), 0);
        store.apply(trade("X", 1.0));
        assert_eq!(store.next_seq(), 1);
    }

    #[test]
    fn default_priced_symbol_still_enters_snapshot() {
        let store = TradeStore::new();
        store.apply(TradeRecord {
            symbol: "TSLA".to_string(),
            ..TradeRecord::default()
        });
        assert_eq!(store.snapshot_prices()["TSLA"], 0.0);
    }

    proptest! {
        /// For any sequence of trades, the snapshot holds the price of
        /// the most recent trade per symbol.
        #[test]
        fn snapshot_equals_last_price_per_symbol(
            trades in prop::collection::vec(
                ("[A-E]", 0.0f64..1000.0).prop_map(|(s, p)| trade(&s, p)),
                0..64,
            )
        ) {
            let store = TradeStore::new();
            let mut expected: HashMap<String, f64> = HashMap::new();
            for t in &trades {
                expected.insert(t.symbol.clone(), t.price);
                store.apply(t.clone());
            }
            prop_assert_eq!(store.snapshot_prices(), expected);
        }

        /// N applied trades produce sequence numbers 0..N-1 in order.
        #[test]
        fn sequence_numbers_are_dense_and_ordered(
            trades in prop::collection::vec(
                (0.0f64..100.0).prop_map(|p| trade("SYM", p)),
                0..64,
            )
        ) {
            let store = TradeStore::new();
            for (i, t) in trades.iter().enumerate() {
                prop_assert_eq!(store.apply(t.clone()), i as SequenceNumber);
            }
            let entries = store.ledger_range(0);
            prop_assert_eq!(entries.len(), trades.len());
            for (i, entry) in entries.iter().enumerate() {
                prop_assert_eq!(entry.seq, i as SequenceNumber);
                prop_assert_eq!(&entry.trade, &trades[i]);
            }
        }
    }
}
