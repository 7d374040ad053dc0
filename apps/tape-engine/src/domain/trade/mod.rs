//! Trade Record Types
//!
//! Core domain types for the trade tape: the immutable trade record as
//! decoded from the wire, and the ledger entry that pairs a record with
//! its assigned sequence position.
//!
//! # Permissive Defaults
//!
//! Producers publish partial schemas in practice. A missing (or
//! wrong-typed) field is not an error; it takes the documented default:
//! `"???"` for identifier fields, `0.0` for numerics. The codec in the
//! AMQP adapter applies these defaults; the sentinel lives here because
//! it is part of the data model, not the wire format.

use serde::{Deserialize, Serialize};

/// Sentinel value for identifier fields absent from the inbound message.
pub const UNKNOWN_FIELD: &str = "???";

/// Monotonically increasing position of a trade in the ledger.
///
/// Assigned by the store in application order, starting at 0. Defines
/// the total order observers rely on for catch-up and live streaming.
pub type SequenceNumber = u64;

/// One executed trade between a buyer and a seller.
///
/// Immutable once constructed. Two structurally identical records are
/// distinct ledger entries; there is no identity key and no
/// deduplication (redelivery from the broker yields a second entry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Instrument symbol, `"???"` if absent from the message.
    pub symbol: String,
    /// Execution price, `0.0` if absent.
    pub price: f64,
    /// Executed quantity, `0.0` if absent. Accepts integer or float input.
    pub quantity: f64,
    /// Buying party identifier, `"???"` if absent.
    pub buyer: String,
    /// Selling party identifier, `"???"` if absent.
    pub seller: String,
}

impl TradeRecord {
    /// Create a trade record from explicit fields.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        price: f64,
        quantity: f64,
        buyer: impl Into<String>,
        seller: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            quantity,
            buyer: buyer.into(),
            seller: seller.into(),
        }
    }
}

impl Default for TradeRecord {
    /// The record produced by a message carrying none of the optional keys.
    fn default() -> Self {
        Self {
            symbol: UNKNOWN_FIELD.to_string(),
            price: 0.0,
            quantity: 0.0,
            buyer: UNKNOWN_FIELD.to_string(),
            seller: UNKNOWN_FIELD.to_string(),
        }
    }
}

/// A trade record together with its position in the ledger.
///
/// Entries are never removed or mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Sequence number assigned at application time.
    pub seq: SequenceNumber,
    /// The applied trade.
    pub trade: TradeRecord,
}
