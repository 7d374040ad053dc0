//! Domain Layer - Core trade types and business logic.
//!
//! This layer contains the core domain types for trade ingestion with
//! no external dependencies beyond serialization support.

/// Trade records, ledger entries, and sequence numbers.
pub mod trade;

/// The aggregate state store: ledger plus last-price map.
pub mod ledger;
