//! Application Layer - Engine assembly and observer surface.
//!
//! Wires the domain store to the notification bus and exposes the
//! query/subscription handle consumed by observers.

/// Engine assembly and the observer-facing handle.
pub mod engine;
