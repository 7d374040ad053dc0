//! Prometheus Metrics Module
//!
//! Exposes engine metrics via the Prometheus recorder.
//!
//! # Metrics
//!
//! - `tape_trades_applied_total`: trades decoded, applied, and published
//! - `tape_decode_failures_total`: malformed messages dropped
//! - `tape_bus_lagged_total`: events dropped for slow subscribers
//! - `tape_subscribers`: live subscriber count

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Idempotent: subsequent calls return the existing handle.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

fn register_metrics() {
    describe_counter!(
        "tape_trades_applied_total",
        "Trades decoded, applied to the store, and published to the bus"
    );
    describe_counter!(
        "tape_decode_failures_total",
        "Malformed trade messages dropped by the ingestion loop"
    );
    describe_counter!(
        "tape_bus_lagged_total",
        "Events dropped because a subscriber fell behind"
    );
    describe_gauge!("tape_subscribers", "Live trade stream subscribers");
}

/// Record a trade applied and published.
pub fn record_trade_applied() {
    counter!("tape_trades_applied_total").increment(1);
}

/// Record a malformed message dropped.
pub fn record_decode_failure() {
    counter!("tape_decode_failures_total").increment(1);
}

/// Record events dropped for a lagged subscriber.
pub fn record_bus_lagged(skipped: u64) {
    counter!("tape_bus_lagged_total").increment(skipped);
}

/// Record a subscriber attaching to the trade bus.
pub fn subscriber_added() {
    gauge!("tape_subscribers").increment(1.0);
}

/// Record a subscriber detaching from the trade bus.
pub fn subscriber_removed() {
    gauge!("tape_subscribers").decrement(1.0);
}
