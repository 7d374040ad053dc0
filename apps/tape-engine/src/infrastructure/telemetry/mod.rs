//! Tracing Subscriber Setup
//!
//! Configures the `tracing` subscriber for the engine binary.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log filter (default: `tape_engine=info`)

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the tracing subscriber.
///
/// Call once at startup, before any spans or events are emitted.
#[allow(clippy::expect_used)]
pub fn init() {
    let env_filter = EnvFilter::from_default_env()
        .add_directive(
            "tape_engine=info"
                .parse()
                .expect("static directive 'tape_engine=info' is valid"),
        )
        .add_directive(
            "lapin=warn"
                .parse()
                .expect("static directive 'lapin=warn' is valid"),
        );

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
