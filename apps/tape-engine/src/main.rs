//! Tape Engine Binary
//!
//! Starts the trade ingestion engine against a RabbitMQ broker.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin tape-engine
//! ```
//!
//! # Environment Variables
//!
//! All optional:
//! - `TAPE_AMQP_HOST`: Broker host (default: localhost)
//! - `TAPE_AMQP_PORT`: Broker port (default: 5672)
//! - `TAPE_QUEUE`: Inbound queue name (default: trades)
//! - `TAPE_BUS_CAPACITY`: Per-subscriber broadcast buffer (default: 1024)
//! - `RUST_LOG`: Log level (default: info)

use tape_engine::infrastructure::metrics;
use tape_engine::{
    ConsumerEvent, Engine, EngineConfig, EngineHandle, StreamError, TradeConsumer, TradeRecord,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tape_engine::init_telemetry();

    tracing::info!("Starting tape engine");

    let _metrics_handle = tape_engine::init_metrics();

    let config = EngineConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let engine = Engine::new(config.bus.capacity);
    let handle = engine.handle();

    // Lifecycle events from the consumer
    let (event_tx, event_rx) = mpsc::channel::<ConsumerEvent>(16);
    tokio::spawn(handle_consumer_events(event_rx));

    // In-process observer: logs the live tape the way a display layer
    // would consume it (catch-up via the ledger, then live stream).
    tokio::spawn(run_tape_logger(handle));

    // Ingestion loop (the single writer)
    let consumer = TradeConsumer::new(
        config.amqp.clone(),
        engine,
        event_tx,
        shutdown_token.clone(),
    );
    let mut consumer_task = tokio::spawn(consumer.run());

    tokio::select! {
        () = await_shutdown() => {
            shutdown_token.cancel();
            // Let the consumer finish its in-flight message and release
            // the broker connection.
            match consumer_task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Consumer error during shutdown"),
                Err(e) => tracing::error!(error = %e, "Consumer task panicked"),
            }
        }
        result = &mut consumer_task => {
            shutdown_token.cancel();
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Broker connection lost");
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    tracing::info!("Tape engine stopped");
    Ok(())
}

/// Log consumer lifecycle events.
async fn handle_consumer_events(mut rx: mpsc::Receiver<ConsumerEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            ConsumerEvent::Connected => tracing::info!("Broker connected"),
            ConsumerEvent::Disconnected => tracing::warn!("Broker disconnected"),
        }
    }
}

/// Stream every applied trade to the log, in ledger order.
///
/// Exercises the full observer protocol: baseline from the ledger, then
/// live notifications, resynchronizing through the ledger on overflow.
async fn run_tape_logger(handle: EngineHandle) {
    let mut subscription = handle.subscribe();

    for entry in handle.ledger_since(subscription.initial_seq()) {
        log_trade(entry.seq, &entry.trade);
        subscription.resync(entry.seq + 1);
    }

    loop {
        match subscription.recv().await {
            Ok((seq, trade)) => log_trade(seq, &trade),
            Err(StreamError::Overflowed { skipped }) => {
                metrics::record_bus_lagged(skipped);
                tracing::warn!(skipped, "Tape logger lagged, resynchronizing from ledger");
                for entry in handle.ledger_since(subscription.resume_from()) {
                    log_trade(entry.seq, &entry.trade);
                    subscription.resync(entry.seq + 1);
                }
            }
            Err(StreamError::Closed) => {
                tracing::info!("Trade stream closed");
                return;
            }
        }
    }
}

fn log_trade(seq: u64, trade: &TradeRecord) {
    tracing::info!(
        seq,
        symbol = %trade.symbol,
        price = trade.price,
        quantity = trade.quantity,
        buyer = %trade.buyer,
        seller = %trade.seller,
        "Trade"
    );
}

/// Load .env file from the current directory or any ancestor.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &EngineConfig) {
    tracing::info!(
        host = %config.amqp.host,
        port = config.amqp.port,
        queue = %config.amqp.queue,
        bus_capacity = config.bus.capacity,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
