//! Ingestion Pipeline Integration Tests
//!
//! Drives the codec → store path with raw message bodies, the way the
//! AMQP consumer does: permissive decoding, malformed-message
//! isolation, and aggregate consistency.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use tape_engine::{Engine, EngineHandle, TradeCodec};

/// Feed raw bodies through the decode-then-ingest path, dropping
/// malformed ones, exactly as the ingestion loop does.
fn ingest_bodies(engine: &Engine, codec: &TradeCodec, bodies: &[&[u8]]) -> usize {
    let mut dropped = 0;
    for body in bodies {
        match codec.decode(body) {
            Ok(trade) => {
                engine.ingest(trade);
            }
            Err(_) => dropped += 1,
        }
    }
    dropped
}

fn snapshot(handle: &EngineHandle, symbol: &str) -> f64 {
    handle.price_snapshot()[symbol]
}

#[test]
fn three_trade_scenario_builds_expected_views() {
    let engine = Engine::new(64);
    let handle = engine.handle();
    let codec = TradeCodec::new();

    let dropped = ingest_bodies(
        &engine,
        &codec,
        &[
            br#"{"symbol":"AAPL","price":100,"quantity":10,"buyer":"B1","seller":"S1"}"#,
            br#"{"symbol":"MSFT","price":50,"quantity":5,"buyer":"B2","seller":"S2"}"#,
            br#"{"symbol":"AAPL","price":101,"quantity":3,"buyer":"B3","seller":"S3"}"#,
        ],
    );
    assert_eq!(dropped, 0);

    let ledger = handle.ledger_since(0);
    assert_eq!(ledger.len(), 3);
    let seqs: Vec<u64> = ledger.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, [0, 1, 2]);
    let symbols: Vec<&str> = ledger.iter().map(|e| e.trade.symbol.as_str()).collect();
    assert_eq!(symbols, ["AAPL", "MSFT", "AAPL"]);

    let prices = handle.price_snapshot();
    assert_eq!(prices.len(), 2);
    assert_eq!(prices["AAPL"], 101.0);
    assert_eq!(prices["MSFT"], 50.0);
}

#[test]
fn malformed_message_is_invisible_to_observers() {
    let engine = Engine::new(64);
    let handle = engine.handle();
    let codec = TradeCodec::new();

    let dropped = ingest_bodies(
        &engine,
        &codec,
        &[
            br#"{"symbol":"AAPL","price":100}"#,
            b"not-json-at-all",
            br#"{"symbol":"MSFT","price":50}"#,
        ],
    );

    // The bad body is dropped; the pipeline keeps flowing.
    assert_eq!(dropped, 1);
    assert_eq!(handle.ledger_len(), 2);
    assert_eq!(snapshot(&handle, "AAPL"), 100.0);
    assert_eq!(snapshot(&handle, "MSFT"), 50.0);
}

#[test]
fn symbol_only_message_is_applied_with_defaults() {
    let engine = Engine::new(64);
    let handle = engine.handle();
    let codec = TradeCodec::new();

    let dropped = ingest_bodies(&engine, &codec, &[br#"{"symbol":"TSLA"}"#]);
    assert_eq!(dropped, 0);

    let ledger = handle.ledger_since(0);
    assert_eq!(ledger.len(), 1);
    let trade = &ledger[0].trade;
    assert_eq!(trade.symbol, "TSLA");
    assert_eq!(trade.price, 0.0);
    assert_eq!(trade.quantity, 0.0);
    assert_eq!(trade.buyer, "???");
    assert_eq!(trade.seller, "???");

    assert_eq!(snapshot(&handle, "TSLA"), 0.0);
}

#[test]
fn duplicate_trades_are_distinct_ledger_entries() {
    let engine = Engine::new(64);
    let handle = engine.handle();
    let codec = TradeCodec::new();

    let body: &[u8] = br#"{"symbol":"AAPL","price":100,"quantity":10,"buyer":"B1","seller":"S1"}"#;
    ingest_bodies(&engine, &codec, &[body, body]);

    // At-least-once redelivery appends, never deduplicates.
    let ledger = handle.ledger_since(0);
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger[0].trade, ledger[1].trade);
    assert_ne!(ledger[0].seq, ledger[1].seq);
}

#[test]
fn ledger_never_shorter_than_priced_symbols() {
    let engine = Engine::new(64);
    let handle = engine.handle();
    let codec = TradeCodec::new();

    ingest_bodies(
        &engine,
        &codec,
        &[
            br#"{"symbol":"A","price":1}"#,
            br#"{"symbol":"B","price":2}"#,
            br#"{"symbol":"A","price":3}"#,
            b"garbage",
        ],
    );

    assert!(handle.ledger_len() >= handle.price_snapshot().len());
}
