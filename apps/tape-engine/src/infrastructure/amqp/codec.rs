//! Trade Wire Codec
//!
//! Decodes raw message bodies into validated [`TradeRecord`] values.
//!
//! # Wire Format
//!
//! UTF-8 JSON object with optional keys:
//!
//! ```json
//! { "symbol": "AAPL", "price": 100.0, "quantity": 10, "buyer": "B1", "seller": "S1" }
//! ```
//!
//! Any subset of keys may be absent. Missing fields take the per-field
//! defaults; wrong-typed fields (a string price, a numeric buyer) are
//! treated the same as missing and coerce to the default. This blanket
//! leniency keeps the pipeline flowing across partial or sloppy
//! producer schemas. The only decode failure is a body that is not a
//! JSON object at all.

use serde_json::Value;

use crate::domain::trade::{TradeRecord, UNKNOWN_FIELD};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Message body is not a parseable JSON object.
    #[error("malformed trade message: {0}")]
    Malformed(String),
}

/// JSON codec for inbound trade messages.
#[derive(Debug, Default, Clone)]
pub struct TradeCodec;

impl TradeCodec {
    /// Create a new trade codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a message body into a trade record.
    ///
    /// Pure and deterministic: the same bytes always produce the same
    /// record.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Malformed`] when the body is not valid UTF-8
    /// JSON, or parses to something other than an object. Absent or
    /// wrong-typed fields are never an error.
    pub fn decode(&self, body: &[u8]) -> Result<TradeRecord, DecodeError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let Value::Object(fields) = value else {
            return Err(DecodeError::Malformed(format!(
                "expected a JSON object, got {}",
                json_type_name(&value)
            )));
        };

        Ok(TradeRecord {
            symbol: string_or_default(fields.get("symbol")),
            price: number_or_default(fields.get("price")),
            quantity: number_or_default(fields.get("quantity")),
            buyer: string_or_default(fields.get("buyer")),
            seller: string_or_default(fields.get("seller")),
        })
    }
}

fn string_or_default(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_FIELD)
        .to_string()
}

fn number_or_default(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
