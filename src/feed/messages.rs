//! Binance bookTicker payload extraction
//!
//! Format: `{"u":400900217,"s":"BTCUSDT","b":"25.35190000","B":"31.21","a":"25.36520000","A":"40.66"}`
//!
//! Extraction is best-effort per field: a missing or malformed value becomes
//! zero for that field and the rest of the update is still published.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::common::types::Quote;

pub const BID_PRICE_KEY: &str = "b";
pub const BID_QTY_KEY: &str = "B";
pub const ASK_PRICE_KEY: &str = "a";
pub const ASK_QTY_KEY: &str = "A";

const QUOTE_KEYS: [&str; 4] = [BID_PRICE_KEY, BID_QTY_KEY, ASK_PRICE_KEY, ASK_QTY_KEY];

/// Extract a quote from one stream message
///
/// Returns `None` when the message carries none of the quote keys
/// (subscription acks, control payloads).
pub fn parse_book_ticker(text: &str, capture_time_ms: u64) -> Option<Quote> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(obj)) => parse_object(unwrap_combined(&obj), capture_time_ms),
        Ok(_) => None,
        Err(_) => scan_text(text, capture_time_ms),
    }
}

/// Combined streams wrap the payload: `{"stream":"btcusdt@bookTicker","data":{...}}`
fn unwrap_combined(obj: &Map<String, Value>) -> &Map<String, Value> {
    match obj.get("data") {
        Some(Value::Object(inner)) => inner,
        _ => obj,
    }
}

fn parse_object(obj: &Map<String, Value>, capture_time_ms: u64) -> Option<Quote> {
    if !QUOTE_KEYS.iter().any(|key| obj.contains_key(*key)) {
        return None;
    }

    let field = |key: &str| obj.get(key).map(value_to_decimal).unwrap_or(Decimal::ZERO);

    Some(Quote {
        capture_time_ms,
        bid_price: field(BID_PRICE_KEY),
        bid_qty: field(BID_QTY_KEY),
        ask_price: field(ASK_PRICE_KEY),
        ask_qty: field(ASK_QTY_KEY),
    })
}

fn value_to_decimal(value: &Value) -> Decimal {
    let parsed = match value {
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    };
    parsed.unwrap_or(Decimal::ZERO)
}

/// Quote fields are non-negative; anything else is malformed
fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
        .filter(|d| !d.is_sign_negative())
}

/// Fallback for payloads that are not valid JSON (e.g. truncated frames):
/// locate each `"key":"value"` pair directly in the text.
fn scan_text(text: &str, capture_time_ms: u64) -> Option<Quote> {
    let values: Vec<Option<Decimal>> = QUOTE_KEYS
        .iter()
        .map(|key| scan_field(text, key))
        .collect();

    if values.iter().all(Option::is_none) {
        return None;
    }

    let get = |idx: usize| values[idx].unwrap_or(Decimal::ZERO);
    Some(Quote {
        capture_time_ms,
        bid_price: get(0),
        bid_qty: get(1),
        ask_price: get(2),
        ask_qty: get(3),
    })
}

fn scan_field(text: &str, key: &str) -> Option<Decimal> {
    let needle = format!("\"{}\":\"", key);
    let start = text.find(&needle)? + needle.len();
    let rest = &text[start..];
    let end = rest.find('"')?;
    parse_decimal(&rest[..end])
}
