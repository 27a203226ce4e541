//! Common test utilities and fixtures

#![allow(dead_code)]

use std::sync::Arc;

use hydra_bridge::common::types::Quote;
use hydra_bridge::SharedChannel;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

/// A shared region in its own temporary directory
///
/// The directory is removed when the fixture is dropped.
pub struct TempChannel {
    pub dir: TempDir,
    pub channel: Arc<SharedChannel>,
}

impl TempChannel {
    pub fn new(name: &str) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let channel = SharedChannel::recreate_in(dir.path(), name, hydra_bridge::DEFAULT_REGION_SIZE)
            .expect("Failed to create shared channel");
        Self {
            dir,
            channel: Arc::new(channel),
        }
    }

    /// Map the same region a second time, as the strategy process would
    pub fn open_peer(&self, name: &str) -> SharedChannel {
        SharedChannel::open_or_create_in(self.dir.path(), name, hydra_bridge::DEFAULT_REGION_SIZE)
            .expect("Failed to map peer view")
    }
}

/// A published quote with the given touch prices
pub fn quote(bid: Decimal, ask: Decimal) -> Quote {
    Quote {
        capture_time_ms: 1_704_067_200_000,
        bid_price: bid,
        bid_qty: dec!(1.5),
        ask_price: ask,
        ask_qty: dec!(2.25),
    }
}

/// Sample bookTicker messages
pub mod ws_messages {
    /// Raw stream payload
    pub const BOOK_TICKER: &str = r#"{"u":400900217,"s":"BTCUSDT","b":"49999.99","B":"1.50000000","a":"50000.00","A":"2.25000000"}"#;

    /// Subscription acknowledgement, carries no quote
    pub const SUBSCRIBE_ACK: &str = r#"{"result":null,"id":1}"#;
}
