//! Hydra Bridge Library
//!
//! Bridges a live exchange top-of-book stream into a shared-memory channel
//! for an external strategy process, and simulates execution of the
//! strategy's commands against a virtual ledger.

pub mod channel;
pub mod common;
pub mod config;
pub mod feed;
pub mod runner;
pub mod simulator;

// Re-export commonly used types
pub use channel::{ChannelLayout, SharedChannel, DEFAULT_REGION_SIZE, DEFAULT_SHM_DIR, LAYOUT_SIZE};
pub use common::errors::{BridgeError, ChannelError, FeedError, LedgerError, Result};
pub use common::traits::{OrderGateway, QuoteSink};
pub use common::types::{
    AccountSnapshot, Action, Command, CommandStatus, ExecutionEvent, FeedState, OrderState, Quote,
    RejectReason,
};
pub use config::types::AppConfig;
pub use feed::{
    BoxedReconnectPolicy, ExponentialBackoff, FeedSupervisor, FixedBackoff, MarketFeedClient,
    ReconnectPolicy,
};
pub use runner::{Bridge, BridgeHandle};
pub use simulator::{
    BalanceSyncAgent, ExecutionSimulator, FeeSchedule, LatencyModel, OrderSlot, VirtualLedger,
};
