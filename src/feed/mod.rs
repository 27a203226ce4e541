//! Feed module - Resilient market-data ingestion from the exchange

pub mod messages;
pub mod reconnect;
pub mod supervisor;
pub mod websocket;

pub use reconnect::{
    policy_from_config, BoxedReconnectPolicy, ExponentialBackoff, FixedBackoff, ReconnectPolicy,
};
pub use supervisor::FeedSupervisor;
pub use websocket::{FeedStats, MarketFeedClient};
