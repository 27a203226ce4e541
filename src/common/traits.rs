//! Trait definitions for the seams between components

use super::types::{Command, CommandStatus, Quote};

/// Destination for quotes produced by the market feed
///
/// The shared channel is the production implementation; the feed only
/// needs somewhere to put whole quote updates and a readiness flag.
pub trait QuoteSink: Send + Sync {
    /// Publish a complete quote update
    fn publish_quote(&self, quote: &Quote);

    /// Flag whether the feed is currently streaming
    fn set_feed_connected(&self, connected: bool);
}

/// The simulator's view of the shared channel
pub trait OrderGateway: Send + Sync {
    /// Latest quote, or `None` if the slot could not be read consistently
    fn latest_quote(&self) -> Option<Quote>;

    /// Latest command, or `None` if the slot could not be read consistently
    fn latest_command(&self) -> Option<Command>;

    /// Report the outcome of a command back to the strategy
    fn report_status(&self, status: &CommandStatus);
}
