//! Reconnect loop around the market feed client

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::reconnect::BoxedReconnectPolicy;
use super::websocket::MarketFeedClient;
use crate::common::errors::FeedError;
use crate::common::types::FeedState;

/// Restarts the feed after every failure according to a [`ReconnectPolicy`]
///
/// With the default unbounded policy [`run`](Self::run) never returns.
///
/// [`ReconnectPolicy`]: super::reconnect::ReconnectPolicy
pub struct FeedSupervisor {
    client: Arc<MarketFeedClient>,
    policy: BoxedReconnectPolicy,
}

impl FeedSupervisor {
    pub fn new(client: Arc<MarketFeedClient>, policy: BoxedReconnectPolicy) -> Self {
        Self { client, policy }
    }

    pub fn client(&self) -> &Arc<MarketFeedClient> {
        &self.client
    }

    /// Run sessions until the policy gives up
    pub async fn run(mut self) -> FeedError {
        let stats = self.client.stats();
        let mut attempt: u32 = 0;

        loop {
            info!("Connecting to {}", self.client.url());
            let streamed_before = stats.sessions_streamed();

            let err = match self.client.run_session().await {
                Ok(()) => FeedError::Closed(None),
                Err(e) => e,
            };
            self.client.set_state(FeedState::Disconnected);

            if matches!(err, FeedError::IdleTimeout(_)) {
                stats.idle_timeouts.fetch_add(1, Ordering::Relaxed);
            }
            warn!("Connection lost: {}", err);

            // A session that reached Streaming starts a fresh failure run
            if stats.sessions_streamed() > streamed_before {
                attempt = 0;
            }
            attempt = attempt.saturating_add(1);

            match self.policy.next_delay(attempt) {
                Some(delay) => {
                    info!("Reconnecting in {:?} (attempt {})", delay, attempt);
                    tokio::time::sleep(delay).await;
                    stats.reconnects.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    error!("Reconnect policy exhausted after {} attempts", attempt - 1);
                    return FeedError::RetriesExhausted {
                        attempts: attempt - 1,
                    };
                }
            }
        }
    }
}
