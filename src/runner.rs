//! Wires the channel, feed, simulator and balance sync into running tasks

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::channel::SharedChannel;
use crate::common::errors::{BridgeError, FeedError, Result};
use crate::common::types::ExecutionEvent;
use crate::config::types::AppConfig;
use crate::feed::{policy_from_config, FeedStats, FeedSupervisor, MarketFeedClient};
use crate::simulator::{BalanceSyncAgent, ExecutionSimulator};

/// The assembled bridge, ready to start
pub struct Bridge {
    config: AppConfig,
    channel: Arc<SharedChannel>,
    events: Option<mpsc::Sender<ExecutionEvent>>,
}

impl Bridge {
    /// Recreate the shared region; failure here is fatal
    #[instrument(skip(config), fields(name = %config.channel.name))]
    pub fn new(config: AppConfig) -> Result<Self> {
        let channel = SharedChannel::recreate_in(
            &config.channel.directory,
            &config.channel.name,
            config.channel.size,
        )?;
        info!("Shared channel ready at {}", channel.path().display());

        Ok(Self {
            config,
            channel: Arc::new(channel),
            events: None,
        })
    }

    /// Receive every execution event
    pub fn with_event_sender(mut self, tx: mpsc::Sender<ExecutionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn channel(&self) -> Arc<SharedChannel> {
        self.channel.clone()
    }

    /// Spawn the feed supervisor, the simulator and the balance sync agent
    pub fn start(self) -> Result<BridgeHandle> {
        let client = MarketFeedClient::new(&self.config.feed, self.channel.clone())?;
        let feed_stats = client.stats();
        let supervisor = FeedSupervisor::new(
            Arc::new(client),
            policy_from_config(&self.config.reconnect),
        );

        let mut simulator =
            ExecutionSimulator::from_config(self.channel.clone(), &self.config.simulator);
        if let Some(tx) = self.events {
            simulator = simulator.with_event_sender(tx);
        }
        let balance_sync = BalanceSyncAgent::new(
            self.channel.clone(),
            simulator.subscribe_account(),
            self.config.balance_sync.period(),
        );

        let balance_sync = tokio::spawn(balance_sync.run());
        let simulator = tokio::spawn(simulator.run());
        let feed = tokio::spawn(supervisor.run());
        info!("Bridge started");

        Ok(BridgeHandle {
            channel: self.channel,
            feed_stats,
            feed,
            simulator,
            balance_sync,
        })
    }
}

/// Handles to the running tasks
pub struct BridgeHandle {
    channel: Arc<SharedChannel>,
    feed_stats: Arc<FeedStats>,
    feed: JoinHandle<FeedError>,
    simulator: JoinHandle<()>,
    balance_sync: JoinHandle<()>,
}

impl BridgeHandle {
    pub fn channel(&self) -> &Arc<SharedChannel> {
        &self.channel
    }

    pub fn feed_stats(&self) -> &Arc<FeedStats> {
        &self.feed_stats
    }

    /// Wait until any task stops; they are all meant to run forever
    pub async fn wait(&mut self) -> BridgeError {
        tokio::select! {
            res = &mut self.feed => match res {
                Ok(err) => {
                    error!("Market feed stopped: {}", err);
                    BridgeError::Feed(err)
                }
                Err(e) => BridgeError::Internal(format!("feed task failed: {}", e)),
            },
            res = &mut self.simulator => {
                BridgeError::Internal(format!("simulator stopped: {:?}", res.err()))
            }
            res = &mut self.balance_sync => {
                BridgeError::Internal(format!("balance sync stopped: {:?}", res.err()))
            }
        }
    }

    /// Abort every task; the shared region is left in place
    pub fn shutdown(self) {
        self.feed.abort();
        self.simulator.abort();
        self.balance_sync.abort();
        info!(
            "Bridge stopped after {} quotes and {} reconnects",
            self.feed_stats.quotes_published(),
            self.feed_stats.reconnects()
        );
    }
}
