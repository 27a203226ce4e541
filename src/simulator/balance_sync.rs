//! Mirrors the virtual ledger into the account slot

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::channel::SharedChannel;
use crate::common::types::AccountSnapshot;

/// Copies the latest ledger balances into the shared channel on a fixed period
///
/// The agent never originates balance changes; the simulator remains the
/// only writer of the ledger.
pub struct BalanceSyncAgent {
    channel: Arc<SharedChannel>,
    ledger_rx: watch::Receiver<AccountSnapshot>,
    period: Duration,
}

impl BalanceSyncAgent {
    pub fn new(
        channel: Arc<SharedChannel>,
        ledger_rx: watch::Receiver<AccountSnapshot>,
        period: Duration,
    ) -> Self {
        Self {
            channel,
            ledger_rx,
            period,
        }
    }

    /// Write the current balances once
    pub fn sync_once(&self) -> AccountSnapshot {
        let snapshot = *self.ledger_rx.borrow();
        self.channel.write_account(&snapshot);
        snapshot
    }

    /// Sync forever; the first write happens immediately
    pub async fn run(self) {
        info!("Balance sync started (every {:?})", self.period);
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let snapshot = self.sync_once();
            debug!(
                "Synced balances: cash {} asset {}",
                snapshot.cash_balance, snapshot.asset_balance
            );
        }
    }
}
