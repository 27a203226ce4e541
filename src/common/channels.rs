//! Channel type definitions for inter-task communication

use tokio::sync::{mpsc, watch};

use super::types::{AccountSnapshot, ExecutionEvent, FeedState};

/// Default channel buffer size
pub const DEFAULT_CHANNEL_SIZE: usize = 1000;

/// Create a new execution event channel with the default buffer size
pub fn create_event_channel() -> (mpsc::Sender<ExecutionEvent>, mpsc::Receiver<ExecutionEvent>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

/// Ledger publication: the simulator holds the only sender
pub fn create_account_channel(
    initial: AccountSnapshot,
) -> (watch::Sender<AccountSnapshot>, watch::Receiver<AccountSnapshot>) {
    watch::channel(initial)
}

/// Feed connection state publication
pub fn create_feed_state_channel() -> (watch::Sender<FeedState>, watch::Receiver<FeedState>) {
    watch::channel(FeedState::Disconnected)
}
