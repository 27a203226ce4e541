//! Shadow execution: virtual ledger, fees, latency and the matching loop

pub mod balance_sync;
pub mod engine;
pub mod fees;
pub mod latency;
pub mod ledger;

pub use balance_sync::BalanceSyncAgent;
pub use engine::{ExecutionSimulator, ExecutionStats, OrderSlot, PendingOrder};
pub use fees::{round_amount, FeeSchedule, LEDGER_SCALE};
pub use latency::{LatencyDistribution, LatencyModel};
pub use ledger::{Fill, VirtualLedger};
