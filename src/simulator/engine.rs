//! Shadow execution engine
//!
//! Watches the command slot, holds at most one outstanding order, fills it
//! against the live quote and reports every outcome to the status slot.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::fees::FeeSchedule;
use super::latency::LatencyModel;
use super::ledger::VirtualLedger;
use crate::common::channels::create_account_channel;
use crate::common::errors::LedgerError;
use crate::common::traits::OrderGateway;
use crate::common::types::{
    AccountSnapshot, Action, Command, CommandStatus, ExecutionEvent, Quote, RejectReason,
};
use crate::config::types::SimulatorConfig;

/// An accepted order waiting for a matching price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOrder {
    pub sequence_id: u64,
    /// Always `Buy` or `Sell`
    pub action: Action,
    pub quantity: Decimal,
    /// Zero means market
    pub limit_price: Decimal,
    /// Earliest instant the order may match
    pub live_at: Instant,
}

impl PendingOrder {
    /// Fill price against `quote`, if the order crosses
    pub fn match_price(&self, quote: &Quote) -> Option<Decimal> {
        match self.action {
            Action::Buy => {
                let ask = quote.ask_price;
                let crosses = self.limit_price.is_zero() || self.limit_price >= ask;
                (ask > Decimal::ZERO && crosses).then_some(ask)
            }
            Action::Sell => {
                let bid = quote.bid_price;
                let crosses = self.limit_price.is_zero() || self.limit_price <= bid;
                (bid > Decimal::ZERO && crosses).then_some(bid)
            }
            Action::None => None,
        }
    }
}

/// The single order the simulator may be working
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderSlot {
    #[default]
    Idle,
    Outstanding(PendingOrder),
}

impl OrderSlot {
    pub fn outstanding(&self) -> Option<&PendingOrder> {
        match self {
            OrderSlot::Idle => None,
            OrderSlot::Outstanding(order) => Some(order),
        }
    }
}

/// Execution statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    pub commands_seen: u64,
    pub orders_placed: u64,
    pub orders_filled: u64,
    pub orders_rejected: u64,
    pub orders_cancelled: u64,
    pub total_fees: Decimal,
}

/// Simulated matching engine over a virtual ledger
///
/// The simulator owns its ledger and is the only writer of the status slot.
/// Balances are published on a `watch` channel for the balance sync agent.
pub struct ExecutionSimulator {
    gateway: Arc<dyn OrderGateway>,
    ledger: VirtualLedger,
    fees: FeeSchedule,
    latency: LatencyModel,
    slot: OrderSlot,
    last_seen_id: u64,
    poll_interval: std::time::Duration,
    account_tx: watch::Sender<AccountSnapshot>,
    events: Option<mpsc::Sender<ExecutionEvent>>,
    stats: ExecutionStats,
}

impl ExecutionSimulator {
    /// Create a simulator; commands already present in the channel are ignored
    pub fn new(
        gateway: Arc<dyn OrderGateway>,
        ledger: VirtualLedger,
        fees: FeeSchedule,
        latency: LatencyModel,
    ) -> Self {
        let last_seen_id = gateway
            .latest_command()
            .map(|c| c.sequence_id)
            .unwrap_or(0);
        let (account_tx, _) = create_account_channel(ledger.snapshot());

        Self {
            gateway,
            ledger,
            fees,
            latency,
            slot: OrderSlot::Idle,
            last_seen_id,
            poll_interval: SimulatorConfig::default().poll_interval(),
            account_tx,
            events: None,
            stats: ExecutionStats::default(),
        }
    }

    pub fn from_config(gateway: Arc<dyn OrderGateway>, config: &SimulatorConfig) -> Self {
        Self::new(
            gateway,
            VirtualLedger::new(config.starting_cash),
            FeeSchedule::taker(config.fee_rate),
            LatencyModel::from_config(config),
        )
        .with_poll_interval(config.poll_interval())
    }

    pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Forward every [`ExecutionEvent`] to `tx`
    pub fn with_event_sender(mut self, tx: mpsc::Sender<ExecutionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Ledger balances, updated after every fill
    pub fn subscribe_account(&self) -> watch::Receiver<AccountSnapshot> {
        self.account_tx.subscribe()
    }

    pub fn ledger(&self) -> &VirtualLedger {
        &self.ledger
    }

    pub fn slot(&self) -> &OrderSlot {
        &self.slot
    }

    pub fn last_seen_id(&self) -> u64 {
        self.last_seen_id
    }

    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    /// Mean simulated latency over every accepted order
    pub fn average_latency_ms(&self) -> f64 {
        self.latency.average_ms()
    }

    /// Poll forever at the configured interval
    pub async fn run(mut self) {
        info!(
            "Shadow execution active: cash {}, fee rate {}",
            self.ledger.cash(),
            self.fees.taker_fee_rate
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.tick(Instant::now());
        }
    }

    /// One polling step: pick up a new command, then try to match
    ///
    /// # Returns
    /// The events produced by this step, in order
    pub fn tick(&mut self, now: Instant) -> Vec<ExecutionEvent> {
        let mut events = Vec::new();

        if let Some(command) = self.gateway.latest_command() {
            if command.sequence_id > self.last_seen_id {
                self.accept(command, now, &mut events);
            }
        }

        if let OrderSlot::Outstanding(order) = self.slot {
            if now >= order.live_at {
                self.evaluate(order, &mut events);
            }
        }

        for event in &events {
            self.emit(event.clone());
        }
        events
    }

    fn accept(&mut self, command: Command, now: Instant, events: &mut Vec<ExecutionEvent>) {
        self.last_seen_id = command.sequence_id;
        self.stats.commands_seen += 1;

        if let OrderSlot::Outstanding(previous) = std::mem::take(&mut self.slot) {
            info!(
                "[ORDER] #{} cancelled, superseded by #{}",
                previous.sequence_id, command.sequence_id
            );
            self.stats.orders_cancelled += 1;
            self.gateway
                .report_status(&CommandStatus::cancelled(previous.sequence_id));
            events.push(ExecutionEvent::OrderCancelled {
                sequence_id: previous.sequence_id,
                superseded_by: command.sequence_id,
            });
        }

        let action = match command.action() {
            Some(Action::None) => {
                debug!("Command #{} carries no action", command.sequence_id);
                self.gateway.report_status(&CommandStatus {
                    sequence_id: command.sequence_id,
                    ..Default::default()
                });
                return;
            }
            Some(action) => action,
            None => {
                self.reject(command.sequence_id, RejectReason::InvalidAction, events);
                return;
            }
        };

        if command.quantity <= Decimal::ZERO {
            self.reject(command.sequence_id, RejectReason::InvalidQuantity, events);
            return;
        }
        if command.limit_price < Decimal::ZERO {
            self.reject(command.sequence_id, RejectReason::InvalidPrice, events);
            return;
        }

        let delay = self.latency.sample();
        let order = PendingOrder {
            sequence_id: command.sequence_id,
            action,
            quantity: command.quantity,
            limit_price: command.limit_price,
            live_at: now + delay,
        };
        self.slot = OrderSlot::Outstanding(order);
        self.stats.orders_placed += 1;

        let limit = if command.is_market() {
            "MARKET".to_string()
        } else {
            command.limit_price.to_string()
        };
        info!(
            "[ORDER] #{} {} {} @ {} (live in {:?})",
            order.sequence_id, action, order.quantity, limit, delay
        );
        self.gateway
            .report_status(&CommandStatus::pending(order.sequence_id));
        events.push(ExecutionEvent::OrderPlaced {
            sequence_id: order.sequence_id,
            action,
            quantity: order.quantity,
            limit_price: order.limit_price,
        });
    }

    fn evaluate(&mut self, order: PendingOrder, events: &mut Vec<ExecutionEvent>) {
        let Some(quote) = self.gateway.latest_quote() else {
            return;
        };
        if !quote.is_published() {
            return;
        }
        let Some(price) = order.match_price(&quote) else {
            return;
        };

        // A fill attempt always clears the slot
        self.slot = OrderSlot::Idle;

        let result = match order.action {
            Action::Buy => self.ledger.apply_buy(price, order.quantity, &self.fees),
            Action::Sell => self.ledger.apply_sell(price, order.quantity, &self.fees),
            Action::None => return,
        };

        match result {
            Ok(fill) => {
                self.stats.orders_filled += 1;
                self.stats.total_fees = self.stats.total_fees.saturating_add(fill.fee);
                info!(
                    "[FILL] #{} {} {} @ {} fee {} | cash {} asset {} | avg latency {:.1} ms",
                    order.sequence_id,
                    fill.action,
                    fill.quantity,
                    fill.price,
                    fill.fee,
                    self.ledger.cash(),
                    self.ledger.asset(),
                    self.latency.average_ms()
                );
                self.gateway.report_status(&CommandStatus::filled(
                    order.sequence_id,
                    fill.price,
                    fill.quantity,
                    fill.fee,
                ));
                self.account_tx.send_replace(self.ledger.snapshot());
                events.push(ExecutionEvent::OrderFilled {
                    sequence_id: order.sequence_id,
                    action: fill.action,
                    quantity: fill.quantity,
                    price: fill.price,
                    fee: fill.fee,
                });
            }
            Err(e) => {
                warn!("[REJECT] #{} {}", order.sequence_id, e);
                let reason = match e {
                    LedgerError::InsufficientCash { .. } => RejectReason::InsufficientCash,
                    LedgerError::InsufficientAsset { .. } => RejectReason::InsufficientAsset,
                    LedgerError::Overflow { .. } => RejectReason::Overflow,
                };
                self.reject(order.sequence_id, reason, events);
            }
        }
    }

    fn reject(&mut self, sequence_id: u64, reason: RejectReason, events: &mut Vec<ExecutionEvent>) {
        if !matches!(
            reason,
            RejectReason::InsufficientCash
                | RejectReason::InsufficientAsset
                | RejectReason::Overflow
        ) {
            warn!("[REJECT] #{} {}", sequence_id, reason);
        }
        self.stats.orders_rejected += 1;
        self.gateway
            .report_status(&CommandStatus::rejected(sequence_id, reason));
        events.push(ExecutionEvent::OrderRejected {
            sequence_id,
            reason,
        });
    }

    fn emit(&mut self, event: ExecutionEvent) {
        let Some(tx) = &self.events else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("Event channel full, dropping {:?}", event);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Event receiver dropped");
                self.events = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MockGateway {
        quote: Mutex<Option<Quote>>,
        command: Mutex<Option<Command>>,
        statuses: Mutex<Vec<CommandStatus>>,
    }

    impl MockGateway {
        fn set_quote(&self, bid: Decimal, ask: Decimal) {
            *self.quote.lock().unwrap() = Some(Quote {
                capture_time_ms: 1_700_000_000_000,
                bid_price: bid,
                bid_qty: dec!(1),
                ask_price: ask,
                ask_qty: dec!(1),
            });
        }

        fn set_command(&self, command: Command) {
            *self.command.lock().unwrap() = Some(command);
        }

        fn last_status(&self) -> Option<CommandStatus> {
            self.statuses.lock().unwrap().last().copied()
        }
    }

    impl OrderGateway for MockGateway {
        fn latest_quote(&self) -> Option<Quote> {
            *self.quote.lock().unwrap()
        }

        fn latest_command(&self) -> Option<Command> {
            *self.command.lock().unwrap()
        }

        fn report_status(&self, status: &CommandStatus) {
            self.statuses.lock().unwrap().push(*status);
        }
    }

    fn simulator(gateway: &Arc<MockGateway>, cash: Decimal) -> ExecutionSimulator {
        ExecutionSimulator::new(
            gateway.clone(),
            VirtualLedger::new(cash),
            FeeSchedule::binance_spot(),
            LatencyModel::none(),
        )
    }

    #[test]
    fn test_match_price_rules() {
        let quote = Quote {
            capture_time_ms: 1,
            bid_price: dec!(49990),
            ask_price: dec!(50000),
            ..Default::default()
        };
        let order = |action, limit| PendingOrder {
            sequence_id: 1,
            action,
            quantity: dec!(1),
            limit_price: limit,
            live_at: Instant::now(),
        };

        assert_eq!(order(Action::Buy, dec!(0)).match_price(&quote), Some(dec!(50000)));
        assert_eq!(order(Action::Buy, dec!(50000)).match_price(&quote), Some(dec!(50000)));
        assert_eq!(order(Action::Buy, dec!(49999)).match_price(&quote), None);
        assert_eq!(order(Action::Sell, dec!(0)).match_price(&quote), Some(dec!(49990)));
        assert_eq!(order(Action::Sell, dec!(49990)).match_price(&quote), Some(dec!(49990)));
        assert_eq!(order(Action::Sell, dec!(49991)).match_price(&quote), None);
    }

    #[test]
    fn test_zero_touch_price_never_matches() {
        let order = PendingOrder {
            sequence_id: 1,
            action: Action::Buy,
            quantity: dec!(1),
            limit_price: Decimal::ZERO,
            live_at: Instant::now(),
        };
        let quote = Quote {
            capture_time_ms: 1,
            ..Default::default()
        };
        assert_eq!(order.match_price(&quote), None);
    }

    #[test]
    fn test_market_buy_fills_at_ask() {
        let gateway = Arc::new(MockGateway::default());
        let mut sim = simulator(&gateway, dec!(10000));
        gateway.set_quote(dec!(49990), dec!(50000));
        gateway.set_command(Command::market(1, Action::Buy, dec!(0.1)));

        let events = sim.tick(Instant::now());

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ExecutionEvent::OrderPlaced { sequence_id: 1, .. }));
        assert_eq!(
            events[1],
            ExecutionEvent::OrderFilled {
                sequence_id: 1,
                action: Action::Buy,
                quantity: dec!(0.1),
                price: dec!(50000),
                fee: dec!(3.75),
            }
        );
        assert_eq!(sim.ledger().cash(), dec!(4996.25));
        assert_eq!(sim.ledger().asset(), dec!(0.1));
        assert_eq!(*sim.slot(), OrderSlot::Idle);
        assert_eq!(
            gateway.last_status(),
            Some(CommandStatus::filled(1, dec!(50000), dec!(0.1), dec!(3.75)))
        );
        assert_eq!(sim.subscribe_account().borrow().cash_balance, dec!(4996.25));
    }

    #[test]
    fn test_same_sequence_id_is_processed_once() {
        let gateway = Arc::new(MockGateway::default());
        let mut sim = simulator(&gateway, dec!(10000));
        gateway.set_quote(dec!(49990), dec!(50000));
        gateway.set_command(Command::market(1, Action::Buy, dec!(0.1)));

        sim.tick(Instant::now());
        let again = sim.tick(Instant::now());

        assert!(again.is_empty());
        assert_eq!(sim.stats().orders_filled, 1);
        assert_eq!(sim.ledger().asset(), dec!(0.1));
    }

    #[test]
    fn test_stale_command_at_startup_is_ignored() {
        let gateway = Arc::new(MockGateway::default());
        gateway.set_quote(dec!(49990), dec!(50000));
        gateway.set_command(Command::market(5, Action::Buy, dec!(0.1)));

        let mut sim = simulator(&gateway, dec!(10000));
        assert_eq!(sim.last_seen_id(), 5);
        assert!(sim.tick(Instant::now()).is_empty());
    }

    #[test]
    fn test_latency_delays_matching() {
        let gateway = Arc::new(MockGateway::default());
        let mut sim = ExecutionSimulator::new(
            gateway.clone(),
            VirtualLedger::new(dec!(10000)),
            FeeSchedule::binance_spot(),
            LatencyModel::fixed(Duration::from_millis(20)),
        );
        gateway.set_quote(dec!(49990), dec!(50000));
        gateway.set_command(Command::market(1, Action::Buy, dec!(0.1)));

        let start = Instant::now();
        let events = sim.tick(start);
        assert_eq!(events.len(), 1);
        assert!(sim.slot().outstanding().is_some());

        assert!(sim.tick(start + Duration::from_millis(10)).is_empty());
        let events = sim.tick(start + Duration::from_millis(20));
        assert!(matches!(events[0], ExecutionEvent::OrderFilled { .. }));
        assert!((sim.average_latency_ms() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_newer_command_cancels_outstanding() {
        let gateway = Arc::new(MockGateway::default());
        let mut sim = simulator(&gateway, dec!(10000));
        gateway.set_quote(dec!(49990), dec!(50000));
        gateway.set_command(Command::new(1, Action::Buy, dec!(0.1), dec!(40000)));
        sim.tick(Instant::now());

        gateway.set_command(Command::new(2, Action::Buy, dec!(0.1), dec!(41000)));
        let events = sim.tick(Instant::now());

        assert_eq!(
            events[0],
            ExecutionEvent::OrderCancelled {
                sequence_id: 1,
                superseded_by: 2,
            }
        );
        assert_eq!(sim.slot().outstanding().map(|o| o.sequence_id), Some(2));
        assert_eq!(sim.stats().orders_cancelled, 1);
    }

    #[test]
    fn test_none_action_cancels_without_replacement() {
        let gateway = Arc::new(MockGateway::default());
        let mut sim = simulator(&gateway, dec!(10000));
        gateway.set_quote(dec!(49990), dec!(50000));
        gateway.set_command(Command::new(1, Action::Sell, dec!(0.1), dec!(60000)));
        sim.tick(Instant::now());

        gateway.set_command(Command::market(2, Action::None, dec!(0)));
        let events = sim.tick(Instant::now());

        assert_eq!(events.len(), 1);
        assert_eq!(*sim.slot(), OrderSlot::Idle);
        assert_eq!(gateway.last_status().map(|s| s.sequence_id), Some(2));
    }

    #[test]
    fn test_invalid_commands_are_rejected() {
        let gateway = Arc::new(MockGateway::default());
        let mut sim = simulator(&gateway, dec!(10000));
        gateway.set_quote(dec!(49990), dec!(50000));

        gateway.set_command(Command::market(1, Action::Buy, dec!(0)));
        sim.tick(Instant::now());
        assert_eq!(
            gateway.last_status(),
            Some(CommandStatus::rejected(1, RejectReason::InvalidQuantity))
        );

        gateway.set_command(Command::new(2, Action::Buy, dec!(1), dec!(-5)));
        sim.tick(Instant::now());
        assert_eq!(
            gateway.last_status(),
            Some(CommandStatus::rejected(2, RejectReason::InvalidPrice))
        );

        gateway.set_command(Command {
            sequence_id: 3,
            action_code: 9,
            quantity: dec!(1),
            limit_price: Decimal::ZERO,
        });
        sim.tick(Instant::now());
        assert_eq!(
            gateway.last_status(),
            Some(CommandStatus::rejected(3, RejectReason::InvalidAction))
        );
        assert_eq!(sim.stats().orders_rejected, 3);
        assert_eq!(sim.ledger().cash(), dec!(10000));
    }

    #[test]
    fn test_no_evaluation_before_first_quote() {
        let gateway = Arc::new(MockGateway::default());
        let mut sim = simulator(&gateway, dec!(10000));
        gateway.set_command(Command::market(1, Action::Buy, dec!(0.1)));

        let events = sim.tick(Instant::now());
        assert_eq!(events.len(), 1);
        assert!(sim.slot().outstanding().is_some());

        gateway.set_quote(dec!(49990), dec!(50000));
        let events = sim.tick(Instant::now());
        assert!(matches!(events[0], ExecutionEvent::OrderFilled { .. }));
    }

    #[tokio::test]
    async fn test_events_are_forwarded() {
        let gateway = Arc::new(MockGateway::default());
        let (tx, mut rx) = crate::common::channels::create_event_channel();
        let mut sim = simulator(&gateway, dec!(100)).with_event_sender(tx);
        gateway.set_quote(dec!(49990), dec!(50000));
        gateway.set_command(Command::market(1, Action::Buy, dec!(0.1)));

        sim.tick(Instant::now());

        assert!(matches!(rx.recv().await, Some(ExecutionEvent::OrderPlaced { .. })));
        assert_eq!(
            rx.recv().await,
            Some(ExecutionEvent::OrderRejected {
                sequence_id: 1,
                reason: RejectReason::InsufficientCash,
            })
        );
    }
}
