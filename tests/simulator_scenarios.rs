//! End-to-end shadow execution through the shared channel
//!
//! The bridge side runs the simulator over the channel; the test plays both
//! the feed (writing quotes) and the strategy (writing commands through a
//! second mapping).

mod common;

use std::time::Duration;

use common::{quote, TempChannel};
use hydra_bridge::common::channels::create_event_channel;
use hydra_bridge::common::types::{
    Action, Command, CommandStatus, ExecutionEvent, OrderState, RejectReason,
};
use hydra_bridge::simulator::{BalanceSyncAgent, OrderSlot};
use hydra_bridge::{ExecutionSimulator, FeeSchedule, LatencyModel, VirtualLedger};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::time::Instant;

fn simulator(fixture: &TempChannel, cash: Decimal) -> ExecutionSimulator {
    ExecutionSimulator::new(
        fixture.channel.clone(),
        VirtualLedger::new(cash),
        FeeSchedule::binance_spot(),
        LatencyModel::none(),
    )
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_market_buy_debits_cost_plus_fee() {
    let fixture = TempChannel::new("scenario_a");
    let strategy = fixture.open_peer("scenario_a");
    let mut sim = simulator(&fixture, dec!(10000));

    fixture.channel.write_quote(&quote(dec!(49990), dec!(50000)));
    strategy.write_command(&Command::market(1, Action::Buy, dec!(0.1)));
    sim.tick(Instant::now());

    assert_eq!(sim.ledger().cash(), dec!(4996.25));
    assert_eq!(sim.ledger().asset(), dec!(0.1));

    let status = strategy.read_status().unwrap();
    assert_eq!(
        status,
        CommandStatus::filled(1, dec!(50000), dec!(0.1), dec!(3.75))
    );
}

#[test]
fn test_oversell_is_rejected_and_ledger_unchanged() {
    let fixture = TempChannel::new("scenario_b");
    let strategy = fixture.open_peer("scenario_b");
    let mut sim = simulator(&fixture, dec!(10000));
    fixture.channel.write_quote(&quote(dec!(50000), dec!(50010)));

    strategy.write_command(&Command::market(1, Action::Buy, dec!(0.1)));
    sim.tick(Instant::now());
    let before = sim.ledger().snapshot();

    strategy.write_command(&Command::market(2, Action::Sell, dec!(0.2)));
    let events = sim.tick(Instant::now());

    assert_eq!(
        events.last(),
        Some(&ExecutionEvent::OrderRejected {
            sequence_id: 2,
            reason: RejectReason::InsufficientAsset,
        })
    );
    assert_eq!(sim.ledger().snapshot(), before);
    assert_eq!(*sim.slot(), OrderSlot::Idle);

    let status = strategy.read_status().unwrap();
    assert_eq!(status.sequence_id, 2);
    assert_eq!(status.state, OrderState::Rejected);
    assert_eq!(status.reject_reason, Some(RejectReason::InsufficientAsset));
}

#[test]
fn test_limit_buy_waits_until_ask_drops() {
    let fixture = TempChannel::new("scenario_c");
    let strategy = fixture.open_peer("scenario_c");
    let mut sim = simulator(&fixture, dec!(10000));

    fixture.channel.write_quote(&quote(dec!(49990), dec!(50000)));
    strategy.write_command(&Command::new(1, Action::Buy, dec!(0.1), dec!(49000)));
    sim.tick(Instant::now());
    sim.tick(Instant::now());

    assert!(sim.slot().outstanding().is_some());
    assert_eq!(strategy.read_status().unwrap().state, OrderState::Pending);
    assert_eq!(sim.ledger().cash(), dec!(10000));

    fixture.channel.write_quote(&quote(dec!(47990), dec!(48000)));
    let events = sim.tick(Instant::now());

    assert_eq!(
        events,
        vec![ExecutionEvent::OrderFilled {
            sequence_id: 1,
            action: Action::Buy,
            quantity: dec!(0.1),
            price: dec!(48000),
            fee: dec!(3.6),
        }]
    );
    // 4800 + 3.6 fee
    assert_eq!(sim.ledger().cash(), dec!(5196.4));
}

#[test]
fn test_limit_sell_fills_at_bid() {
    let fixture = TempChannel::new("limit_sell");
    let strategy = fixture.open_peer("limit_sell");
    let mut sim = simulator(&fixture, dec!(10000));
    fixture.channel.write_quote(&quote(dec!(50000), dec!(50010)));

    strategy.write_command(&Command::market(1, Action::Buy, dec!(0.1)));
    sim.tick(Instant::now());

    strategy.write_command(&Command::new(2, Action::Sell, dec!(0.1), dec!(51000)));
    sim.tick(Instant::now());
    assert!(sim.slot().outstanding().is_some());

    fixture.channel.write_quote(&quote(dec!(51500), dec!(51510)));
    sim.tick(Instant::now());

    assert_eq!(sim.ledger().asset(), Decimal::ZERO);
    assert_eq!(strategy.read_status().unwrap().fill_price, dec!(51500));
}

// ============================================================================
// Command Handling Tests
// ============================================================================

#[test]
fn test_reobserving_sequence_id_is_idempotent() {
    let fixture = TempChannel::new("idempotent");
    let strategy = fixture.open_peer("idempotent");
    let mut sim = simulator(&fixture, dec!(10000));
    fixture.channel.write_quote(&quote(dec!(49990), dec!(50000)));

    strategy.write_command(&Command::market(1, Action::Buy, dec!(0.1)));
    for _ in 0..10 {
        sim.tick(Instant::now());
    }
    // Rewriting the same id is not a new command
    strategy.write_command(&Command::market(1, Action::Buy, dec!(0.1)));
    sim.tick(Instant::now());

    assert_eq!(sim.stats().orders_filled, 1);
    assert_eq!(sim.ledger().asset(), dec!(0.1));
}

#[test]
fn test_lower_sequence_id_is_ignored() {
    let fixture = TempChannel::new("lower_id");
    let strategy = fixture.open_peer("lower_id");
    let mut sim = simulator(&fixture, dec!(10000));
    fixture.channel.write_quote(&quote(dec!(49990), dec!(50000)));

    strategy.write_command(&Command::market(5, Action::Buy, dec!(0.1)));
    sim.tick(Instant::now());
    strategy.write_command(&Command::market(4, Action::Buy, dec!(0.1)));
    assert!(sim.tick(Instant::now()).is_empty());
    assert_eq!(sim.last_seen_id(), 5);
}

#[test]
fn test_superseding_command_cancels_outstanding() {
    let fixture = TempChannel::new("supersede");
    let strategy = fixture.open_peer("supersede");
    let (tx, mut rx) = create_event_channel();
    let mut sim = simulator(&fixture, dec!(10000)).with_event_sender(tx);
    fixture.channel.write_quote(&quote(dec!(49990), dec!(50000)));

    strategy.write_command(&Command::new(1, Action::Buy, dec!(0.1), dec!(45000)));
    sim.tick(Instant::now());
    strategy.write_command(&Command::market(2, Action::Buy, dec!(0.1)));
    sim.tick(Instant::now());

    let mut received = Vec::new();
    while let Ok(event) = rx.try_recv() {
        received.push(event);
    }
    let ids: Vec<_> = received.iter().map(|e| e.sequence_id()).collect();
    assert_eq!(ids, vec![1, 1, 2, 2]);
    assert_eq!(
        received[1],
        ExecutionEvent::OrderCancelled {
            sequence_id: 1,
            superseded_by: 2,
        }
    );
    assert!(matches!(received[3], ExecutionEvent::OrderFilled { price, .. } if price == dec!(50000)));
}

#[test]
fn test_simulated_latency_defers_fill() {
    let fixture = TempChannel::new("latency");
    let strategy = fixture.open_peer("latency");
    let mut sim = ExecutionSimulator::new(
        fixture.channel.clone(),
        VirtualLedger::new(dec!(10000)),
        FeeSchedule::binance_spot(),
        LatencyModel::fixed(Duration::from_millis(20)),
    );
    fixture.channel.write_quote(&quote(dec!(49990), dec!(50000)));
    strategy.write_command(&Command::market(1, Action::Buy, dec!(0.1)));

    let start = Instant::now();
    sim.tick(start);
    assert_eq!(strategy.read_status().unwrap().state, OrderState::Pending);

    // The ask moves before the order goes live
    fixture.channel.write_quote(&quote(dec!(49890), dec!(49900)));
    sim.tick(start + Duration::from_millis(25));

    assert_eq!(strategy.read_status().unwrap().fill_price, dec!(49900));
}

#[test]
fn test_oversized_quantity_is_rejected_without_stopping_simulator() {
    let fixture = TempChannel::new("oversized");
    let strategy = fixture.open_peer("oversized");
    let mut sim = simulator(&fixture, dec!(10000));
    fixture.channel.write_quote(&quote(dec!(49990), dec!(50000)));

    strategy.write_command(&Command::market(
        1,
        Action::Buy,
        dec!(10000000000000000000000000000),
    ));
    let events = sim.tick(Instant::now());

    assert_eq!(
        events.last(),
        Some(&ExecutionEvent::OrderRejected {
            sequence_id: 1,
            reason: RejectReason::Overflow,
        })
    );
    let status = strategy.read_status().unwrap();
    assert_eq!(status.state, OrderState::Rejected);
    assert_eq!(status.reject_reason, Some(RejectReason::Overflow));
    assert_eq!(sim.ledger().cash(), dec!(10000));
    assert_eq!(sim.ledger().asset(), Decimal::ZERO);

    // The next command is still served
    strategy.write_command(&Command::market(2, Action::Buy, dec!(0.1)));
    sim.tick(Instant::now());
    assert_eq!(strategy.read_status().unwrap().state, OrderState::Filled);
}

#[test]
fn test_fine_grained_quantity_can_be_sold_back() {
    let fixture = TempChannel::new("fine_qty");
    let strategy = fixture.open_peer("fine_qty");
    let mut sim = simulator(&fixture, dec!(10000));
    fixture.channel.write_quote(&quote(dec!(100), dec!(100.5)));

    strategy.write_command(&Command::market(1, Action::Buy, dec!(0.123456786)));
    sim.tick(Instant::now());
    let bought = fixture.channel.read_command().unwrap().quantity;
    assert_eq!(sim.ledger().asset(), bought);

    strategy.write_command(&Command::market(2, Action::Sell, dec!(0.123456786)));
    sim.tick(Instant::now());

    assert_eq!(strategy.read_status().unwrap().state, OrderState::Filled);
    assert_eq!(sim.ledger().asset(), Decimal::ZERO);
    assert!(sim.ledger().cash() >= Decimal::ZERO);
    assert_eq!(sim.stats().orders_rejected, 0);
}

// ============================================================================
// Balance Sync Tests
// ============================================================================

#[test]
fn test_balance_sync_mirrors_ledger_after_fill() {
    let fixture = TempChannel::new("balance_sync");
    let strategy = fixture.open_peer("balance_sync");
    let mut sim = simulator(&fixture, dec!(10000));
    let agent = BalanceSyncAgent::new(
        fixture.channel.clone(),
        sim.subscribe_account(),
        Duration::from_millis(500),
    );

    agent.sync_once();
    assert_eq!(strategy.read_account().unwrap().cash_balance, dec!(10000));

    fixture.channel.write_quote(&quote(dec!(49990), dec!(50000)));
    strategy.write_command(&Command::market(1, Action::Buy, dec!(0.1)));
    sim.tick(Instant::now());

    // Not mirrored until the next sync
    assert_eq!(strategy.read_account().unwrap().cash_balance, dec!(10000));
    agent.sync_once();

    let account = strategy.read_account().unwrap();
    assert_eq!(account.cash_balance, dec!(4996.25));
    assert_eq!(account.asset_balance, dec!(0.1));
}

#[test_log::test(tokio::test)]
async fn test_running_simulator_fills_command() {
    let fixture = TempChannel::new("running");
    let strategy = fixture.open_peer("running");
    let sim = simulator(&fixture, dec!(10000)).with_poll_interval(Duration::from_millis(5));
    let mut account_rx = sim.subscribe_account();
    let handle = tokio::spawn(sim.run());

    fixture.channel.write_quote(&quote(dec!(49990), dec!(50000)));
    strategy.write_command(&Command::market(1, Action::Buy, dec!(0.1)));

    tokio::time::timeout(Duration::from_secs(2), account_rx.changed())
        .await
        .expect("no fill within timeout")
        .unwrap();
    handle.abort();

    assert_eq!(account_rx.borrow().asset_balance, dec!(0.1));
    assert_eq!(strategy.read_status().unwrap().state, OrderState::Filled);
}
