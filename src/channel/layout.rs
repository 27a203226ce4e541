//! Fixed binary layout of the shared region
//!
//! ```text
//! offset  slot     fields (8-byte little-endian words)
//! ------  -------  ---------------------------------------------------------
//!      0  quote    seq, capture_time_ms, bid_price, bid_qty, ask_price,
//!                  ask_qty, feed_connected
//!     56  account  seq, cash_balance, asset_balance
//!     80  command  seq, sequence_id, action, quantity, limit_price
//!    120  status   seq, sequence_id, state, reject_reason, fill_price,
//!                  fill_qty, fee
//!    176  (end)
//! ```
//!
//! Prices, quantities and balances are `f64`; everything else is `u64`.
//! There is no header, version tag or length prefix: both processes must be
//! built against this exact layout.
//!
//! Each slot is guarded by its own sequence word. A writer moves the word to
//! an odd value, stores the fields, then moves it to the next even value.
//! A reader retries while the word is odd or changed during the read, so a
//! quote or command is always observed whole.

use std::sync::atomic::{fence, AtomicU64, Ordering};

use rust_decimal::Decimal;

use crate::common::types::{
    decimal_to_f64, f64_to_decimal, AccountSnapshot, Command, CommandStatus, OrderState, Quote,
    RejectReason,
};

/// Size in bytes of [`ChannelLayout`]
pub const LAYOUT_SIZE: usize = 176;

/// Default mapped size (one page)
pub const DEFAULT_REGION_SIZE: usize = 4096;

/// Read attempts before a slot is reported as unavailable
const MAX_READ_ATTEMPTS: u32 = 4096;

/// Attempts spent spinning before yielding the thread between retries
const SPIN_ATTEMPTS: u32 = 64;

/// Sequence word guarding one slot
#[repr(transparent)]
#[derive(Debug, Default)]
pub struct SeqLock(AtomicU64);

impl SeqLock {
    /// Current raw sequence value
    pub fn value(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Run `store` as one guarded write. Each slot must have a single writer.
    pub fn write<F: FnOnce()>(&self, store: F) {
        // A writer that died mid-update leaves the word odd; start from even.
        let start = self.0.load(Ordering::Relaxed) & !1;
        self.0.store(start.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        store();
        self.0.store(start.wrapping_add(2), Ordering::Release);
    }

    /// Run `load` until it observes a stable, even sequence
    pub fn read<T, F: Fn() -> T>(&self, load: F) -> Option<T> {
        for attempt in 0..MAX_READ_ATTEMPTS {
            let before = self.0.load(Ordering::Acquire);
            if before & 1 == 0 {
                let value = load();
                fence(Ordering::Acquire);
                if self.0.load(Ordering::Relaxed) == before {
                    return Some(value);
                }
            }
            if attempt < SPIN_ATTEMPTS {
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
        None
    }
}

#[inline]
fn load_u64(word: &AtomicU64) -> u64 {
    word.load(Ordering::Relaxed)
}

#[inline]
fn store_u64(word: &AtomicU64, value: u64) {
    word.store(value, Ordering::Relaxed);
}

#[inline]
fn load_decimal(word: &AtomicU64) -> Decimal {
    f64_to_decimal(f64::from_bits(word.load(Ordering::Relaxed)))
}

/// Non-finite limits decode as -1 so they are rejected, never read as market
#[inline]
fn load_limit_price(word: &AtomicU64) -> Decimal {
    let raw = f64::from_bits(word.load(Ordering::Relaxed));
    if raw.is_finite() {
        f64_to_decimal(raw)
    } else {
        Decimal::NEGATIVE_ONE
    }
}

#[inline]
fn store_decimal(word: &AtomicU64, value: Decimal) {
    word.store(decimal_to_f64(value).to_bits(), Ordering::Relaxed);
}

/// Market snapshot written by the feed
#[repr(C)]
#[derive(Debug, Default)]
pub struct QuoteSlot {
    pub seq: SeqLock,
    pub capture_time_ms: AtomicU64,
    pub bid_price: AtomicU64,
    pub bid_qty: AtomicU64,
    pub ask_price: AtomicU64,
    pub ask_qty: AtomicU64,
    /// 1 while the feed is streaming; outside the seq guard
    pub feed_connected: AtomicU64,
}

impl QuoteSlot {
    pub fn store(&self, quote: &Quote) {
        self.seq.write(|| {
            store_u64(&self.capture_time_ms, quote.capture_time_ms);
            store_decimal(&self.bid_price, quote.bid_price);
            store_decimal(&self.bid_qty, quote.bid_qty);
            store_decimal(&self.ask_price, quote.ask_price);
            store_decimal(&self.ask_qty, quote.ask_qty);
        });
    }

    pub fn load(&self) -> Option<Quote> {
        self.seq.read(|| Quote {
            capture_time_ms: load_u64(&self.capture_time_ms),
            bid_price: load_decimal(&self.bid_price),
            bid_qty: load_decimal(&self.bid_qty),
            ask_price: load_decimal(&self.ask_price),
            ask_qty: load_decimal(&self.ask_qty),
        })
    }
}

/// Mirrored balances written by the balance sync agent
#[repr(C)]
#[derive(Debug, Default)]
pub struct AccountSlot {
    pub seq: SeqLock,
    pub cash_balance: AtomicU64,
    pub asset_balance: AtomicU64,
}

impl AccountSlot {
    pub fn store(&self, account: &AccountSnapshot) {
        self.seq.write(|| {
            store_decimal(&self.cash_balance, account.cash_balance);
            store_decimal(&self.asset_balance, account.asset_balance);
        });
    }

    pub fn load(&self) -> Option<AccountSnapshot> {
        self.seq.read(|| AccountSnapshot {
            cash_balance: load_decimal(&self.cash_balance),
            asset_balance: load_decimal(&self.asset_balance),
        })
    }
}

/// Strategy command written by the external process
#[repr(C)]
#[derive(Debug, Default)]
pub struct CommandSlot {
    pub seq: SeqLock,
    pub sequence_id: AtomicU64,
    pub action: AtomicU64,
    pub quantity: AtomicU64,
    pub limit_price: AtomicU64,
}

impl CommandSlot {
    pub fn store(&self, command: &Command) {
        self.seq.write(|| {
            store_u64(&self.sequence_id, command.sequence_id);
            store_u64(&self.action, command.action_code);
            store_decimal(&self.quantity, command.quantity);
            store_decimal(&self.limit_price, command.limit_price);
        });
    }

    pub fn load(&self) -> Option<Command> {
        self.seq.read(|| Command {
            sequence_id: load_u64(&self.sequence_id),
            action_code: load_u64(&self.action),
            quantity: load_decimal(&self.quantity),
            limit_price: load_limit_price(&self.limit_price),
        })
    }
}

/// Outcome of the latest command, written by the simulator
#[repr(C)]
#[derive(Debug, Default)]
pub struct StatusSlot {
    pub seq: SeqLock,
    pub sequence_id: AtomicU64,
    pub state: AtomicU64,
    pub reject_reason: AtomicU64,
    pub fill_price: AtomicU64,
    pub fill_qty: AtomicU64,
    pub fee: AtomicU64,
}

impl StatusSlot {
    pub fn store(&self, status: &CommandStatus) {
        self.seq.write(|| {
            store_u64(&self.sequence_id, status.sequence_id);
            store_u64(&self.state, status.state.code());
            store_u64(
                &self.reject_reason,
                status.reject_reason.map(|r| r.code()).unwrap_or(0),
            );
            store_decimal(&self.fill_price, status.fill_price);
            store_decimal(&self.fill_qty, status.fill_qty);
            store_decimal(&self.fee, status.fee);
        });
    }

    pub fn load(&self) -> Option<CommandStatus> {
        self.seq.read(|| CommandStatus {
            sequence_id: load_u64(&self.sequence_id),
            state: OrderState::from_code(load_u64(&self.state)),
            reject_reason: RejectReason::from_code(load_u64(&self.reject_reason)),
            fill_price: load_decimal(&self.fill_price),
            fill_qty: load_decimal(&self.fill_qty),
            fee: load_decimal(&self.fee),
        })
    }
}

/// The whole region, in wire order
#[repr(C)]
#[derive(Debug, Default)]
pub struct ChannelLayout {
    pub quote: QuoteSlot,
    pub account: AccountSlot,
    pub command: CommandSlot,
    pub status: StatusSlot,
}

const _: () = assert!(std::mem::size_of::<ChannelLayout>() == LAYOUT_SIZE);
const _: () = assert!(std::mem::align_of::<ChannelLayout>() == 8);
