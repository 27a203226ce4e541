//! Domain types shared by the feed, the channel and the simulator

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest top-of-book for the traded instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quote {
    /// Wall-clock milliseconds since the Unix epoch when the message was received
    pub capture_time_ms: u64,
    pub bid_price: Decimal,
    pub bid_qty: Decimal,
    pub ask_price: Decimal,
    pub ask_qty: Decimal,
}

impl Quote {
    /// True once the feed has published at least one update
    pub fn is_published(&self) -> bool {
        self.capture_time_ms != 0
    }
}

/// Balances mirrored to the strategy process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub cash_balance: Decimal,
    pub asset_balance: Decimal,
}

/// Command action written by the strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    #[default]
    None,
    Buy,
    Sell,
}

impl Action {
    /// Wire code in the command slot
    pub fn code(&self) -> u64 {
        match self {
            Action::None => 0,
            Action::Buy => 1,
            Action::Sell => 2,
        }
    }

    /// Decode a wire code; unknown codes yield `None`
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Action::None),
            1 => Some(Action::Buy),
            2 => Some(Action::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::None => write!(f, "NONE"),
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
        }
    }
}

/// Strategy command as read from the command slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Command {
    pub sequence_id: u64,
    /// Raw action code; kept raw so an unknown code can be rejected explicitly
    pub action_code: u64,
    pub quantity: Decimal,
    /// Zero means market order
    pub limit_price: Decimal,
}

impl Command {
    pub fn new(sequence_id: u64, action: Action, quantity: Decimal, limit_price: Decimal) -> Self {
        Self {
            sequence_id,
            action_code: action.code(),
            quantity,
            limit_price,
        }
    }

    pub fn market(sequence_id: u64, action: Action, quantity: Decimal) -> Self {
        Self::new(sequence_id, action, quantity, Decimal::ZERO)
    }

    pub fn action(&self) -> Option<Action> {
        Action::from_code(self.action_code)
    }

    pub fn is_market(&self) -> bool {
        self.limit_price.is_zero()
    }
}

/// Lifecycle state reported back through the status slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderState {
    #[default]
    Idle,
    Pending,
    Filled,
    Rejected,
    Cancelled,
}

impl OrderState {
    pub fn code(&self) -> u64 {
        match self {
            OrderState::Idle => 0,
            OrderState::Pending => 1,
            OrderState::Filled => 2,
            OrderState::Rejected => 3,
            OrderState::Cancelled => 4,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code {
            1 => OrderState::Pending,
            2 => OrderState::Filled,
            3 => OrderState::Rejected,
            4 => OrderState::Cancelled,
            _ => OrderState::Idle,
        }
    }
}

/// Why a command did not fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    InsufficientCash,
    InsufficientAsset,
    InvalidQuantity,
    InvalidAction,
    InvalidPrice,
    /// Notional or resulting balance out of range
    Overflow,
}

impl RejectReason {
    pub fn code(&self) -> u64 {
        match self {
            RejectReason::InsufficientCash => 1,
            RejectReason::InsufficientAsset => 2,
            RejectReason::InvalidQuantity => 3,
            RejectReason::InvalidAction => 4,
            RejectReason::InvalidPrice => 5,
            RejectReason::Overflow => 6,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(RejectReason::InsufficientCash),
            2 => Some(RejectReason::InsufficientAsset),
            3 => Some(RejectReason::InvalidQuantity),
            4 => Some(RejectReason::InvalidAction),
            5 => Some(RejectReason::InvalidPrice),
            6 => Some(RejectReason::Overflow),
            _ => None,
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::InsufficientCash => write!(f, "insufficient cash"),
            RejectReason::InsufficientAsset => write!(f, "insufficient asset"),
            RejectReason::InvalidQuantity => write!(f, "invalid quantity"),
            RejectReason::InvalidAction => write!(f, "invalid action"),
            RejectReason::InvalidPrice => write!(f, "invalid limit price"),
            RejectReason::Overflow => write!(f, "amount overflow"),
        }
    }
}

/// Outcome of the most recent command, written by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandStatus {
    pub sequence_id: u64,
    pub state: OrderState,
    pub reject_reason: Option<RejectReason>,
    pub fill_price: Decimal,
    pub fill_qty: Decimal,
    pub fee: Decimal,
}

impl CommandStatus {
    pub fn pending(sequence_id: u64) -> Self {
        Self {
            sequence_id,
            state: OrderState::Pending,
            ..Default::default()
        }
    }

    pub fn cancelled(sequence_id: u64) -> Self {
        Self {
            sequence_id,
            state: OrderState::Cancelled,
            ..Default::default()
        }
    }

    pub fn rejected(sequence_id: u64, reason: RejectReason) -> Self {
        Self {
            sequence_id,
            state: OrderState::Rejected,
            reject_reason: Some(reason),
            ..Default::default()
        }
    }

    pub fn filled(sequence_id: u64, price: Decimal, qty: Decimal, fee: Decimal) -> Self {
        Self {
            sequence_id,
            state: OrderState::Filled,
            reject_reason: None,
            fill_price: price,
            fill_qty: qty,
            fee,
        }
    }
}

/// Connection state of the market feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeedState {
    #[default]
    Disconnected,
    Connecting,
    Handshaking,
    Streaming,
}

impl std::fmt::Display for FeedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedState::Disconnected => write!(f, "disconnected"),
            FeedState::Connecting => write!(f, "connecting"),
            FeedState::Handshaking => write!(f, "handshaking"),
            FeedState::Streaming => write!(f, "streaming"),
        }
    }
}

/// Observable events emitted by the execution simulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionEvent {
    OrderPlaced {
        sequence_id: u64,
        action: Action,
        quantity: Decimal,
        limit_price: Decimal,
    },
    /// The outstanding order was abandoned by a newer command
    OrderCancelled {
        sequence_id: u64,
        superseded_by: u64,
    },
    OrderFilled {
        sequence_id: u64,
        action: Action,
        quantity: Decimal,
        price: Decimal,
        fee: Decimal,
    },
    OrderRejected {
        sequence_id: u64,
        reason: RejectReason,
    },
}

impl ExecutionEvent {
    pub fn sequence_id(&self) -> u64 {
        match self {
            ExecutionEvent::OrderPlaced { sequence_id, .. }
            | ExecutionEvent::OrderCancelled { sequence_id, .. }
            | ExecutionEvent::OrderFilled { sequence_id, .. }
            | ExecutionEvent::OrderRejected { sequence_id, .. } => *sequence_id,
        }
    }
}

/// Convert a decimal to the f64 stored in the shared region
pub fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Convert an f64 read from the shared region; NaN and infinities become zero
pub fn f64_to_decimal(value: f64) -> Decimal {
    if !value.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}
