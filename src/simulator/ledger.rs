//! Virtual cash/asset ledger for shadow execution

use rust_decimal::Decimal;

use super::fees::{round_amount, FeeSchedule};
use crate::common::errors::LedgerError;
use crate::common::types::{AccountSnapshot, Action};

/// A fill applied to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    pub action: Action,
    pub price: Decimal,
    pub quantity: Decimal,
    /// Fee charged, rounded with the ledger rule
    pub fee: Decimal,
}

/// In-process balances; never persisted
///
/// Every mutation checks funds and range first. A failed check leaves both
/// balances untouched, so neither can go negative. Cash amounts follow the
/// ledger rounding rule; quantities are credited and debited exactly.
#[derive(Debug, Clone, Default)]
pub struct VirtualLedger {
    cash: Decimal,
    asset: Decimal,
    /// Total fees paid
    pub total_fees: Decimal,
    /// Number of fills applied
    pub trade_count: u64,
    /// Number of fills refused
    pub reject_count: u64,
}

impl VirtualLedger {
    pub fn new(starting_cash: Decimal) -> Self {
        Self {
            cash: round_amount(starting_cash.max(Decimal::ZERO)),
            ..Default::default()
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn asset(&self) -> Decimal {
        self.asset
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            cash_balance: self.cash,
            asset_balance: self.asset,
        }
    }

    /// Buy `quantity` at `price`, debiting notional plus fee
    pub fn apply_buy(
        &mut self,
        price: Decimal,
        quantity: Decimal,
        fees: &FeeSchedule,
    ) -> Result<Fill, LedgerError> {
        let overflow = LedgerError::Overflow { price, quantity };
        let Some((total_cost, fee)) = fees.cash_amount(Action::Buy, price, quantity) else {
            return Err(self.refuse(overflow));
        };
        if total_cost > self.cash {
            return Err(self.refuse(LedgerError::InsufficientCash {
                required: total_cost,
                available: self.cash,
            }));
        }
        let Some(asset) = self.asset.checked_add(quantity) else {
            return Err(self.refuse(overflow));
        };

        self.cash -= total_cost;
        self.asset = asset;
        self.record_fill(fee);

        Ok(Fill {
            action: Action::Buy,
            price,
            quantity,
            fee,
        })
    }

    /// Sell `quantity` at `price`, crediting proceeds net of fee
    pub fn apply_sell(
        &mut self,
        price: Decimal,
        quantity: Decimal,
        fees: &FeeSchedule,
    ) -> Result<Fill, LedgerError> {
        if quantity > self.asset {
            return Err(self.refuse(LedgerError::InsufficientAsset {
                required: quantity,
                available: self.asset,
            }));
        }
        let overflow = LedgerError::Overflow { price, quantity };
        let Some((proceeds, fee)) = fees.cash_amount(Action::Sell, price, quantity) else {
            return Err(self.refuse(overflow));
        };
        // Proceeds floor at zero so a fee rate above 1 cannot debit cash
        let Some(cash) = self.cash.checked_add(proceeds.max(Decimal::ZERO)) else {
            return Err(self.refuse(overflow));
        };

        self.asset -= quantity;
        self.cash = cash;
        self.record_fill(fee);

        Ok(Fill {
            action: Action::Sell,
            price,
            quantity,
            fee,
        })
    }

    fn record_fill(&mut self, fee: Decimal) {
        self.total_fees = self.total_fees.saturating_add(fee);
        self.trade_count += 1;
    }

    fn refuse(&mut self, err: LedgerError) -> LedgerError {
        self.reject_count += 1;
        err
    }
}
