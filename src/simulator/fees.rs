use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::common::types::Action;

/// Fractional digits kept on every ledger amount
pub const LEDGER_SCALE: u32 = 8;

/// The single rounding rule for ledger amounts: 8 digits, banker's rounding
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(LEDGER_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Fee configuration for the simulated venue
///
/// Every simulated fill takes liquidity, so only the taker rate applies,
/// on both buys and sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    /// Taker fee as a fraction of notional (0.00075 = 7.5 bps)
    pub taker_fee_rate: Decimal,
}

impl FeeSchedule {
    pub fn taker(rate: Decimal) -> Self {
        Self {
            taker_fee_rate: rate,
        }
    }

    /// Binance spot taker rate with the BNB discount
    pub fn binance_spot() -> Self {
        Self::taker(dec!(0.00075))
    }

    pub fn zero() -> Self {
        Self::taker(Decimal::ZERO)
    }

    /// Fee charged on `notional`, or `None` on overflow
    pub fn fee(&self, notional: Decimal) -> Option<Decimal> {
        notional.checked_mul(self.taker_fee_rate)
    }

    /// Cash moved by a fill of `quantity` at `price`
    ///
    /// For buying: the price paid plus the fee (a debit)
    /// For selling: the proceeds minus the fee (a credit)
    ///
    /// # Returns
    /// `(cash amount, fee)`, both under the ledger rounding rule, or `None`
    /// when the amounts do not fit a `Decimal`. `Action::None` moves nothing.
    pub fn cash_amount(
        &self,
        action: Action,
        price: Decimal,
        quantity: Decimal,
    ) -> Option<(Decimal, Decimal)> {
        let notional = price.checked_mul(quantity)?;
        let fee = self.fee(notional)?;
        let amount = match action {
            Action::Buy => notional.checked_add(fee)?,
            Action::Sell => notional.checked_sub(fee)?,
            Action::None => return Some((Decimal::ZERO, Decimal::ZERO)),
        };
        Some((round_amount(amount), round_amount(fee)))
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::binance_spot()
    }
}
