//! Fee and margin arithmetic.
//!
//! Commission is charged on the absolute notional of a fill and floored to the
//! margin grid. Unrealized PnL is the mark value of the open size minus the
//! cost still allocated to it. Available margin nets each position's
//! leveraged cost against its unrealized PnL and is never reported below zero.

use crate::position::{ContractTerms, Position};
use crate::types::Precision;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// |quantity * price * multiplier|. price is the settlement price.
pub fn notional(quantity: Decimal, price: Decimal, multiplier: Decimal) -> Option<Decimal> {
    quantity
        .checked_mul(price)?
        .checked_mul(multiplier)
        .map(|value| value.abs())
}

/// floor(rate * notional * margin precision). Negative rates come back negative (rebate).
pub fn commission(rate: Decimal, notional: Decimal, margin: Precision) -> Option<i64> {
    rate.checked_mul(notional)?
        .checked_mul(Decimal::from(margin.scale()))?
        .floor()
        .to_i64()
}

/// Mark value minus cost, raw margin units. Zero when flat.
pub fn unrealized_pnl(position: &Position, mark: Decimal, terms: &ContractTerms) -> Option<i64> {
    if position.is_flat() {
        return Some(0);
    }
    let mark_value = terms.margin_value(position.raw_size, mark)?;
    mark_value.checked_sub(position.cost)
}

/// Absolute mark value of the position, raw margin units.
pub fn exposure(position: &Position, mark: Decimal, terms: &ContractTerms) -> Option<i64> {
    terms
        .margin_value(position.raw_size, mark)
        .map(|value| value.abs())
}

/// Margin tied up by a position at `leverage`: |cost| / leverage.
pub fn leveraged_cost(position: &Position, leverage: Decimal, margin: Precision) -> Option<Decimal> {
    if leverage <= Decimal::ZERO {
        return None;
    }
    margin
        .from_raw(position.cost)
        .abs()
        .checked_div(leverage)
}

/// exposure / equity. 0 when there is no exposure, MAX when equity is gone.
pub fn leverage_ratio(exposure: Decimal, equity: Decimal) -> Decimal {
    if exposure.is_zero() {
        Decimal::ZERO
    } else if equity <= Decimal::ZERO {
        Decimal::MAX
    } else {
        exposure / equity
    }
}
