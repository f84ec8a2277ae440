// 4.0: open position tracking in raw units. cost is the margin still allocated to the
// open exposure, raw_size is lots with sign = side. rawSize == 0 => cost == 0.
// 4.1 has the close-then-open fill algorithm at the bottom.

use crate::account::LedgerError;
use crate::types::{Precision, SecurityId, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub security_id: SecurityId,
    /// Margin-currency raw units (scaled by margin precision)
    pub cost: i64,
    /// Lot raw units. positive = net long, negative = net short
    pub raw_size: i64,
    pub cross: bool,
}

impl Position {
    pub fn new(security_id: SecurityId, cross: bool) -> Self {
        Self {
            security_id,
            cost: 0,
            raw_size: 0,
            cross,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.raw_size == 0
    }

    pub fn side(&self) -> Option<Side> {
        match self.raw_size {
            s if s > 0 => Some(Side::Buy),
            s if s < 0 => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.cost = 0;
        self.raw_size = 0;
    }
}

/// Everything the fill algorithm needs to know about the instrument.
#[derive(Debug, Clone, Copy)]
pub struct ContractTerms {
    pub lot: Precision,
    pub margin: Precision,
    pub multiplier: Decimal,
}

impl ContractTerms {
    // 4.2: (raw/lot) * price * multiplier, in margin raw units
    pub fn margin_value(&self, raw_size: i64, price: Decimal) -> Option<i64> {
        let value = self
            .lot
            .from_raw(raw_size)
            .checked_mul(price)?
            .checked_mul(self.multiplier)?;
        self.margin.to_raw(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionUpdate {
    pub old_raw_size: i64,
    pub new_raw_size: i64,
    /// Lots taken off the existing exposure
    pub closed: i64,
    /// Lots added in the fill's direction (a pure open or the far side of a flip)
    pub opened: i64,
    /// PnL moved out of cost into the account margin, raw units
    pub realized_pnl: i64,
}

// signed_closed * numerator / raw_size, truncating toward zero
fn proportional(signed_closed: i64, numerator: i128, raw_size: i64) -> Option<i64> {
    let slice = (signed_closed as i128).checked_mul(numerator)? / raw_size as i128;
    i64::try_from(slice).ok()
}

// 4.3: apply one fill. price is already the settlement price (1/price for inverse).
// closes against the current net position first, then opens with whatever is left.
pub fn apply_fill(
    position: &mut Position,
    side: Side,
    raw_fill: i64,
    price: Decimal,
    terms: &ContractTerms,
) -> Result<PositionUpdate, LedgerError> {
    debug_assert!(raw_fill > 0, "fill quantity must be positive");

    let old_raw_size = position.raw_size;
    let mut remaining = raw_fill;
    let mut realized_pnl = 0i64;
    let mut closed = 0i64;

    let against = position.raw_size != 0 && position.raw_size.signum() != side.sign();
    if against {
        closed = remaining.min(position.raw_size.abs());
        let signed_closed = closed * position.raw_size.signum();

        let mark_value = terms
            .margin_value(position.raw_size, price)
            .ok_or(LedgerError::Overflow)?;
        // pnl of the whole position at this price. cost - mark_value is the unrealized cost.
        let unrealized = mark_value as i128 - position.cost as i128;

        let mark_slice = proportional(signed_closed, mark_value as i128, position.raw_size)
            .ok_or(LedgerError::Overflow)?;
        realized_pnl = proportional(signed_closed, unrealized, position.raw_size)
            .ok_or(LedgerError::Overflow)?;

        // a full close removes mark_value - (mark_value - cost) = cost exactly
        position.cost = mark_slice
            .checked_sub(realized_pnl)
            .and_then(|entry_slice| position.cost.checked_sub(entry_slice))
            .ok_or(LedgerError::Overflow)?;
        position.raw_size -= signed_closed;
        remaining -= closed;
    }

    if remaining > 0 {
        let signed_open = side.sign() * remaining;
        let notional = terms
            .margin_value(signed_open, price)
            .ok_or(LedgerError::Overflow)?;
        position.cost = position
            .cost
            .checked_add(notional)
            .ok_or(LedgerError::Overflow)?;
        position.raw_size = position
            .raw_size
            .checked_add(signed_open)
            .ok_or(LedgerError::Overflow)?;
    }

    debug_assert!(position.raw_size != 0 || position.cost == 0);

    Ok(PositionUpdate {
        old_raw_size,
        new_raw_size: position.raw_size,
        closed,
        opened: remaining,
        realized_pnl,
    })
}
