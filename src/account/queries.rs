// 10.5 account/queries.rs: read-only projections. nothing here mutates the account.
// leverage and available margin need a mark per open position and fail with NoMarkPrice
// rather than guess.

use super::core::Account;
use super::results::{LedgerError, RejectReason};
use crate::margin;
use crate::order::{Order, OrderFilter};
use crate::position::Position;
use crate::types::{OrderRef, SecurityId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Open position in floating units. `cost` is in margin currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionView {
    pub security_id: SecurityId,
    pub quantity: Decimal,
    pub cost: Decimal,
    pub cross: bool,
}

// raw uPnL and raw |exposure| of one position at its mark
struct Valuation {
    unrealized: i64,
    exposure: i64,
}

impl Account {
    /// Orders matching `filter`, all of them for `None`. Ordered by client id.
    pub fn get_orders(&self, filter: Option<&OrderFilter>) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .map(|record| &record.order)
            .filter(|order| filter.map_or(true, |f| f.matches(order)))
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.client_order_id.cmp(&b.client_order_id));
        orders
    }

    pub fn get_order(&self, id: &OrderRef) -> Option<Order> {
        self.orders.find(id).map(|record| record.order.clone())
    }

    /// Non-flat positions, ordered by security id.
    pub fn get_positions(&self) -> Vec<PositionView> {
        let mut views: Vec<PositionView> = self
            .positions
            .values()
            .filter(|position| !position.is_flat())
            .filter_map(|position| self.position_view(position))
            .collect();
        views.sort_by_key(|view| view.security_id);
        views
    }

    pub fn get_position(&self, security_id: SecurityId) -> Option<PositionView> {
        self.positions
            .get(&security_id)
            .filter(|position| !position.is_flat())
            .and_then(|position| self.position_view(position))
    }

    /// Raw sizes and costs, for callers that compare exact state.
    pub fn raw_position(&self, security_id: SecurityId) -> Option<&Position> {
        self.positions.get(&security_id)
    }

    pub fn get_margin(&self) -> Decimal {
        self.margin_precision.from_raw(self.margin)
    }

    pub fn raw_margin(&self) -> i64 {
        self.margin
    }

    pub fn get_balances(&self) -> Vec<(String, Decimal)> {
        self.balances.all()
    }

    pub fn get_balance(&self, asset: &str) -> Decimal {
        self.balances.get(asset)
    }

    /// uPnL of one position at `mark`, in margin currency. Zero when there is no position.
    pub fn unrealized_pnl(&self, security_id: SecurityId, mark: Decimal) -> Result<Decimal, LedgerError> {
        let Some(position) = self.positions.get(&security_id) else {
            return Ok(Decimal::ZERO);
        };
        let valuation = self.valuation(position, mark)?;
        Ok(self.margin_precision.from_raw(valuation.unrealized))
    }

    /// Σ|mark notional| / (margin + ΣuPnL).
    pub fn get_leverage(&self, marks: &HashMap<SecurityId, Decimal>) -> Result<Decimal, LedgerError> {
        let mut exposure = 0i64;
        let mut equity = self.margin;

        for position in self.open_positions() {
            let valuation = self.valuation(position, Self::mark_for(marks, position)?)?;
            exposure = exposure
                .checked_add(valuation.exposure)
                .ok_or(LedgerError::Overflow)?;
            equity = equity
                .checked_add(valuation.unrealized)
                .ok_or(LedgerError::Overflow)?;
        }

        Ok(margin::leverage_ratio(
            self.margin_precision.from_raw(exposure),
            self.margin_precision.from_raw(equity),
        ))
    }

    /// margin + Σ(uPnL − |cost| / leverage), never below zero.
    pub fn get_available_margin(
        &self,
        marks: &HashMap<SecurityId, Decimal>,
        leverage: Decimal,
    ) -> Result<Decimal, LedgerError> {
        if leverage <= Decimal::ZERO {
            return Err(LedgerError::Rejected(RejectReason::Other));
        }

        let mut available = self.get_margin();
        for position in self.open_positions() {
            let valuation = self.valuation(position, Self::mark_for(marks, position)?)?;
            let locked = margin::leveraged_cost(position, leverage, self.margin_precision)
                .ok_or(LedgerError::Overflow)?;
            available = available
                .checked_add(self.margin_precision.from_raw(valuation.unrealized))
                .and_then(|value| value.checked_sub(locked))
                .ok_or(LedgerError::Overflow)?;
        }

        Ok(available.max(Decimal::ZERO))
    }

    fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values().filter(|position| !position.is_flat())
    }

    fn mark_for(marks: &HashMap<SecurityId, Decimal>, position: &Position) -> Result<Decimal, LedgerError> {
        marks
            .get(&position.security_id)
            .copied()
            .ok_or(LedgerError::NoMarkPrice(position.security_id))
    }

    fn valuation(&self, position: &Position, mark: Decimal) -> Result<Valuation, LedgerError> {
        let view = self.view(position.security_id)?;
        let terms = self.contract_terms(view);
        let price = view
            .settlement_price(mark)
            .ok_or(LedgerError::NoMarkPrice(position.security_id))?;

        Ok(Valuation {
            unrealized: margin::unrealized_pnl(position, price, &terms).ok_or(LedgerError::Overflow)?,
            exposure: margin::exposure(position, price, &terms).ok_or(LedgerError::Overflow)?,
        })
    }

    fn position_view(&self, position: &Position) -> Option<PositionView> {
        let view = self.securities.get(&position.security_id)?;
        Some(PositionView {
            security_id: position.security_id,
            quantity: view.lot.from_raw(position.raw_size),
            cost: self.margin_precision.from_raw(position.cost),
            cross: position.cross,
        })
    }
}
