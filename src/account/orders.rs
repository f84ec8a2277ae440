//! Order state machine.
//!
//! Every venue round trip is split in two: a local pending transition that
//! completes immediately, and a confirm/reject driven later by the venue's
//! answer. Duplicate or late answers are no-ops (`Ok(None)`), so venue
//! acknowledgments can be delivered at least once.

use super::core::Account;
use super::results::{LedgerError, RejectReason};
use crate::events::{EventPayload, FillEvent, OrderAcceptedEvent, OrderStatusChangedEvent};
use crate::order::{
    Amendment, ExecutionReport, ExecutionType, Order, OrderRecord, OrderStatus, TimeInForce,
};
use crate::types::{ClientOrderId, OrderRef, TradeId, VenueOrderId};
use rust_decimal::Decimal;

impl Account {
    fn refuse(&self, order: &dyn std::fmt::Display, operation: &str, reason: RejectReason) -> LedgerError {
        tracing::warn!(account = %self.id, order = %order, operation, ?reason, "request refused");
        LedgerError::Rejected(reason)
    }

    fn index_of(&self, id: &OrderRef) -> Result<usize, LedgerError> {
        self.orders
            .lookup(id)
            .ok_or_else(|| self.refuse(id, "lookup", RejectReason::UnknownOrder))
    }

    fn record(&self, index: usize) -> Result<&OrderRecord, LedgerError> {
        self.orders
            .get(index)
            .ok_or(LedgerError::Rejected(RejectReason::UnknownOrder))
    }

    fn invalid(&self, id: &OrderRef, from: OrderStatus, operation: &'static str) -> LedgerError {
        tracing::warn!(account = %self.id, order = %id, ?from, operation, "invalid order transition");
        LedgerError::InvalidTransition {
            order: id.clone(),
            from,
            operation,
        }
    }

    // a venue id indexes exactly one order
    fn claim_venue_id(&mut self, index: usize, venue_id: VenueOrderId) -> Result<(), LedgerError> {
        if let Some(owner) = self.orders.venue_owner(&venue_id, Some(index)) {
            tracing::error!(account = %self.id, venue_order_id = %venue_id, owner = %owner, "venue order id reused");
            return Err(LedgerError::DuplicateVenueOrder {
                venue_order_id: venue_id,
                owner: owner.clone(),
            });
        }
        self.orders.assign_venue_id(index, venue_id);
        Ok(())
    }

    // applies `change` to the record, re-derives its floating quantities and reports the result
    fn apply<F>(
        &mut self,
        index: usize,
        execution_type: ExecutionType,
        change: F,
    ) -> Result<ExecutionReport, LedgerError>
    where
        F: FnOnce(&mut OrderRecord),
    {
        let security_id = self.record(index)?.order.security_id;
        let lot = self.view(security_id)?.lot;
        let now = self.current_time;

        let record = self
            .orders
            .get_mut(index)
            .ok_or(LedgerError::Rejected(RejectReason::UnknownOrder))?;
        let from = record.status();
        change(record);
        record.refresh_quantities(lot);

        let to = record.status();
        let client_order_id = record.order.client_order_id.clone();
        let report = ExecutionReport::for_order(&record.order, execution_type, now);

        tracing::debug!(
            account = %self.id,
            client_order_id = %client_order_id,
            ?from,
            ?to,
            ?execution_type,
            "order transition"
        );
        self.emit_event(EventPayload::OrderStatusChanged(OrderStatusChangedEvent {
            client_order_id,
            from,
            to,
            execution_type,
        }));

        Ok(report)
    }

    /// Accept a locally created order into the ledger as `PendingNew`.
    pub fn new_order(&mut self, mut order: Order) -> Result<ExecutionReport, LedgerError> {
        let client_id = order.client_order_id.clone();

        if self.orders.contains_client(&client_id) {
            return Err(self.refuse(&client_id, "new_order", RejectReason::DuplicateOrder));
        }
        if order.status != OrderStatus::PendingNew {
            return Err(self.refuse(&client_id, "new_order", RejectReason::Other));
        }

        let Some(view) = self.securities.get(&order.security_id) else {
            return Err(self.refuse(&client_id, "new_order", RejectReason::UnknownSymbol));
        };
        let lot = view.lot;

        if !order.cum_quantity.is_zero()
            || order.leaves_quantity <= Decimal::ZERO
            || !lot.is_aligned(order.leaves_quantity, self.config.lot_tolerance)
        {
            return Err(self.refuse(&client_id, "new_order", RejectReason::IncorrectQuantity));
        }
        let Some(raw_leaves) = lot.to_raw(order.leaves_quantity) else {
            return Err(self.refuse(&client_id, "new_order", RejectReason::IncorrectQuantity));
        };

        if let Some(price) = order.price {
            match view.round_price(price) {
                Some(rounded) if rounded > Decimal::ZERO => order.price = Some(rounded),
                _ => return Err(self.refuse(&client_id, "new_order", RejectReason::Other)),
            }
        }
        if order.time_in_force == TimeInForce::GTD && order.expire_at.is_none() {
            return Err(self.refuse(&client_id, "new_order", RejectReason::Other));
        }

        let mut record = OrderRecord::new(order, raw_leaves, raw_leaves, 0);
        record.refresh_quantities(lot);
        let report = ExecutionReport::for_order(&record.order, ExecutionType::PendingNew, self.current_time);

        let accepted = OrderAcceptedEvent {
            client_order_id: client_id.clone(),
            security_id: record.order.security_id,
            side: record.order.side,
            quantity: record.order.quantity,
            price: record.order.price,
        };
        self.orders.insert(record);

        tracing::debug!(account = %self.id, client_order_id = %client_id, "order pending new");
        self.emit_event(EventPayload::OrderAccepted(accepted));

        Ok(report)
    }

    /// Venue accepted the order. Indexes it by venue id and moves it to `New`.
    pub fn confirm_new_order(
        &mut self,
        client_id: &ClientOrderId,
        venue_id: VenueOrderId,
    ) -> Result<Option<ExecutionReport>, LedgerError> {
        let index = self.index_of(&OrderRef::Client(client_id.clone()))?;
        let record = self.record(index)?;
        let status = record.status();

        // a fill can overtake the ack, the venue id still has to be indexed
        if record.order.venue_order_id.is_none() {
            self.claim_venue_id(index, venue_id)?;
        }

        if status != OrderStatus::PendingNew {
            tracing::debug!(account = %self.id, client_order_id = %client_id, ?status, "duplicate new confirmation");
            return Ok(None);
        }

        self.apply(index, ExecutionType::New, |record| {
            record.order.status = OrderStatus::New;
            record.previous_status = OrderStatus::New;
        })
        .map(Some)
    }

    /// Venue refused the order. It leaves the ledger.
    pub fn reject_new_order(
        &mut self,
        client_id: &ClientOrderId,
        reason: RejectReason,
    ) -> Result<ExecutionReport, LedgerError> {
        let id = OrderRef::Client(client_id.clone());
        let index = self.index_of(&id)?;
        let status = self.record(index)?.status();

        if status != OrderStatus::PendingNew {
            return Err(self.invalid(&id, status, "reject_new_order"));
        }

        let report = self.apply(index, ExecutionType::Rejected, |record| {
            record.order.status = OrderStatus::Rejected;
            record.raw_leaves = 0;
        })?;
        self.orders.remove(index);

        Ok(report.with_reject_reason(reason))
    }

    /// Local cancel request. Snapshots the current status for a possible reject.
    pub fn cancel_order(&mut self, id: &OrderRef) -> Result<ExecutionReport, LedgerError> {
        let index = self.index_of(id)?;
        let status = self.record(index)?.status();

        match status {
            OrderStatus::New | OrderStatus::PartiallyFilled => {}
            OrderStatus::PendingCancel => {
                return Err(self.refuse(id, "cancel_order", RejectReason::CancelAlreadyPending))
            }
            OrderStatus::PendingReplace => {
                return Err(self.refuse(id, "cancel_order", RejectReason::ReplaceAlreadyPending))
            }
            OrderStatus::PendingNew => {
                return Err(self.refuse(id, "cancel_order", RejectReason::Other))
            }
            OrderStatus::Filled
            | OrderStatus::Canceled
            | OrderStatus::Rejected
            | OrderStatus::Expired => {
                return Err(self.refuse(id, "cancel_order", RejectReason::TooLateToCancel))
            }
        }

        self.apply(index, ExecutionType::PendingCancel, |record| {
            record.begin_pending(OrderStatus::PendingCancel);
        })
    }

    /// Venue canceled the order. Leaves go to zero.
    pub fn confirm_cancel_order(&mut self, id: &OrderRef) -> Result<Option<ExecutionReport>, LedgerError> {
        let index = self.index_of(id)?;
        let status = self.record(index)?.status();

        match status {
            OrderStatus::Canceled => {
                tracing::debug!(account = %self.id, order = %id, "duplicate cancel confirmation");
                Ok(None)
            }
            OrderStatus::PendingCancel => self
                .apply(index, ExecutionType::Canceled, |record| {
                    record.order.status = OrderStatus::Canceled;
                    record.raw_leaves = 0;
                    record.amendment = None;
                })
                .map(Some),
            other => Err(self.invalid(id, other, "confirm_cancel_order")),
        }
    }

    /// Venue refused the cancel. The order goes back to where it was.
    pub fn reject_cancel_order(
        &mut self,
        id: &OrderRef,
        reason: RejectReason,
    ) -> Result<Option<ExecutionReport>, LedgerError> {
        let index = self.index_of(id)?;
        let status = self.record(index)?.status();

        if status != OrderStatus::PendingCancel {
            tracing::debug!(account = %self.id, order = %id, ?status, "late cancel reject ignored");
            return Ok(None);
        }

        let report = self.apply(index, ExecutionType::Rejected, OrderRecord::restore_previous)?;
        Ok(Some(report.with_reject_reason(reason)))
    }

    /// Local amend request. `quantity` is the new total quantity.
    pub fn replace_order(
        &mut self,
        id: &OrderRef,
        price: Option<Decimal>,
        quantity: Option<Decimal>,
    ) -> Result<ExecutionReport, LedgerError> {
        let index = self.index_of(id)?;
        let record = self.record(index)?;
        let status = record.status();
        let raw_cum = record.raw_cum;
        let security_id = record.order.security_id;

        match status {
            OrderStatus::New | OrderStatus::PartiallyFilled => {}
            OrderStatus::PendingReplace => {
                return Err(self.refuse(id, "replace_order", RejectReason::ReplaceAlreadyPending))
            }
            OrderStatus::PendingCancel => {
                return Err(self.refuse(id, "replace_order", RejectReason::CancelAlreadyPending))
            }
            OrderStatus::PendingNew => {
                return Err(self.refuse(id, "replace_order", RejectReason::Other))
            }
            OrderStatus::Filled
            | OrderStatus::Canceled
            | OrderStatus::Rejected
            | OrderStatus::Expired => {
                return Err(self.refuse(id, "replace_order", RejectReason::TooLateToCancel))
            }
        }

        if price.is_none() && quantity.is_none() {
            return Err(self.refuse(id, "replace_order", RejectReason::Other));
        }

        let view = self.view(security_id)?;
        let new_price = match price {
            Some(price) => match view.round_price(price) {
                Some(rounded) if rounded > Decimal::ZERO => Some(rounded),
                _ => return Err(self.refuse(id, "replace_order", RejectReason::Other)),
            },
            None => None,
        };
        let raw_quantity = match quantity {
            Some(quantity) => {
                let raw = if view.lot.is_aligned(quantity, self.config.lot_tolerance) {
                    view.lot.to_raw(quantity)
                } else {
                    None
                };
                match raw {
                    Some(raw) if raw > raw_cum => Some(raw),
                    _ => return Err(self.refuse(id, "replace_order", RejectReason::IncorrectQuantity)),
                }
            }
            None => None,
        };

        self.apply(index, ExecutionType::PendingReplace, |record| {
            record.begin_pending(OrderStatus::PendingReplace);
            record.amendment = Some(Amendment {
                price: new_price,
                raw_quantity,
            });
        })
    }

    /// Venue applied the amendment. Some venues hand out a new order id on replace.
    pub fn confirm_replace_order(
        &mut self,
        id: &OrderRef,
        new_venue_id: Option<VenueOrderId>,
    ) -> Result<Option<ExecutionReport>, LedgerError> {
        let index = self.index_of(id)?;
        let record = self.record(index)?;
        let status = record.status();

        if status.is_resting() {
            tracing::debug!(account = %self.id, order = %id, "duplicate replace confirmation");
            return Ok(None);
        }
        if status != OrderStatus::PendingReplace {
            return Err(self.invalid(id, status, "confirm_replace_order"));
        }

        let amendment = record.amendment.unwrap_or(Amendment {
            price: None,
            raw_quantity: None,
        });
        if let Some(raw_quantity) = amendment.raw_quantity {
            // fills during the pending window may have eaten into the new size
            if raw_quantity <= record.raw_cum {
                self.apply(index, ExecutionType::Rejected, OrderRecord::restore_previous)?;
                return Err(self.refuse(id, "confirm_replace_order", RejectReason::IncorrectQuantity));
            }
        }

        if let Some(venue_id) = new_venue_id {
            self.claim_venue_id(index, venue_id)?;
        }

        self.apply(index, ExecutionType::Replaced, |record| {
            if let Some(price) = amendment.price {
                record.order.price = Some(price);
            }
            if let Some(raw_quantity) = amendment.raw_quantity {
                record.raw_quantity = raw_quantity;
                record.raw_leaves = raw_quantity - record.raw_cum;
            }
            record.amendment = None;
            record.order.status = OrderStatus::New;
            record.previous_status = OrderStatus::New;
        })
        .map(Some)
    }

    /// Venue refused the amendment. Price, quantity and status stay as they were.
    pub fn reject_replace_order(
        &mut self,
        id: &OrderRef,
        reason: RejectReason,
    ) -> Result<Option<ExecutionReport>, LedgerError> {
        let index = self.index_of(id)?;
        let status = self.record(index)?.status();

        if status != OrderStatus::PendingReplace {
            tracing::debug!(account = %self.id, order = %id, ?status, "late replace reject ignored");
            return Ok(None);
        }

        let report = self.apply(index, ExecutionType::Rejected, OrderRecord::restore_previous)?;
        Ok(Some(report.with_reject_reason(reason)))
    }

    /// Cancel/replace refused because the venue no longer knows the order: it filled.
    /// The pending request is dropped so the in-flight fills can land.
    pub fn pending_filled(&mut self, id: &OrderRef) -> Result<Option<ExecutionReport>, LedgerError> {
        let index = self.index_of(id)?;
        let status = self.record(index)?.status();

        match status {
            OrderStatus::PendingCancel | OrderStatus::PendingReplace => {
                let report = self.apply(index, ExecutionType::Rejected, OrderRecord::restore_previous)?;
                Ok(Some(report.with_reject_reason(RejectReason::TooLateToCancel)))
            }
            _ => {
                tracing::debug!(account = %self.id, order = %id, ?status, "pending fill on settled order ignored");
                Ok(None)
            }
        }
    }

    /// Apply a venue fill. The quantity must sit on the lot grid. The fill settles into
    /// positions or balances first, then the order moves in raw lot units. A repeated
    /// trade id is ignored.
    pub fn confirm_fill(
        &mut self,
        id: &OrderRef,
        trade_id: TradeId,
        price: Decimal,
        quantity: Decimal,
        taker: bool,
    ) -> Result<Option<ExecutionReport>, LedgerError> {
        let index = self.index_of(id)?;
        let record = self.record(index)?;

        if record.has_trade(&trade_id) {
            tracing::debug!(account = %self.id, order = %id, trade_id = %trade_id, "duplicate fill ignored");
            return Ok(None);
        }

        let client_order_id = record.order.client_order_id.clone();
        let security_id = record.order.security_id;
        let side = record.order.side;
        let raw_leaves = record.raw_leaves;

        if price <= Decimal::ZERO {
            return Err(self.refuse(id, "confirm_fill", RejectReason::Other));
        }
        let lot = self.view(security_id)?.lot;
        if !lot.is_aligned(quantity, self.config.lot_tolerance) {
            return Err(self.refuse(id, "confirm_fill", RejectReason::IncorrectQuantity));
        }
        let raw_fill = lot.to_raw(quantity).ok_or(LedgerError::Overflow)?;
        if raw_fill <= 0 {
            return Err(self.refuse(id, "confirm_fill", RejectReason::IncorrectQuantity));
        }
        if raw_fill > raw_leaves {
            tracing::warn!(
                account = %self.id,
                client_order_id = %client_order_id,
                raw_fill,
                raw_leaves,
                "fill exceeds leaves"
            );
            return Err(LedgerError::FillExceedsLeaves {
                client_order_id,
                fill: raw_fill,
                leaves: raw_leaves,
            });
        }

        // book the fill on the grid, never the reported decimal
        let quantity = lot.from_raw(raw_fill);

        // settlement is all-or-nothing, so a failure here leaves the order untouched
        self.settle_fill(security_id, side, &trade_id, price, quantity, raw_fill, taker)?;

        let fill_trade_id = trade_id.clone();
        let report = self.apply(index, ExecutionType::Trade, |record| {
            record.note_trade(&fill_trade_id);
            record.raw_leaves -= raw_fill;
            record.raw_cum += raw_fill;

            if record.raw_leaves == 0 {
                record.order.status = OrderStatus::Filled;
                record.amendment = None;
            } else if matches!(
                record.order.status,
                OrderStatus::PendingCancel | OrderStatus::PendingReplace
            ) {
                // stay pending; a reject must land on the filled state
                record.previous_status = OrderStatus::PartiallyFilled;
            } else {
                record.order.status = OrderStatus::PartiallyFilled;
            }
        })?;

        self.emit_event(EventPayload::Fill(FillEvent {
            client_order_id,
            security_id,
            trade_id: trade_id.clone(),
            side,
            price,
            quantity,
            taker,
        }));

        Ok(Some(report.with_fill(trade_id, price, quantity)))
    }

    /// Venue reports the order expired.
    pub fn confirm_expired_order(&mut self, id: &OrderRef) -> Result<Option<ExecutionReport>, LedgerError> {
        let index = self.index_of(id)?;
        let status = self.record(index)?.status();

        match status {
            OrderStatus::Expired => Ok(None),
            s if s.is_terminal() => Err(self.invalid(id, s, "confirm_expired_order")),
            _ => self.apply(index, ExecutionType::Expired, expire).map(Some),
        }
    }

    /// Expire every working order whose good-till date has passed at the account's time.
    pub fn check_expiration(&mut self) -> Result<Vec<ExecutionReport>, LedgerError> {
        let now = self.current_time;
        let due = self.orders.indexes_where(|record| {
            let working = record.status().is_resting()
                || matches!(
                    record.status(),
                    OrderStatus::PendingCancel | OrderStatus::PendingReplace
                );
            working && record.order.expire_at.map_or(false, |at| at <= now)
        });

        let mut reports = Vec::with_capacity(due.len());
        for index in due {
            reports.push(self.apply(index, ExecutionType::Expired, expire)?);
        }
        Ok(reports)
    }

    /// Drop terminal orders from both indexes. Returns how many were removed.
    pub fn prune_closed(&mut self) -> usize {
        let closed = self.orders.indexes_where(|record| record.status().is_terminal());
        let count = closed.len();
        for index in closed {
            self.orders.remove(index);
        }
        count
    }
}

fn expire(record: &mut OrderRecord) {
    record.order.status = OrderStatus::Expired;
    record.raw_leaves = 0;
    record.amendment = None;
}
