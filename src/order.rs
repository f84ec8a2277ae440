//! Orders, execution reports and the order ledger.
//!
//! The ledger stores every order record once, in an arena, and reaches it
//! through two indexes: by client order id (from creation) and by venue order
//! id (from confirmation). Quantities are tracked in raw lot units and the
//! floating fields on [`Order`] are always derived from them.

use crate::account::RejectReason;
use crate::types::{
    ClientOrderId, OrderRef, Precision, SecurityId, Side, Timestamp, TradeId, VenueOrderId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Order time in force options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till canceled. Rests until filled or canceled.
    GTC,
    /// Good till date. Rests until `expire_at`.
    GTD,
    /// Immediate or cancel.
    IOC,
    /// Fill or kill.
    FOK,
    /// Post only. The venue rejects it if it would take.
    PostOnly,
}

impl Default for TimeInForce {
    fn default() -> Self {
        Self::GTC
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    PendingNew,
    New,
    PartiallyFilled,
    Filled,
    PendingCancel,
    PendingReplace,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }

    /// Confirmed by the venue and working on the book.
    pub fn is_resting(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }

    /// Waiting on a venue acknowledgment.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            OrderStatus::PendingNew | OrderStatus::PendingCancel | OrderStatus::PendingReplace
        )
    }
}

/// What happened to produce an execution report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionType {
    PendingNew,
    New,
    PendingCancel,
    Canceled,
    PendingReplace,
    Replaced,
    /// The requested transition was rejected. Also used for cancel/replace rejects.
    Rejected,
    Trade,
    Expired,
}

/// Venue-facing order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub security_id: SecurityId,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub price: Option<Decimal>,
    pub quantity: Decimal,
    pub leaves_quantity: Decimal,
    pub cum_quantity: Decimal,
    pub status: OrderStatus,
    pub expire_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Order {
    pub fn new_limit(
        client_order_id: ClientOrderId,
        security_id: SecurityId,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        time_in_force: TimeInForce,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            client_order_id,
            venue_order_id: None,
            security_id,
            side,
            order_type: OrderType::Limit,
            time_in_force,
            price: Some(price),
            quantity,
            leaves_quantity: quantity,
            cum_quantity: Decimal::ZERO,
            status: OrderStatus::PendingNew,
            expire_at: None,
            created_at: timestamp,
        }
    }

    pub fn new_market(
        client_order_id: ClientOrderId,
        security_id: SecurityId,
        side: Side,
        quantity: Decimal,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            client_order_id,
            venue_order_id: None,
            security_id,
            side,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::IOC,
            price: None,
            quantity,
            leaves_quantity: quantity,
            cum_quantity: Decimal::ZERO,
            status: OrderStatus::PendingNew,
            expire_at: None,
            created_at: timestamp,
        }
    }

    /// Good-till-date variant of a limit order.
    pub fn with_expiry(mut self, expire_at: Timestamp) -> Self {
        self.time_in_force = TimeInForce::GTD;
        self.expire_at = Some(expire_at);
        self
    }

    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }
}

/// Price/quantity change waiting on venue confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Amendment {
    pub price: Option<Decimal>,
    /// New total quantity, in raw lot units
    pub raw_quantity: Option<i64>,
}

/// One slot of the arena: the order plus the ledger's private bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub order: Order,
    /// Status to restore when a cancel/replace is rejected
    pub previous_status: OrderStatus,
    pub raw_quantity: i64,
    pub raw_leaves: i64,
    pub raw_cum: i64,
    pub amendment: Option<Amendment>,
    trade_ids: HashSet<TradeId>,
}

impl OrderRecord {
    pub fn new(order: Order, raw_quantity: i64, raw_leaves: i64, raw_cum: i64) -> Self {
        let previous_status = order.status;
        Self {
            order,
            previous_status,
            raw_quantity,
            raw_leaves,
            raw_cum,
            amendment: None,
            trade_ids: HashSet::new(),
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.order.status
    }

    /// Move to `status`, remembering where we came from.
    pub fn begin_pending(&mut self, status: OrderStatus) {
        self.previous_status = self.order.status;
        self.order.status = status;
    }

    pub fn restore_previous(&mut self) {
        self.order.status = self.previous_status;
        self.amendment = None;
    }

    pub fn has_trade(&self, trade_id: &TradeId) -> bool {
        self.trade_ids.contains(trade_id)
    }

    /// Records the trade id. false if it was already applied.
    pub fn note_trade(&mut self, trade_id: &TradeId) -> bool {
        self.trade_ids.insert(trade_id.clone())
    }

    /// Re-derive the floating quantities from the raw ones.
    pub fn refresh_quantities(&mut self, lot: Precision) {
        self.order.quantity = lot.from_raw(self.raw_quantity);
        self.order.leaves_quantity = lot.from_raw(self.raw_leaves);
        self.order.cum_quantity = lot.from_raw(self.raw_cum);
    }
}

/// Conjunctive filter over orders. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderFilter {
    pub security_id: Option<SecurityId>,
    pub side: Option<Side>,
    pub venue_order_id: Option<VenueOrderId>,
    pub client_order_id: Option<ClientOrderId>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(security_id) = self.security_id {
            if order.security_id != security_id {
                return false;
            }
        }
        if let Some(side) = self.side {
            if order.side != side {
                return false;
            }
        }
        if let Some(venue_id) = &self.venue_order_id {
            if order.venue_order_id.as_ref() != Some(venue_id) {
                return false;
            }
        }
        if let Some(client_id) = &self.client_order_id {
            if &order.client_order_id != client_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if order.status != status {
                return false;
            }
        }
        true
    }
}

/// Acknowledgment record handed back to the adapter for every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Assigned by the caller
    pub seq_num: u64,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub execution_type: ExecutionType,
    pub order_status: OrderStatus,
    pub security_id: SecurityId,
    pub side: Side,
    pub price: Option<Decimal>,
    pub leaves_quantity: Decimal,
    pub cum_quantity: Decimal,
    pub fill_price: Option<Decimal>,
    pub fill_quantity: Option<Decimal>,
    pub trade_id: Option<TradeId>,
    pub reject_reason: Option<RejectReason>,
    pub timestamp: Timestamp,
}

impl ExecutionReport {
    pub fn for_order(order: &Order, execution_type: ExecutionType, timestamp: Timestamp) -> Self {
        Self {
            seq_num: 0,
            client_order_id: order.client_order_id.clone(),
            venue_order_id: order.venue_order_id.clone(),
            execution_type,
            order_status: order.status,
            security_id: order.security_id,
            side: order.side,
            price: order.price,
            leaves_quantity: order.leaves_quantity,
            cum_quantity: order.cum_quantity,
            fill_price: None,
            fill_quantity: None,
            trade_id: None,
            reject_reason: None,
            timestamp,
        }
    }

    pub fn with_fill(mut self, trade_id: TradeId, price: Decimal, quantity: Decimal) -> Self {
        self.trade_id = Some(trade_id);
        self.fill_price = Some(price);
        self.fill_quantity = Some(quantity);
        self
    }

    pub fn with_reject_reason(mut self, reason: RejectReason) -> Self {
        self.reject_reason = Some(reason);
        self
    }

    pub fn with_seq_num(mut self, seq_num: u64) -> Self {
        self.seq_num = seq_num;
        self
    }
}

/// Arena of order records with O(1) lookup by either id.
#[derive(Debug, Clone, Default)]
pub struct OrderLedger {
    slots: Vec<Option<OrderRecord>>,
    free: Vec<usize>,
    by_client: HashMap<ClientOrderId, usize>,
    by_venue: HashMap<VenueOrderId, usize>,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under its client id (and venue id if it already has one).
    pub fn insert(&mut self, record: OrderRecord) -> usize {
        let client_id = record.order.client_order_id.clone();
        let venue_id = record.order.venue_order_id.clone();

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(record);
                index
            }
            None => {
                self.slots.push(Some(record));
                self.slots.len() - 1
            }
        };

        self.by_client.insert(client_id, index);
        if let Some(venue_id) = venue_id {
            self.by_venue.insert(venue_id, index);
        }
        index
    }

    /// Attach a venue id to an existing record and index it.
    pub fn assign_venue_id(&mut self, index: usize, venue_id: VenueOrderId) {
        if let Some(record) = self.slots.get_mut(index).and_then(Option::as_mut) {
            if let Some(old) = record.order.venue_order_id.replace(venue_id.clone()) {
                self.by_venue.remove(&old);
            }
            self.by_venue.insert(venue_id, index);
        }
    }

    /// Client id of the record other than `index` already indexed under `venue_id`.
    pub fn venue_owner(&self, venue_id: &VenueOrderId, index: Option<usize>) -> Option<&ClientOrderId> {
        self.by_venue
            .get(venue_id)
            .filter(|owner| Some(**owner) != index)
            .and_then(|owner| self.get(*owner))
            .map(|record| &record.order.client_order_id)
    }

    pub fn lookup(&self, id: &OrderRef) -> Option<usize> {
        match id {
            OrderRef::Client(client_id) => self.by_client.get(client_id).copied(),
            OrderRef::Venue(venue_id) => self.by_venue.get(venue_id).copied(),
        }
    }

    pub fn contains_client(&self, client_id: &ClientOrderId) -> bool {
        self.by_client.contains_key(client_id)
    }

    pub fn get(&self, index: usize) -> Option<&OrderRecord> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut OrderRecord> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    pub fn find(&self, id: &OrderRef) -> Option<&OrderRecord> {
        self.lookup(id).and_then(|index| self.get(index))
    }

    /// Remove a record from the arena and both indexes.
    pub fn remove(&mut self, index: usize) -> Option<OrderRecord> {
        let record = self.slots.get_mut(index)?.take()?;
        self.by_client.remove(&record.order.client_order_id);
        if let Some(venue_id) = &record.order.venue_order_id {
            self.by_venue.remove(venue_id);
        }
        self.free.push(index);
        Some(record)
    }

    /// Live records in arena order.
    pub fn iter(&self) -> impl Iterator<Item = &OrderRecord> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Arena indexes of live records matching `pred`.
    pub fn indexes_where<F>(&self, pred: F) -> Vec<usize>
    where
        F: Fn(&OrderRecord) -> bool,
    {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().filter(|r| pred(*r)).map(|_| index))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_client.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_client.is_empty()
    }

    pub fn venue_indexed(&self) -> usize {
        self.by_venue.len()
    }
}
