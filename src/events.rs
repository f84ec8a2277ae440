// 11.0: every ledger mutation produces an event. used for audit trails and for replaying
// what the ledger did against recorded venue traffic. EventPayload lists all event types.

use crate::order::{ExecutionType, OrderStatus};
use crate::types::{ClientOrderId, SecurityId, Side, Timestamp, TradeId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    // Order events
    OrderAccepted(OrderAcceptedEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
    Fill(FillEvent),

    // Margin events
    PositionChanged(PositionChangedEvent),
    Commission(CommissionEvent),

    // Balance events
    BalanceChanged(BalanceChangedEvent),

    // Reconciliation
    Synced(SyncedEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAcceptedEvent {
    pub client_order_id: ClientOrderId,
    pub security_id: SecurityId,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub client_order_id: ClientOrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub execution_type: ExecutionType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub client_order_id: ClientOrderId,
    pub security_id: SecurityId,
    pub trade_id: TradeId,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub taker: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionChangedEvent {
    pub security_id: SecurityId,
    pub old_raw_size: i64,
    pub new_raw_size: i64,
    pub cost: i64,
    pub realized_pnl: i64, // raw margin units
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionEvent {
    pub security_id: SecurityId,
    pub trade_id: TradeId,
    pub rate: Decimal,
    pub amount: i64, // raw margin units, negative = rebate
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceChangedEvent {
    pub asset: String,
    pub delta: Decimal,
    pub new_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedEvent {
    pub securities: usize,
    pub orders: usize,
    pub positions: usize,
    pub balances: usize,
    pub margin: i64,
}

pub trait EventEmitter {
    fn emit(&mut self, event: Event);
}

/// Bounded in-memory event log. oldest events are dropped first.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
    next_id: u64,
    capacity: usize,
    verbose: bool,
}

impl EventLog {
    pub fn new(capacity: usize, verbose: bool) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            capacity,
            verbose,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn record(&mut self, timestamp: Timestamp, payload: EventPayload) {
        let event = Event::new(self.next_id(), timestamp, payload);
        self.emit(event);
    }
}

impl EventEmitter for EventLog {
    fn emit(&mut self, event: Event) {
        if self.verbose {
            tracing::trace!(event_id = event.id.0, payload = ?event.payload, "ledger event");
        }

        self.events.push(event);

        if self.events.len() > self.capacity {
            let drain_count = self.events.len() - self.capacity;
            self.events.drain(0..drain_count);
        }
    }
}
