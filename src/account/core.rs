// 10.0 account/core.rs: the account aggregate. owns the order ledger, one position per
// instrument, the balances and the realized margin. nothing outside this type mutates them.

use super::results::LedgerError;
use crate::balance::BalanceLedger;
use crate::config::LedgerConfig;
use crate::events::{Event, EventLog, EventPayload};
use crate::order::OrderLedger;
use crate::position::{ContractTerms, Position};
use crate::security::InstrumentView;
use crate::types::{AccountId, Precision, SecurityId, Timestamp};
use std::collections::HashMap;

/** 10.1: one venue account. all state lives here */
#[derive(Debug)]
pub struct Account {
    pub(super) id: AccountId,
    pub(super) config: LedgerConfig,
    pub(super) margin_precision: Precision,
    pub(super) securities: HashMap<SecurityId, InstrumentView>,
    pub(super) orders: OrderLedger,
    pub(super) positions: HashMap<SecurityId, Position>,
    pub(super) balances: BalanceLedger,
    // realized pnl and fees, raw margin units
    pub(super) margin: i64,
    pub(super) events: EventLog,
    pub(super) current_time: Timestamp,
}

impl Account {
    pub fn new(id: AccountId, config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        let margin_precision = config
            .margin_precision()
            .ok_or(LedgerError::Overflow)?;
        let events = EventLog::new(config.max_events, config.verbose);

        tracing::debug!(account = %id, margin_currency = %config.margin_currency, "account created");

        Ok(Self {
            id,
            config,
            margin_precision,
            securities: HashMap::new(),
            orders: OrderLedger::new(),
            positions: HashMap::new(),
            balances: BalanceLedger::new(),
            margin: 0,
            events,
            current_time: Timestamp::from_millis(0),
        })
    }

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn margin_currency(&self) -> &str {
        &self.config.margin_currency
    }

    pub fn margin_precision(&self) -> Precision {
        self.margin_precision
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = self.current_time.add_millis(millis);
    }

    pub fn instrument(&self, security_id: SecurityId) -> Option<&InstrumentView> {
        self.securities.get(&security_id)
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        self.events.recent(count)
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        self.events.record(self.current_time, payload);
    }

    pub(super) fn view(&self, security_id: SecurityId) -> Result<&InstrumentView, LedgerError> {
        self.securities
            .get(&security_id)
            .ok_or(LedgerError::UnknownSecurity(security_id))
    }

    pub(super) fn contract_terms(&self, view: &InstrumentView) -> ContractTerms {
        ContractTerms {
            lot: view.lot,
            margin: self.margin_precision,
            multiplier: view.security.multiplier,
        }
    }
}
