// 12.0 api.rs: message surface for the account. an adapter's event loop owns one Account
// and feeds it one LedgerCommand or LedgerQuery at a time. everything is serde so the
// messages can cross a channel or a process boundary unchanged.

use crate::account::{Account, LedgerError, PositionView, RejectReason, VenueBalance, VenuePosition};
use crate::order::{ExecutionReport, Order, OrderFilter};
use crate::security::Security;
use crate::types::{ClientOrderId, OrderRef, SecurityId, Timestamp, TradeId, VenueOrderId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/** 12.1: every mutating operation */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerCommand {
    SetTime(Timestamp),
    NewOrder(Order),
    ConfirmNewOrder {
        client_order_id: ClientOrderId,
        venue_order_id: VenueOrderId,
    },
    RejectNewOrder {
        client_order_id: ClientOrderId,
        reason: RejectReason,
    },
    CancelOrder(OrderRef),
    ConfirmCancelOrder(OrderRef),
    RejectCancelOrder {
        order: OrderRef,
        reason: RejectReason,
    },
    ReplaceOrder {
        order: OrderRef,
        price: Option<Decimal>,
        quantity: Option<Decimal>,
    },
    ConfirmReplaceOrder {
        order: OrderRef,
        venue_order_id: Option<VenueOrderId>,
    },
    RejectReplaceOrder {
        order: OrderRef,
        reason: RejectReason,
    },
    PendingFilled(OrderRef),
    ConfirmFill {
        order: OrderRef,
        trade_id: TradeId,
        price: Decimal,
        quantity: Decimal,
        taker: bool,
    },
    ConfirmExpiredOrder(OrderRef),
    CheckExpiration,
    PruneClosed,
    Sync {
        securities: Vec<Security>,
        orders: Vec<Order>,
        positions: Vec<VenuePosition>,
        balances: Vec<VenueBalance>,
        maker_fee: Option<Decimal>,
        taker_fee: Option<Decimal>,
    },
}

/** 12.2: read-only projections */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerQuery {
    Orders(Option<OrderFilter>),
    Order(OrderRef),
    Positions,
    Margin,
    Balances,
    UnrealizedPnl { security_id: SecurityId, mark: Decimal },
    Leverage { marks: Vec<(SecurityId, Decimal)> },
    AvailableMargin {
        marks: Vec<(SecurityId, Decimal)>,
        leverage: Decimal,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ApiResponse {
    /// `None` when the message was a duplicate or late acknowledgment
    Report(Option<ExecutionReport>),
    Reports(Vec<ExecutionReport>),
    Pruned(usize),
    Done,
    Orders(Vec<Order>),
    Order(Option<Order>),
    Positions(Vec<PositionView>),
    Balances(Vec<(String, Decimal)>),
    Value(Decimal),
    Error(ApiError),
}

impl ApiResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, ApiResponse::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub reject_reason: Option<RejectReason>,
    pub message: String,
    /// The account must be re-synced before it is used again
    pub fatal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Rejected,
    FillExceedsLeaves,
    ForeignAccount,
    UnknownSecurity,
    InvalidPrecision,
    InvalidTransition,
    DuplicateSnapshotOrder,
    DuplicateVenueOrder,
    NoMarkPrice,
    Overflow,
    Config,
}

impl From<&LedgerError> for ApiError {
    fn from(err: &LedgerError) -> Self {
        let code = match err {
            LedgerError::Rejected(_) => ErrorCode::Rejected,
            LedgerError::FillExceedsLeaves { .. } => ErrorCode::FillExceedsLeaves,
            LedgerError::ForeignAccount { .. } => ErrorCode::ForeignAccount,
            LedgerError::UnknownSecurity(_) => ErrorCode::UnknownSecurity,
            LedgerError::InvalidPrecision { .. } => ErrorCode::InvalidPrecision,
            LedgerError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            LedgerError::DuplicateSnapshotOrder(_) => ErrorCode::DuplicateSnapshotOrder,
            LedgerError::DuplicateVenueOrder { .. } => ErrorCode::DuplicateVenueOrder,
            LedgerError::NoMarkPrice(_) => ErrorCode::NoMarkPrice,
            LedgerError::Overflow => ErrorCode::Overflow,
            LedgerError::Config(_) => ErrorCode::Config,
        };
        Self {
            code,
            reject_reason: err.reject_reason(),
            message: err.to_string(),
            fatal: err.is_fatal(),
        }
    }
}

fn respond<T>(result: Result<T, LedgerError>, wrap: impl FnOnce(T) -> ApiResponse) -> ApiResponse {
    match result {
        Ok(value) => wrap(value),
        Err(err) => ApiResponse::Error(ApiError::from(&err)),
    }
}

impl Account {
    /// Apply one command. Reports carry `seq_num` 0; the caller numbers them.
    pub fn handle(&mut self, command: LedgerCommand) -> ApiResponse {
        match command {
            LedgerCommand::SetTime(timestamp) => {
                self.set_time(timestamp);
                ApiResponse::Done
            }
            LedgerCommand::NewOrder(order) => {
                respond(self.new_order(order), |report| ApiResponse::Report(Some(report)))
            }
            LedgerCommand::ConfirmNewOrder {
                client_order_id,
                venue_order_id,
            } => respond(
                self.confirm_new_order(&client_order_id, venue_order_id),
                ApiResponse::Report,
            ),
            LedgerCommand::RejectNewOrder {
                client_order_id,
                reason,
            } => respond(self.reject_new_order(&client_order_id, reason), |report| {
                ApiResponse::Report(Some(report))
            }),
            LedgerCommand::CancelOrder(order) => {
                respond(self.cancel_order(&order), |report| ApiResponse::Report(Some(report)))
            }
            LedgerCommand::ConfirmCancelOrder(order) => {
                respond(self.confirm_cancel_order(&order), ApiResponse::Report)
            }
            LedgerCommand::RejectCancelOrder { order, reason } => {
                respond(self.reject_cancel_order(&order, reason), ApiResponse::Report)
            }
            LedgerCommand::ReplaceOrder {
                order,
                price,
                quantity,
            } => respond(self.replace_order(&order, price, quantity), |report| {
                ApiResponse::Report(Some(report))
            }),
            LedgerCommand::ConfirmReplaceOrder {
                order,
                venue_order_id,
            } => respond(
                self.confirm_replace_order(&order, venue_order_id),
                ApiResponse::Report,
            ),
            LedgerCommand::RejectReplaceOrder { order, reason } => {
                respond(self.reject_replace_order(&order, reason), ApiResponse::Report)
            }
            LedgerCommand::PendingFilled(order) => {
                respond(self.pending_filled(&order), ApiResponse::Report)
            }
            LedgerCommand::ConfirmFill {
                order,
                trade_id,
                price,
                quantity,
                taker,
            } => respond(
                self.confirm_fill(&order, trade_id, price, quantity, taker),
                ApiResponse::Report,
            ),
            LedgerCommand::ConfirmExpiredOrder(order) => {
                respond(self.confirm_expired_order(&order), ApiResponse::Report)
            }
            LedgerCommand::CheckExpiration => respond(self.check_expiration(), ApiResponse::Reports),
            LedgerCommand::PruneClosed => ApiResponse::Pruned(self.prune_closed()),
            LedgerCommand::Sync {
                securities,
                orders,
                positions,
                balances,
                maker_fee,
                taker_fee,
            } => respond(
                self.sync(&securities, orders, &positions, &balances, maker_fee, taker_fee),
                |()| ApiResponse::Done,
            ),
        }
    }

    pub fn query(&self, query: &LedgerQuery) -> ApiResponse {
        match query {
            LedgerQuery::Orders(filter) => ApiResponse::Orders(self.get_orders(filter.as_ref())),
            LedgerQuery::Order(order) => ApiResponse::Order(self.get_order(order)),
            LedgerQuery::Positions => ApiResponse::Positions(self.get_positions()),
            LedgerQuery::Margin => ApiResponse::Value(self.get_margin()),
            LedgerQuery::Balances => ApiResponse::Balances(self.get_balances()),
            LedgerQuery::UnrealizedPnl { security_id, mark } => {
                respond(self.unrealized_pnl(*security_id, *mark), ApiResponse::Value)
            }
            LedgerQuery::Leverage { marks } => {
                let marks: HashMap<SecurityId, Decimal> = marks.iter().copied().collect();
                respond(self.get_leverage(&marks), ApiResponse::Value)
            }
            LedgerQuery::AvailableMargin { marks, leverage } => {
                let marks: HashMap<SecurityId, Decimal> = marks.iter().copied().collect();
                respond(self.get_available_margin(&marks, *leverage), ApiResponse::Value)
            }
        }
    }
}
