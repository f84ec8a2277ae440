// 10.0.2: error types for ledger operations.
// RejectReason is what the venue-facing caller reports back. LedgerError wraps it together
// with the invariant violations that end the session.

use crate::config::ConfigError;
use crate::order::OrderStatus;
use crate::types::{AccountId, ClientOrderId, OrderRef, SecurityId, VenueOrderId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Closed set of reasons a request can be refused. Callers match on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum RejectReason {
    #[error("duplicate order")]
    DuplicateOrder,
    #[error("unknown symbol")]
    UnknownSymbol,
    #[error("incorrect quantity")]
    IncorrectQuantity,
    #[error("unknown order")]
    UnknownOrder,
    #[error("cancel already pending")]
    CancelAlreadyPending,
    #[error("replace already pending")]
    ReplaceAlreadyPending,
    #[error("too late to cancel")]
    TooLateToCancel,
    #[error("other")]
    Other,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Rejected: {0}")]
    Rejected(RejectReason),

    #[error("Fill of {fill} raw lots exceeds {leaves} raw leaves on order {client_order_id}")]
    FillExceedsLeaves {
        client_order_id: ClientOrderId,
        fill: i64,
        leaves: i64,
    },

    #[error("Snapshot for account {got} applied to account {expected}")]
    ForeignAccount { expected: AccountId, got: AccountId },

    #[error("Security {0} not found")]
    UnknownSecurity(SecurityId),

    #[error("Security {security_id} has invalid increment {increment}")]
    InvalidPrecision {
        security_id: SecurityId,
        increment: Decimal,
    },

    #[error("Order {order} cannot go from {from:?} via {operation}")]
    InvalidTransition {
        order: OrderRef,
        from: OrderStatus,
        operation: &'static str,
    },

    #[error("Snapshot contains client order id {0} twice")]
    DuplicateSnapshotOrder(ClientOrderId),

    #[error("Venue order id {venue_order_id} already belongs to order {owner}")]
    DuplicateVenueOrder {
        venue_order_id: VenueOrderId,
        owner: ClientOrderId,
    },

    #[error("No mark price available for security {0}")]
    NoMarkPrice(SecurityId),

    #[error("Fixed-point overflow")]
    Overflow,

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl LedgerError {
    /// Invariant violations. The account must be re-synced before it is trusted again.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            LedgerError::Rejected(_) | LedgerError::NoMarkPrice(_) | LedgerError::Config(_)
        )
    }

    /// The rejection reason to hand back to the requester, if this is a rejection.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            LedgerError::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl From<RejectReason> for LedgerError {
    fn from(reason: RejectReason) -> Self {
        LedgerError::Rejected(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_recoverable() {
        let err = LedgerError::from(RejectReason::UnknownOrder);
        assert!(!err.is_fatal());
        assert_eq!(err.reject_reason(), Some(RejectReason::UnknownOrder));
    }

    #[test]
    fn invariant_violations_are_fatal() {
        let err = LedgerError::FillExceedsLeaves {
            client_order_id: ClientOrderId::new("c-1"),
            fill: 3,
            leaves: 2,
        };
        assert!(err.is_fatal());
        assert_eq!(err.reject_reason(), None);
        assert!(LedgerError::UnknownSecurity(SecurityId(9)).is_fatal());
        assert!(LedgerError::Overflow.is_fatal());
        assert!(LedgerError::DuplicateVenueOrder {
            venue_order_id: VenueOrderId::new("v-1"),
            owner: ClientOrderId::new("c-1"),
        }
        .is_fatal());
    }

    #[test]
    fn error_messages() {
        let err = LedgerError::Rejected(RejectReason::CancelAlreadyPending);
        assert_eq!(err.to_string(), "Rejected: cancel already pending");
    }
}
