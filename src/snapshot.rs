//! Read-only account snapshots for other threads.
//!
//! The owning context mutates the [`Account`] and calls
//! [`SharedAccountView::publish`] after each message. Readers take the read
//! lock on the last published snapshot and never see the live ledger.

use crate::account::{Account, PositionView};
use crate::order::Order;
use crate::types::{AccountId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account: AccountId,
    pub margin_currency: String,
    pub margin: Decimal,
    pub orders: Vec<Order>,
    pub positions: Vec<PositionView>,
    pub balances: Vec<(String, Decimal)>,
    pub taken_at: Timestamp,
}

impl AccountSnapshot {
    pub fn capture(account: &Account) -> Self {
        Self {
            account: account.id().clone(),
            margin_currency: account.margin_currency().to_string(),
            margin: account.get_margin(),
            orders: account.get_orders(None),
            positions: account.get_positions(),
            balances: account.get_balances(),
            taken_at: account.time(),
        }
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|order| !order.status.is_terminal())
    }
}

/// Cloneable handle to the latest published snapshot.
#[derive(Debug, Clone)]
pub struct SharedAccountView {
    inner: Arc<RwLock<AccountSnapshot>>,
}

impl SharedAccountView {
    pub fn new(account: &Account) -> Self {
        Self {
            inner: Arc::new(RwLock::new(AccountSnapshot::capture(account))),
        }
    }

    /// Replace the shared snapshot. The snapshot is built before the lock is taken.
    pub fn publish(&self, account: &Account) {
        let snapshot = AccountSnapshot::capture(account);
        // poisoning only means a reader panicked; the snapshot is always whole
        let mut guard = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = snapshot;
    }

    pub fn read(&self) -> AccountSnapshot {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn margin(&self) -> Decimal {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .margin
    }
}
