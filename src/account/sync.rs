// 10.4 account/sync.rs: reconciliation against a full venue snapshot.
// the only path allowed to set raw sizes, costs and balances directly. everything is built
// on the side and swapped in at the end, so a failed sync leaves the account untouched.

use super::core::Account;
use super::results::LedgerError;
use crate::balance::BalanceLedger;
use crate::events::{EventPayload, SyncedEvent};
use crate::order::{Order, OrderLedger, OrderRecord};
use crate::position::Position;
use crate::security::{InstrumentView, Security};
use crate::types::{AccountId, SecurityId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Position as the venue reports it. `quantity` is signed, `cost` is in margin currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenuePosition {
    pub account: AccountId,
    pub security_id: SecurityId,
    pub quantity: Decimal,
    pub cost: Decimal,
    pub cross: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueBalance {
    pub account: AccountId,
    pub asset: String,
    pub quantity: Decimal,
}

impl Account {
    /// Rebuild the ledger from venue state. Idempotent: the same inputs always give the
    /// same ledger, whatever happened before.
    pub fn sync(
        &mut self,
        securities: &[Security],
        orders: Vec<Order>,
        positions: &[VenuePosition],
        balances: &[VenueBalance],
        maker_fee: Option<Decimal>,
        taker_fee: Option<Decimal>,
    ) -> Result<(), LedgerError> {
        let views = self.rebuild_securities(securities, maker_fee, taker_fee)?;
        let order_ledger = self.rebuild_orders(&views, orders)?;
        let position_map = self.rebuild_positions(&views, positions)?;
        let (balance_ledger, margin) = self.rebuild_balances(balances)?;

        let summary = SyncedEvent {
            securities: views.len(),
            orders: order_ledger.len(),
            positions: position_map.values().filter(|p| !p.is_flat()).count(),
            balances: balance_ledger.len(),
            margin,
        };

        self.securities = views;
        self.orders = order_ledger;
        self.positions = position_map;
        self.balances = balance_ledger;
        self.margin = margin;

        tracing::info!(
            account = %self.id,
            securities = summary.securities,
            orders = summary.orders,
            positions = summary.positions,
            balances = summary.balances,
            margin = summary.margin,
            "account synced"
        );
        self.emit_event(EventPayload::Synced(summary));
        Ok(())
    }

    fn rebuild_securities(
        &self,
        securities: &[Security],
        maker_fee: Option<Decimal>,
        taker_fee: Option<Decimal>,
    ) -> Result<HashMap<SecurityId, InstrumentView>, LedgerError> {
        let mut views = self.securities.clone();
        for security in securities {
            views.insert(security.security_id, InstrumentView::new(security.clone())?);
        }

        // account fee tier overrides the catalog rates
        for view in views.values_mut() {
            if let Some(rate) = maker_fee {
                view.security.maker_fee = rate;
            }
            if let Some(rate) = taker_fee {
                view.security.taker_fee = rate;
            }
        }
        Ok(views)
    }

    fn rebuild_orders(
        &self,
        views: &HashMap<SecurityId, InstrumentView>,
        orders: Vec<Order>,
    ) -> Result<OrderLedger, LedgerError> {
        let mut ledger = OrderLedger::new();

        for order in orders {
            if ledger.contains_client(&order.client_order_id) {
                tracing::warn!(account = %self.id, client_order_id = %order.client_order_id, "duplicate order in snapshot");
                return Err(LedgerError::DuplicateSnapshotOrder(order.client_order_id));
            }
            if let Some(venue_id) = &order.venue_order_id {
                if let Some(owner) = ledger.venue_owner(venue_id, None) {
                    tracing::warn!(account = %self.id, venue_order_id = %venue_id, "duplicate venue order id in snapshot");
                    return Err(LedgerError::DuplicateVenueOrder {
                        venue_order_id: venue_id.clone(),
                        owner: owner.clone(),
                    });
                }
            }
            let view = views
                .get(&order.security_id)
                .ok_or(LedgerError::UnknownSecurity(order.security_id))?;

            let raw_quantity = view.lot.to_raw(order.quantity).ok_or(LedgerError::Overflow)?;
            let raw_leaves = view.lot.to_raw(order.leaves_quantity).ok_or(LedgerError::Overflow)?;
            let raw_cum = view.lot.to_raw(order.cum_quantity).ok_or(LedgerError::Overflow)?;

            // previous_status starts as the reported status
            let mut record = OrderRecord::new(order, raw_quantity, raw_leaves, raw_cum);
            record.refresh_quantities(view.lot);
            ledger.insert(record);
        }
        Ok(ledger)
    }

    fn rebuild_positions(
        &self,
        views: &HashMap<SecurityId, InstrumentView>,
        positions: &[VenuePosition],
    ) -> Result<HashMap<SecurityId, Position>, LedgerError> {
        let mut rebuilt = self.positions.clone();
        rebuilt.values_mut().for_each(Position::reset);

        for reported in positions {
            self.check_account(&reported.account)?;
            let view = views
                .get(&reported.security_id)
                .ok_or(LedgerError::UnknownSecurity(reported.security_id))?;

            let raw_size = view.lot.to_raw(reported.quantity).ok_or(LedgerError::Overflow)?;
            let cost = if raw_size == 0 {
                0
            } else {
                self.margin_precision
                    .to_raw(reported.cost)
                    .ok_or(LedgerError::Overflow)?
            };

            let position = rebuilt
                .entry(reported.security_id)
                .or_insert_with(|| Position::new(reported.security_id, reported.cross));
            position.raw_size = raw_size;
            position.cost = cost;
            position.cross = reported.cross;
        }
        Ok(rebuilt)
    }

    fn rebuild_balances(&self, balances: &[VenueBalance]) -> Result<(BalanceLedger, i64), LedgerError> {
        let mut ledger = self.balances.clone();
        let mut margin = self.margin;

        for reported in balances {
            self.check_account(&reported.account)?;
            ledger.set(&reported.asset, reported.quantity);
            if reported.asset == self.config.margin_currency {
                margin = self
                    .margin_precision
                    .to_raw(reported.quantity)
                    .ok_or(LedgerError::Overflow)?;
            }
        }
        Ok((ledger, margin))
    }

    fn check_account(&self, got: &AccountId) -> Result<(), LedgerError> {
        if got != &self.id {
            tracing::warn!(account = %self.id, got = %got, "snapshot for another account");
            return Err(LedgerError::ForeignAccount {
                expected: self.id.clone(),
                got: got.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::order::{OrderStatus, TimeInForce};
    use crate::types::{ClientOrderId, OrderRef, Side, Timestamp, VenueOrderId};
    use rust_decimal_macros::dec;

    fn id() -> AccountId {
        AccountId::new("binance", "main")
    }

    fn venue_order(client: &str, venue: &str) -> Order {
        let mut order = Order::new_limit(
            ClientOrderId::new(client),
            SecurityId(1),
            Side::Buy,
            dec!(10),
            dec!(100),
            TimeInForce::GTC,
            Timestamp::from_millis(0),
        );
        order.venue_order_id = Some(VenueOrderId::new(venue));
        order.status = OrderStatus::PartiallyFilled;
        order.leaves_quantity = dec!(6);
        order.cum_quantity = dec!(4);
        order
    }

    fn position(quantity: Decimal, cost: Decimal) -> VenuePosition {
        VenuePosition {
            account: id(),
            security_id: SecurityId(1),
            quantity,
            cost,
            cross: true,
        }
    }

    #[test]
    fn sync_replaces_everything() {
        let mut account = Account::new(id(), LedgerConfig::default()).unwrap();
        let balances = [VenueBalance {
            account: id(),
            asset: "BTC".to_string(),
            quantity: dec!(1.5),
        }];

        account
            .sync(
                &[Security::btcusd_perp()],
                vec![venue_order("c-1", "v-1")],
                &[position(dec!(-3), dec!(0.03))],
                &balances,
                None,
                None,
            )
            .unwrap();

        let order = account.get_order(&OrderRef::Venue(VenueOrderId::new("v-1"))).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.leaves_quantity, dec!(6));

        let positions = account.get_positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].quantity, dec!(-3));
        assert!(positions[0].cross);

        assert_eq!(account.get_margin(), dec!(1.5));
        assert_eq!(account.raw_margin(), 150_000_000);
    }

    #[test]
    fn foreign_position_fails_and_leaves_state() {
        let mut account = Account::new(id(), LedgerConfig::default()).unwrap();
        account.sync(&[Security::btcusd_perp()], Vec::new(), &[], &[], None, None).unwrap();

        let mut foreign = position(dec!(1), dec!(-0.01));
        foreign.account = AccountId::new("binance", "other");
        let err = account
            .sync(&[], vec![venue_order("c-1", "v-1")], &[foreign], &[], None, None)
            .unwrap_err();

        assert!(matches!(err, LedgerError::ForeignAccount { .. }));
        assert!(err.is_fatal());
        assert!(account.get_orders(None).is_empty());
    }

    #[test]
    fn unknown_security_is_fatal() {
        let mut account = Account::new(id(), LedgerConfig::default()).unwrap();
        let err = account
            .sync(&[], Vec::new(), &[position(dec!(1), dec!(-0.01))], &[], None, None)
            .unwrap_err();
        assert_eq!(err, LedgerError::UnknownSecurity(SecurityId(1)));
    }

    #[test]
    fn duplicate_snapshot_order_is_fatal() {
        let mut account = Account::new(id(), LedgerConfig::default()).unwrap();
        let err = account
            .sync(
                &[Security::btcusd_perp()],
                vec![venue_order("c-1", "v-1"), venue_order("c-1", "v-2")],
                &[],
                &[],
                None,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateSnapshotOrder(_)));
    }

    #[test]
    fn duplicate_snapshot_venue_id_is_fatal() {
        let mut account = Account::new(id(), LedgerConfig::default()).unwrap();
        account
            .sync(&[Security::btcusd_perp()], vec![venue_order("c-0", "v-0")], &[], &[], None, None)
            .unwrap();

        let err = account
            .sync(
                &[],
                vec![venue_order("c-1", "v-1"), venue_order("c-2", "v-1")],
                &[],
                &[],
                None,
                None,
            )
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::DuplicateVenueOrder {
                venue_order_id: VenueOrderId::new("v-1"),
                owner: ClientOrderId::new("c-1"),
            }
        );
        assert!(err.is_fatal());
        // the previous order set survives the failed sync
        let orders = account.get_orders(None);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].client_order_id, ClientOrderId::new("c-0"));
    }

    #[test]
    fn positions_missing_from_snapshot_are_flattened() {
        let mut account = Account::new(id(), LedgerConfig::default()).unwrap();
        account
            .sync(&[Security::btcusd_perp()], Vec::new(), &[position(dec!(2), dec!(-0.02))], &[], None, None)
            .unwrap();
        assert_eq!(account.get_positions().len(), 1);

        account.sync(&[], Vec::new(), &[], &[], None, None).unwrap();
        assert!(account.get_positions().is_empty());
    }

    #[test]
    fn fee_overrides_apply_to_every_security() {
        let mut account = Account::new(id(), LedgerConfig::default()).unwrap();
        account
            .sync(
                &[Security::btcusd_perp(), Security::ethusdt_perp()],
                Vec::new(),
                &[],
                &[],
                Some(dec!(-0.0001)),
                None,
            )
            .unwrap();

        let btc = account.instrument(SecurityId(1)).unwrap();
        let eth = account.instrument(SecurityId(2)).unwrap();
        assert_eq!(btc.security.maker_fee, dec!(-0.0001));
        assert_eq!(eth.security.maker_fee, dec!(-0.0001));
        assert_eq!(btc.security.taker_fee, dec!(0.0005));
    }

    #[test]
    fn sync_twice_is_idempotent() {
        let mut account = Account::new(id(), LedgerConfig::default()).unwrap();
        let run = |account: &mut Account| {
            account
                .sync(
                    &[Security::btcusd_perp()],
                    vec![venue_order("c-1", "v-1")],
                    &[position(dec!(5), dec!(-0.05))],
                    &[],
                    None,
                    None,
                )
                .unwrap();
            (account.get_orders(None), account.get_positions(), account.get_margin())
        };

        let first = run(&mut account);
        let second = run(&mut account);
        assert_eq!(first, second);
    }
}
