// 10.3 account/settlement.rs: what a fill does to the account once the order side is done.
// spot fills move balances. margined fills go through the position and touch margin twice,
// once for realized pnl and once for commission.

use super::core::Account;
use super::results::LedgerError;
use crate::events::{BalanceChangedEvent, CommissionEvent, EventPayload, PositionChangedEvent};
use crate::margin;
use crate::position::{self, Position};
use crate::types::{SecurityId, Side, TradeId};
use rust_decimal::Decimal;

impl Account {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn settle_fill(
        &mut self,
        security_id: SecurityId,
        side: Side,
        trade_id: &TradeId,
        price: Decimal,
        quantity: Decimal,
        raw_fill: i64,
        taker: bool,
    ) -> Result<(), LedgerError> {
        let view = self.view(security_id)?;
        if view.is_margined() {
            self.settle_margined(security_id, side, trade_id, price, quantity, raw_fill, taker)
        } else {
            self.settle_spot(security_id, side, price, quantity, taker)
        }
    }

    fn settle_spot(
        &mut self,
        security_id: SecurityId,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        taker: bool,
    ) -> Result<(), LedgerError> {
        let view = self.view(security_id)?;
        let base = view.security.underlying.clone();
        let quote = view.security.quote_currency.clone();
        let rate = view.fee_rate(taker);

        let settled = self
            .balances
            .settle_spot(side, &base, &quote, price, quantity, rate)
            .ok_or(LedgerError::Overflow)?;

        tracing::debug!(
            account = %self.id,
            security_id = %security_id,
            base_delta = %settled.base_delta,
            quote_delta = %settled.quote_delta,
            commission = %settled.commission,
            "spot fill settled"
        );

        for (asset, delta) in [(base, settled.base_delta), (quote, settled.quote_delta)] {
            let new_balance = self.balances.get(&asset);
            self.emit_event(EventPayload::BalanceChanged(BalanceChangedEvent {
                asset,
                delta,
                new_balance,
            }));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn settle_margined(
        &mut self,
        security_id: SecurityId,
        side: Side,
        trade_id: &TradeId,
        price: Decimal,
        quantity: Decimal,
        raw_fill: i64,
        taker: bool,
    ) -> Result<(), LedgerError> {
        let view = self.view(security_id)?;
        let terms = self.contract_terms(view);
        let settlement_price = view.settlement_price(price).ok_or(LedgerError::Overflow)?;
        let rate = view.fee_rate(taker);
        let multiplier = view.security.multiplier;

        // worked on a copy, committed only once every step has succeeded
        let mut position = self
            .positions
            .get(&security_id)
            .cloned()
            .unwrap_or_else(|| Position::new(security_id, false));
        let update = position::apply_fill(&mut position, side, raw_fill, settlement_price, &terms)?;
        let cost = position.cost;

        let fee = margin::notional(quantity, settlement_price, multiplier)
            .and_then(|notional| margin::commission(rate, notional, self.margin_precision))
            .ok_or(LedgerError::Overflow)?;

        self.margin = self
            .margin
            .checked_add(update.realized_pnl)
            .and_then(|m| m.checked_sub(fee))
            .ok_or(LedgerError::Overflow)?;
        self.positions.insert(security_id, position);

        tracing::debug!(
            account = %self.id,
            security_id = %security_id,
            old_raw_size = update.old_raw_size,
            new_raw_size = update.new_raw_size,
            realized_pnl = update.realized_pnl,
            commission = fee,
            margin = self.margin,
            "margined fill settled"
        );

        self.emit_event(EventPayload::PositionChanged(PositionChangedEvent {
            security_id,
            old_raw_size: update.old_raw_size,
            new_raw_size: update.new_raw_size,
            cost,
            realized_pnl: update.realized_pnl,
        }));
        self.emit_event(EventPayload::Commission(CommissionEvent {
            security_id,
            trade_id: trade_id.clone(),
            rate,
            amount: fee,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::account::Account;
    use crate::config::LedgerConfig;
    use crate::events::EventPayload;
    use crate::order::{Order, TimeInForce};
    use crate::security::Security;
    use crate::types::{AccountId, ClientOrderId, OrderRef, SecurityId, Side, Timestamp, TradeId, VenueOrderId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn account_with(security: Security, config: LedgerConfig) -> Account {
        let mut account = Account::new(AccountId::new("binance", "main"), config).unwrap();
        account.sync(&[security], Vec::new(), &[], &[], None, None).unwrap();
        account
    }

    fn fill(account: &mut Account, id: &str, sid: u64, side: Side, qty: Decimal, price: Decimal, taker: bool) {
        let order = Order::new_limit(
            ClientOrderId::new(id),
            SecurityId(sid),
            side,
            qty,
            price,
            TimeInForce::GTC,
            Timestamp::from_millis(0),
        );
        account.new_order(order).unwrap();
        account
            .confirm_new_order(&ClientOrderId::new(id), VenueOrderId::new(format!("v-{id}")))
            .unwrap();
        account
            .confirm_fill(
                &OrderRef::Client(ClientOrderId::new(id)),
                TradeId::new(format!("t-{id}")),
                price,
                qty,
                taker,
            )
            .unwrap();
    }

    #[test]
    fn inverse_open_charges_fee_only() {
        let mut account = account_with(Security::btcusd_perp(), LedgerConfig::inverse_btc());
        fill(&mut account, "c-1", 1, Side::Buy, dec!(2), dec!(200), false);

        // 2 * (1/200) * 0.0001 = 0.000001 BTC = 100 raw
        assert_eq!(account.raw_margin(), -100);
        let position = account.get_position(SecurityId(1)).unwrap();
        assert_eq!(position.quantity, dec!(2));
        assert_eq!(position.cost, dec!(-0.01));
    }

    #[test]
    fn linear_round_trip_realizes_pnl() {
        let mut security = Security::ethusdt_perp();
        security.maker_fee = Decimal::ZERO;
        let mut account = account_with(security, LedgerConfig::linear_usd("USDT"));

        fill(&mut account, "c-1", 2, Side::Buy, dec!(1.5), dec!(2000), false);
        fill(&mut account, "c-2", 2, Side::Sell, dec!(1.5), dec!(2100), false);

        assert_eq!(account.get_margin(), dec!(150));
        assert!(account.get_position(SecurityId(2)).is_none());
    }

    #[test]
    fn spot_fill_moves_balances() {
        let mut account = account_with(Security::btcusdt_spot(), LedgerConfig::linear_usd("USDT"));
        fill(&mut account, "c-1", 3, Side::Buy, dec!(0.5), dec!(30000), true);

        assert_eq!(account.get_balance("BTC"), dec!(0.5));
        // 15000 notional + 15 fee
        assert_eq!(account.get_balance("USDT"), dec!(-15015));
        assert_eq!(account.raw_margin(), 0);
        assert!(account.get_positions().is_empty());
    }

    #[test]
    fn fill_emits_position_and_commission_events() {
        let mut account = account_with(Security::btcusd_perp(), LedgerConfig::inverse_btc());
        fill(&mut account, "c-1", 1, Side::Sell, dec!(1), dec!(100), true);

        let kinds: Vec<_> = account
            .events()
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::PositionChanged(p) => Some(("position", p.new_raw_size)),
                EventPayload::Commission(c) => Some(("commission", c.amount)),
                _ => None,
            })
            .collect();
        // taker 0.0005 * 1 * 0.01 = 0.000005 BTC
        assert_eq!(kinds, vec![("position", -1), ("commission", 500)]);
    }
}
