//! Per-asset balances.
//!
//! Plain asset -> quantity map in native units. Spot fills settle here
//! directly; the venue is the authority on whether a balance may go negative,
//! so the ledger records what it is told.

use crate::types::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceLedger {
    balances: HashMap<String, Decimal>,
}

/// Balance movement produced by a spot fill.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotSettlement {
    pub base_delta: Decimal,
    pub quote_delta: Decimal,
    pub commission: Decimal,
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, asset: &str) -> Decimal {
        self.balances.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn set(&mut self, asset: &str, quantity: Decimal) {
        self.balances.insert(asset.to_string(), quantity);
    }

    pub fn credit(&mut self, asset: &str, amount: Decimal) {
        *self.balances.entry(asset.to_string()).or_insert(Decimal::ZERO) += amount;
    }

    pub fn debit(&mut self, asset: &str, amount: Decimal) {
        *self.balances.entry(asset.to_string()).or_insert(Decimal::ZERO) -= amount;
    }

    /// Sorted by asset so two ledgers with the same content list identically.
    pub fn all(&self) -> Vec<(String, Decimal)> {
        let mut all: Vec<(String, Decimal)> = self
            .balances
            .iter()
            .map(|(asset, qty)| (asset.clone(), *qty))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Buy: quote -= price*qty, base += qty. Sell: the reverse.
    /// Commission is charged in the quote asset. None on overflow.
    pub fn settle_spot(
        &mut self,
        side: Side,
        base: &str,
        quote: &str,
        price: Decimal,
        quantity: Decimal,
        fee_rate: Decimal,
    ) -> Option<SpotSettlement> {
        let quote_amount = price.checked_mul(quantity)?;
        let commission = quote_amount.checked_mul(fee_rate)?;

        let (base_delta, quote_delta) = match side {
            Side::Buy => (quantity, -quote_amount),
            Side::Sell => (-quantity, quote_amount),
        };
        let quote_delta = quote_delta.checked_sub(commission)?;

        self.credit(base, base_delta);
        self.credit(quote, quote_delta);

        Some(SpotSettlement {
            base_delta,
            quote_delta,
            commission,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn credit_and_debit() {
        let mut ledger = BalanceLedger::new();
        ledger.credit("USDT", dec!(1000));
        ledger.debit("USDT", dec!(250));
        assert_eq!(ledger.get("USDT"), dec!(750));
        assert_eq!(ledger.get("BTC"), Decimal::ZERO);
    }

    #[test]
    fn set_overwrites() {
        let mut ledger = BalanceLedger::new();
        ledger.credit("BTC", dec!(1));
        ledger.set("BTC", dec!(0.5));
        assert_eq!(ledger.get("BTC"), dec!(0.5));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn spot_buy_moves_both_legs() {
        let mut ledger = BalanceLedger::new();
        ledger.set("USDT", dec!(10000));

        let settlement = ledger
            .settle_spot(Side::Buy, "BTC", "USDT", dec!(50000), dec!(0.1), Decimal::ZERO)
            .unwrap();

        assert_eq!(settlement.base_delta, dec!(0.1));
        assert_eq!(ledger.get("BTC"), dec!(0.1));
        assert_eq!(ledger.get("USDT"), dec!(5000));
    }

    #[test]
    fn spot_sell_pays_commission_in_quote() {
        let mut ledger = BalanceLedger::new();
        ledger.set("BTC", dec!(1));

        let settlement = ledger
            .settle_spot(Side::Sell, "BTC", "USDT", dec!(50000), dec!(0.5), dec!(0.001))
            .unwrap();

        assert_eq!(settlement.commission, dec!(25));
        assert_eq!(ledger.get("BTC"), dec!(0.5));
        assert_eq!(ledger.get("USDT"), dec!(24975));
    }

    #[test]
    fn listing_is_sorted() {
        let mut ledger = BalanceLedger::new();
        ledger.set("USDT", dec!(1));
        ledger.set("BTC", dec!(2));
        let all = ledger.all();
        assert_eq!(all[0].0, "BTC");
        assert_eq!(all[1].0, "USDT");
    }
}
