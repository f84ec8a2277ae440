//! Property-based tests for the ledger invariants.
//!
//! These tests verify invariants hold under random fill sequences and snapshots.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use venue_ledger::*;

fn account_id() -> AccountId {
    AccountId::new("binance", "main")
}

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (100_000i64..10_000_000i64).prop_map(|x| Decimal::new(x, 2)) // $1,000 to $100,000
}

fn lots_strategy() -> impl Strategy<Value = i64> {
    1i64..5_000i64
}

// 1 to 6 fills, each at least one lot
fn split_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..500i64, 1..6)
}

fn eth(raw: i64) -> Decimal {
    Decimal::new(raw, 3) // ETHUSDT lot is 0.001
}

fn contracts(raw: i64) -> Decimal {
    Decimal::from(raw) // BTCUSD_PERP lot is 1
}

fn linear_account(fee: Option<Decimal>) -> Account {
    let mut account = Account::new(account_id(), LedgerConfig::linear_usd("USDT")).unwrap();
    account
        .sync(&[Security::ethusdt_perp(), Security::btcusd_perp()], Vec::new(), &[], &[], fee, fee)
        .unwrap();
    account
}

fn inverse_account(fee: Option<Decimal>) -> Account {
    let mut account = Account::new(account_id(), LedgerConfig::inverse_btc()).unwrap();
    account
        .sync(&[Security::btcusd_perp()], Vec::new(), &[], &[], fee, fee)
        .unwrap();
    account
}

fn place(account: &mut Account, client: &str, security_id: SecurityId, side: Side, quantity: Decimal) -> OrderRef {
    let order = Order::new_limit(
        ClientOrderId::new(client),
        security_id,
        side,
        quantity,
        dec!(1000),
        TimeInForce::GTC,
        Timestamp::from_millis(0),
    );
    account.new_order(order).unwrap();
    account
        .confirm_new_order(&ClientOrderId::new(client), VenueOrderId::new(format!("v-{client}")))
        .unwrap();
    OrderRef::Client(ClientOrderId::new(client))
}

fn fill(account: &mut Account, id: &OrderRef, trade: &str, price: Decimal, quantity: Decimal) {
    account
        .confirm_fill(id, TradeId::new(trade), price, quantity, false)
        .unwrap();
}

// open `lots` at entry, then close it at exit in the given pieces. returns raw margin.
fn round_trip(mut account: Account, security_id: SecurityId, lots: &[i64], entry: Decimal, exit: Decimal, unit: fn(i64) -> Decimal) -> (i64, Position) {
    let total: i64 = lots.iter().sum();
    let buy = place(&mut account, "open", security_id, Side::Buy, unit(total));
    fill(&mut account, &buy, "t-open", entry, unit(total));

    let sell = place(&mut account, "close", security_id, Side::Sell, unit(total));
    for (i, piece) in lots.iter().enumerate() {
        fill(&mut account, &sell, &format!("t-close-{i}"), exit, unit(*piece));
    }
    let position = account.raw_position(security_id).cloned().unwrap();
    (account.raw_margin(), position)
}

proptest! {
    /// Fills summing to the order size leave exactly zero raw leaves
    #[test]
    fn fills_sum_to_filled(pieces in split_strategy(), price in price_strategy()) {
        let mut account = linear_account(None);
        let total: i64 = pieces.iter().sum();
        let id = place(&mut account, "c-1", SecurityId(2), Side::Buy, eth(total));

        for (i, piece) in pieces.iter().enumerate() {
            let order = account.get_order(&id).unwrap();
            prop_assert_ne!(order.status, OrderStatus::Filled);
            fill(&mut account, &id, &format!("t-{i}"), price, eth(*piece));
        }

        let order = account.get_order(&id).unwrap();
        prop_assert_eq!(order.status, OrderStatus::Filled);
        prop_assert_eq!(order.leaves_quantity, Decimal::ZERO);
        prop_assert_eq!(order.cum_quantity, eth(total));
    }

    /// A rejected cancel puts the order back exactly where it was
    #[test]
    fn cancel_reject_restores(total in lots_strategy(), filled in 0i64..5_000i64) {
        prop_assume!(filled < total);
        let mut account = linear_account(None);
        let id = place(&mut account, "c-1", SecurityId(2), Side::Sell, eth(total));
        if filled > 0 {
            fill(&mut account, &id, "t-1", dec!(2000), eth(filled));
        }

        let before = account.get_order(&id).unwrap();
        account.cancel_order(&id).unwrap();
        let report = account.reject_cancel_order(&id, RejectReason::Other).unwrap().unwrap();

        prop_assert_eq!(report.order_status, before.status);
        prop_assert_eq!(account.get_order(&id).unwrap(), before);
    }

    /// Replaying a fill is a no-op for order, position and margin
    #[test]
    fn duplicate_fills_are_ignored(total in lots_strategy(), price in price_strategy()) {
        let mut account = linear_account(None);
        let id = place(&mut account, "c-1", SecurityId(2), Side::Buy, eth(total));
        fill(&mut account, &id, "t-1", price, eth(total));

        let margin = account.raw_margin();
        let position = account.raw_position(SecurityId(2)).cloned();
        let replay = account.confirm_fill(&id, TradeId::new("t-1"), price, eth(total), false).unwrap();

        prop_assert!(replay.is_none());
        prop_assert_eq!(account.raw_margin(), margin);
        prop_assert_eq!(account.raw_position(SecurityId(2)).cloned(), position);
    }

    /// Closing in pieces realizes the same as closing at once, within rounding of each piece
    #[test]
    fn partial_closes_associate_linear(
        pieces in split_strategy(),
        entry in price_strategy(),
        exit in price_strategy(),
    ) {
        let total: i64 = pieces.iter().sum();
        let (whole, flat_whole) = round_trip(linear_account(Some(Decimal::ZERO)), SecurityId(2), &[total], entry, exit, eth);
        let (split, flat_split) = round_trip(linear_account(Some(Decimal::ZERO)), SecurityId(2), &pieces, entry, exit, eth);

        prop_assert_eq!(flat_whole.raw_size, 0);
        prop_assert_eq!(flat_whole.cost, 0);
        prop_assert_eq!(flat_split.cost, 0);
        prop_assert!((whole - split).abs() <= 2 * pieces.len() as i64,
            "whole {} vs split {} over {} pieces", whole, split, pieces.len());
    }

    /// Same on the inverse contract, where cost and pnl run in 1/price
    #[test]
    fn partial_closes_associate_inverse(
        pieces in split_strategy(),
        entry in price_strategy(),
        exit in price_strategy(),
    ) {
        let total: i64 = pieces.iter().sum();
        let (whole, _) = round_trip(inverse_account(Some(Decimal::ZERO)), SecurityId(1), &[total], entry, exit, contracts);
        let (split, flat) = round_trip(inverse_account(Some(Decimal::ZERO)), SecurityId(1), &pieces, entry, exit, contracts);

        prop_assert!(flat.is_flat());
        prop_assert_eq!(flat.cost, 0);
        prop_assert!((whole - split).abs() <= 2 * pieces.len() as i64,
            "whole {} vs split {} over {} pieces", whole, split, pieces.len());
    }

    /// Syncing the same snapshot twice gives the same ledger
    #[test]
    fn sync_is_idempotent(
        sizes in prop::collection::vec(-5_000i64..5_000i64, 1..3),
        margin in 0i64..1_000_000_000i64,
        local_lots in lots_strategy(),
    ) {
        let mut account = linear_account(None);
        // local state that the snapshot must overwrite
        let id = place(&mut account, "local", SecurityId(2), Side::Buy, eth(local_lots));
        fill(&mut account, &id, "t-local", dec!(1500), eth(local_lots));

        let positions: Vec<VenuePosition> = sizes
            .iter()
            .zip([SecurityId(1), SecurityId(2)])
            .map(|(size, security_id)| VenuePosition {
                account: account_id(),
                security_id,
                quantity: if security_id == SecurityId(2) { eth(*size) } else { Decimal::from(*size) },
                cost: Decimal::new(*size * 2_000, 0),
                cross: false,
            })
            .collect();
        let balances = vec![VenueBalance {
            account: account_id(),
            asset: "USDT".to_string(),
            quantity: Decimal::new(margin, 6),
        }];
        let mut order = Order::new_limit(
            ClientOrderId::new("venue-1"),
            SecurityId(2),
            Side::Sell,
            dec!(1),
            dec!(2500),
            TimeInForce::GTC,
            Timestamp::from_millis(0),
        );
        order.status = OrderStatus::New;
        order.venue_order_id = Some(VenueOrderId::new("v-venue-1"));

        account.sync(&[], vec![order.clone()], &positions, &balances, None, None).unwrap();
        let first = (account.get_orders(None), account.get_positions(), account.get_margin(), account.get_balances());
        account.sync(&[], vec![order], &positions, &balances, None, None).unwrap();
        let second = (account.get_orders(None), account.get_positions(), account.get_margin(), account.get_balances());

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.2, Decimal::new(margin, 6));
        prop_assert!(account.get_order(&OrderRef::Client(ClientOrderId::new("local"))).is_none());
    }

    /// Flat positions always carry zero cost, whatever path got them there
    #[test]
    fn flat_means_zero_cost(
        buys in split_strategy(),
        price_a in price_strategy(),
        price_b in price_strategy(),
    ) {
        let mut account = inverse_account(None);
        let total: i64 = buys.iter().sum();

        let buy = place(&mut account, "buy", SecurityId(1), Side::Buy, Decimal::from(total));
        for (i, lots) in buys.iter().enumerate() {
            fill(&mut account, &buy, &format!("b-{i}"), price_a, Decimal::from(*lots));
        }
        let sell = place(&mut account, "sell", SecurityId(1), Side::Sell, Decimal::from(total));
        fill(&mut account, &sell, "s-1", price_b, Decimal::from(total));

        let position = account.raw_position(SecurityId(1)).unwrap();
        prop_assert_eq!(position.raw_size, 0);
        prop_assert_eq!(position.cost, 0);
    }
}
