//! Venue ledger simulation.
//!
//! Drives one account through the flows an exchange adapter would: order
//! acknowledgments, fills on inverse and linear contracts, position flips,
//! rejected cancels, spot settlement and reconciliation.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;
use venue_ledger::*;

fn main() -> Result<(), LedgerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("Venue Ledger Simulation");
    println!("Order State Machine, Fixed-Point Margin, Reconciliation\n");

    scenario_1_inverse_round_trip()?;
    scenario_2_position_flip()?;
    scenario_3_cancel_rejected()?;
    scenario_4_linear_margin()?;
    scenario_5_spot_settlement()?;
    scenario_6_resync()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn account_id() -> AccountId {
    AccountId::new("deribit", "main")
}

fn synced(config: LedgerConfig, securities: &[Security]) -> Result<Account, LedgerError> {
    let mut account = Account::new(account_id(), config)?;
    account.sync(securities, Vec::new(), &[], &[], None, None)?;
    Ok(account)
}

/// Place, confirm and fully fill one limit order.
fn trade(
    account: &mut Account,
    client: &str,
    security_id: SecurityId,
    side: Side,
    quantity: Decimal,
    price: Decimal,
) -> Result<(), LedgerError> {
    let order = Order::new_limit(
        ClientOrderId::new(client),
        security_id,
        side,
        quantity,
        price,
        TimeInForce::GTC,
        account.time(),
    );
    account.new_order(order)?;
    account.confirm_new_order(&ClientOrderId::new(client), VenueOrderId::new(format!("v-{client}")))?;
    account.confirm_fill(
        &OrderRef::Client(ClientOrderId::new(client)),
        TradeId::new(format!("t-{client}")),
        price,
        quantity,
        false,
    )?;
    Ok(())
}

fn print_position(account: &Account, security_id: SecurityId) {
    match account.get_position(security_id) {
        Some(position) => println!(
            "  Position: {} contracts, cost {} {}",
            position.quantity,
            position.cost,
            account.margin_currency()
        ),
        None => println!("  Position: flat"),
    }
}

/// Inverse BTC perpetual: buy 2 at 200, sell 1 at 210 twice.
fn scenario_1_inverse_round_trip() -> Result<(), LedgerError> {
    println!("Scenario 1: Inverse Round Trip\n");

    let mut account = synced(LedgerConfig::inverse_btc(), &[Security::btcusd_perp()])?;
    let btc = SecurityId(1);

    trade(&mut account, "buy-1", btc, Side::Buy, dec!(2), dec!(200))?;
    println!("  Bought 2 contracts @ $200");
    print_position(&account, btc);

    trade(&mut account, "sell-1", btc, Side::Sell, dec!(1), dec!(210))?;
    trade(&mut account, "sell-2", btc, Side::Sell, dec!(1), dec!(210))?;
    println!("  Sold 2 contracts @ $210 in two fills");
    print_position(&account, btc);
    println!("  Margin: {} BTC\n", account.get_margin());
    Ok(())
}

/// Buy X then sell 2X: the closed leg leaves no residue in the new short.
fn scenario_2_position_flip() -> Result<(), LedgerError> {
    println!("Scenario 2: Position Flip\n");

    let mut account = synced(LedgerConfig::inverse_btc(), &[Security::btcusd_perp()])?;
    let btc = SecurityId(1);

    trade(&mut account, "buy-1", btc, Side::Buy, dec!(100), dec!(40000))?;
    println!("  Long 100 contracts @ $40,000");
    trade(&mut account, "sell-1", btc, Side::Sell, dec!(200), dec!(44000))?;
    println!("  Sold 200 contracts @ $44,000");
    print_position(&account, btc);
    println!("  Margin: {} BTC\n", account.get_margin());
    Ok(())
}

/// Cancel rejected by the venue after a partial fill.
fn scenario_3_cancel_rejected() -> Result<(), LedgerError> {
    println!("Scenario 3: Cancel Rejected\n");

    let mut account = synced(LedgerConfig::inverse_btc(), &[Security::btcusd_perp()])?;
    let id = OrderRef::Client(ClientOrderId::new("c-1"));

    let order = Order::new_limit(
        ClientOrderId::new("c-1"),
        SecurityId(1),
        Side::Sell,
        dec!(10),
        dec!(50000),
        TimeInForce::GTC,
        account.time(),
    );
    account.new_order(order)?;
    account.confirm_new_order(&ClientOrderId::new("c-1"), VenueOrderId::new("v-1"))?;
    account.confirm_fill(&id, TradeId::new("t-1"), dec!(50000), dec!(4), true)?;

    let pending = account.cancel_order(&id)?;
    println!("  Cancel requested: {:?}", pending.order_status);

    if let Some(report) = account.reject_cancel_order(&id, RejectReason::Other)? {
        println!(
            "  Venue rejected cancel: {:?} -> status {:?}, leaves {}",
            report.execution_type, report.order_status, report.leaves_quantity
        );
    }

    let again = account.confirm_new_order(&ClientOrderId::new("c-1"), VenueOrderId::new("v-1"))?;
    println!("  Duplicate ack ignored: {}\n", again.is_none());
    Ok(())
}

/// USDT-margined ETH: leverage and available margin at a mark.
fn scenario_4_linear_margin() -> Result<(), LedgerError> {
    println!("Scenario 4: Linear Margin\n");

    let mut account = synced(LedgerConfig::linear_usd("USDT"), &[Security::ethusdt_perp()])?;
    let eth = SecurityId(2);
    account.sync(
        &[],
        Vec::new(),
        &[],
        &[VenueBalance {
            account: account_id(),
            asset: "USDT".to_string(),
            quantity: dec!(5000),
        }],
        None,
        None,
    )?;

    trade(&mut account, "buy-1", eth, Side::Buy, dec!(2.5), dec!(2000))?;
    println!("  Long 2.5 ETH @ $2,000 with 5,000 USDT");

    for mark in [dec!(1900), dec!(2000), dec!(2200)] {
        let marks = HashMap::from([(eth, mark)]);
        println!(
            "  Mark ${}: uPnL {}, leverage {:.2}x, available @10x {}",
            mark,
            account.unrealized_pnl(eth, mark)?,
            account.get_leverage(&marks)?,
            account.get_available_margin(&marks, dec!(10))?
        );
    }
    println!();
    Ok(())
}

/// Spot fills settle straight into balances.
fn scenario_5_spot_settlement() -> Result<(), LedgerError> {
    println!("Scenario 5: Spot Settlement\n");

    let mut account = synced(LedgerConfig::linear_usd("USDT"), &[Security::btcusdt_spot()])?;
    trade(&mut account, "buy-1", SecurityId(3), Side::Buy, dec!(0.25), dec!(60000))?;

    for (asset, quantity) in account.get_balances() {
        println!("  {asset}: {quantity}");
    }
    println!();
    Ok(())
}

/// Sync from a venue snapshot twice and compare.
fn scenario_6_resync() -> Result<(), LedgerError> {
    println!("Scenario 6: Reconciliation\n");

    let mut account = synced(LedgerConfig::inverse_btc(), &[Security::btcusd_perp()])?;
    trade(&mut account, "buy-1", SecurityId(1), Side::Buy, dec!(50), dec!(30000))?;

    let positions = [VenuePosition {
        account: account_id(),
        security_id: SecurityId(1),
        quantity: dec!(60),
        cost: dec!(-0.002),
        cross: true,
    }];
    let balances = [VenueBalance {
        account: account_id(),
        asset: "BTC".to_string(),
        quantity: dec!(0.5),
    }];

    account.sync(&[], Vec::new(), &positions, &balances, None, None)?;
    let first = AccountSnapshot::capture(&account);
    account.sync(&[], Vec::new(), &positions, &balances, None, None)?;
    let second = AccountSnapshot::capture(&account);

    print_position(&account, SecurityId(1));
    println!("  Margin: {} BTC", account.get_margin());
    println!("  Second sync identical: {}", first.positions == second.positions && first.margin == second.margin);
    println!("  Events recorded: {}", account.events().len());
    Ok(())
}
