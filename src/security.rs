//! Security definitions and per-account instrument views.
//!
//! A security is the catalog's immutable description of an instrument. The
//! account keeps an [`InstrumentView`] per security with the derived tick and
//! lot grids that every price and quantity conversion goes through.

use crate::account::LedgerError;
use crate::types::{Precision, SecurityId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How fills on this instrument settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityType {
    /// Fills move asset balances directly.
    Spot,
    /// Fills move a margined position. No expiry.
    Perpetual,
    /// Fills move a margined position. Dated.
    Future,
}

impl SecurityType {
    pub fn is_margined(&self) -> bool {
        !matches!(self, SecurityType::Spot)
    }
}

/// Catalog record for one instrument (immutable once fetched)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub security_id: SecurityId,
    /// Venue symbol (e.g., "BTCUSD_PERP")
    pub symbol: String,
    pub security_type: SecurityType,
    /// Minimum price increment
    pub min_price_increment: Decimal,
    /// Minimum size increment
    pub round_lot: Decimal,
    /// Contract multiplier. Negative for inverse contracts.
    pub multiplier: Decimal,
    /// Quoted in the quote currency, settled in the underlying
    pub is_inverse: bool,
    /// Maker fee rate (negative = rebate)
    pub maker_fee: Decimal,
    /// Taker fee rate
    pub taker_fee: Decimal,
    /// Base asset (e.g., "BTC")
    pub underlying: String,
    /// Quote asset (e.g., "USD")
    pub quote_currency: String,
}

impl Security {
    /// Coin-margined BTC perpetual. 1 USD contracts, settled in BTC.
    pub fn btcusd_perp() -> Self {
        Self {
            security_id: SecurityId(1),
            symbol: "BTCUSD_PERP".to_string(),
            security_type: SecurityType::Perpetual,
            min_price_increment: Decimal::new(1, 1), // $0.1
            round_lot: Decimal::ONE,
            multiplier: Decimal::NEGATIVE_ONE,
            is_inverse: true,
            maker_fee: Decimal::new(1, 4), // 0.01%
            taker_fee: Decimal::new(5, 4), // 0.05%
            underlying: "BTC".to_string(),
            quote_currency: "USD".to_string(),
        }
    }

    /// USDT-margined linear ETH perpetual.
    pub fn ethusdt_perp() -> Self {
        Self {
            security_id: SecurityId(2),
            symbol: "ETHUSDT".to_string(),
            security_type: SecurityType::Perpetual,
            min_price_increment: Decimal::new(1, 2), // $0.01
            round_lot: Decimal::new(1, 3),           // 0.001 ETH
            multiplier: Decimal::ONE,
            is_inverse: false,
            maker_fee: Decimal::new(2, 4),
            taker_fee: Decimal::new(4, 4),
            underlying: "ETH".to_string(),
            quote_currency: "USDT".to_string(),
        }
    }

    /// BTC/USDT spot pair.
    pub fn btcusdt_spot() -> Self {
        Self {
            security_id: SecurityId(3),
            symbol: "BTCUSDT".to_string(),
            security_type: SecurityType::Spot,
            min_price_increment: Decimal::new(1, 2),
            round_lot: Decimal::new(1, 5), // 0.00001 BTC
            multiplier: Decimal::ONE,
            is_inverse: false,
            maker_fee: Decimal::new(1, 3), // 0.1%
            taker_fee: Decimal::new(1, 3),
            underlying: "BTC".to_string(),
            quote_currency: "USDT".to_string(),
        }
    }
}

/// Cached projection of a security inside one account.
///
/// `tick` and `lot` are the fixed-point grids for prices and quantities. They
/// only change on a full sync, never while orders are being driven.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentView {
    pub security: Security,
    pub tick: Precision,
    pub lot: Precision,
}

impl InstrumentView {
    pub fn new(security: Security) -> Result<Self, LedgerError> {
        let tick = Precision::from_increment(security.min_price_increment).ok_or(
            LedgerError::InvalidPrecision {
                security_id: security.security_id,
                increment: security.min_price_increment,
            },
        )?;
        let lot = Precision::from_increment(security.round_lot).ok_or(
            LedgerError::InvalidPrecision {
                security_id: security.security_id,
                increment: security.round_lot,
            },
        )?;
        Ok(Self { security, tick, lot })
    }

    pub fn security_id(&self) -> SecurityId {
        self.security.security_id
    }

    pub fn is_margined(&self) -> bool {
        self.security.security_type.is_margined()
    }

    /// Price used by margin math. Inverse contracts work in 1/price.
    pub fn settlement_price(&self, price: Decimal) -> Option<Decimal> {
        if price <= Decimal::ZERO {
            return None;
        }
        if self.security.is_inverse {
            Decimal::ONE.checked_div(price)
        } else {
            Some(price)
        }
    }

    pub fn fee_rate(&self, taker: bool) -> Decimal {
        if taker {
            self.security.taker_fee
        } else {
            self.security.maker_fee
        }
    }

    /// Round a price to the nearest tick.
    pub fn round_price(&self, price: Decimal) -> Option<Decimal> {
        self.tick.to_raw(price).map(|raw| self.tick.from_raw(raw))
    }
}
