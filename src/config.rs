// 7.0 config.rs: ledger settings in one place. margin currency, fixed-point scale,
// lot tolerance and event retention. fee rates come from the security catalog, not here.

use crate::types::Precision;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/** 7.1: per-account ledger settings */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    // Asset the margin accumulator is denominated in (e.g. "BTC")
    pub margin_currency: String,
    // Integer units per 1.0 of margin currency
    pub margin_precision: i64,
    // How far off the lot grid an order quantity may be, in raw lot units
    pub lot_tolerance: Decimal,
    // Maximum number of audit events retained in memory
    pub max_events: usize,
    // Trace every audit event
    pub verbose: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            margin_currency: "BTC".to_string(),
            margin_precision: 100_000_000, // satoshis
            lot_tolerance: Decimal::new(1, 5), // 1e-5
            max_events: 10_000,
            verbose: false,
        }
    }
}

impl LedgerConfig {
    // Coin-margined account settling in BTC
    pub fn inverse_btc() -> Self {
        Self::default()
    }

    // Stablecoin-margined account. cents are too coarse for fees, so 1e-6.
    pub fn linear_usd(margin_currency: &str) -> Self {
        Self {
            margin_currency: margin_currency.to_string(),
            margin_precision: 1_000_000,
            ..Self::default()
        }
    }

    pub fn margin_precision(&self) -> Option<Precision> {
        Precision::new(self.margin_precision)
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.margin_currency.trim().is_empty() {
            return Err(ConfigError::InvalidMarginCurrency);
        }

        if self.margin_precision <= 0 {
            return Err(ConfigError::InvalidPrecision {
                reason: "Margin precision must be positive".to_string(),
            });
        }

        if self.lot_tolerance < Decimal::ZERO || self.lot_tolerance >= Decimal::ONE {
            return Err(ConfigError::InvalidTolerance {
                reason: "Lot tolerance must be in [0, 1)".to_string(),
            });
        }

        if self.max_events == 0 {
            return Err(ConfigError::InvalidRetention);
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Margin currency must not be empty")]
    InvalidMarginCurrency,
    #[error("Invalid precision: {reason}")]
    InvalidPrecision { reason: String },
    #[error("Invalid lot tolerance: {reason}")]
    InvalidTolerance { reason: String },
    #[error("Event retention must be at least 1")]
    InvalidRetention,
}
