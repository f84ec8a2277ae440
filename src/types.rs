// 1.0: all the primitives live here. nothing in the ledger works without these types.
// IDs, sides, timestamps and the fixed-point grid. each is a newtype so the compiler catches mixups.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SecurityId(pub u64);

impl fmt::Display for SecurityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// assigned by us when the order is created, stable for its whole life
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(pub String);

impl ClientOrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// assigned by the venue on confirmation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VenueOrderId(pub String);

impl VenueOrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for VenueOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeId(pub String);

impl TradeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// 1.1: an account is identified by the venue it lives on plus its name there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId {
    pub exchange: String,
    pub name: String,
}

impl AccountId {
    pub fn new(exchange: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.exchange, self.name)
    }
}

// either key reaches the same order record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderRef {
    Client(ClientOrderId),
    Venue(VenueOrderId),
}

impl From<ClientOrderId> for OrderRef {
    fn from(id: ClientOrderId) -> Self {
        OrderRef::Client(id)
    }
}

impl From<VenueOrderId> for OrderRef {
    fn from(id: VenueOrderId) -> Self {
        OrderRef::Venue(id)
    }
}

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderRef::Client(id) => write!(f, "client:{}", id),
            OrderRef::Venue(id) => write!(f, "venue:{}", id),
        }
    }
}

// Buy = adds to a long / reduces a short. Sell = the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

// 1.2: fixed-point grid. integer units per 1.0 of the floating value.
// lot precision for sizes, tick precision for prices, margin precision for money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Precision(i64);

impl Precision {
    #[must_use]
    pub fn new(scale: i64) -> Option<Self> {
        if scale > 0 {
            Some(Self(scale))
        } else {
            None
        }
    }

    // ceil(1 / increment). 0.001 -> 1000, 0.5 -> 2, 10 -> 1
    #[must_use]
    pub fn from_increment(increment: Decimal) -> Option<Self> {
        if increment <= Decimal::ZERO {
            return None;
        }
        Decimal::ONE
            .checked_div(increment)?
            .ceil()
            .to_i64()
            .and_then(Self::new)
    }

    pub fn scale(&self) -> i64 {
        self.0
    }

    // rounds half away from zero. None on overflow.
    pub fn to_raw(&self, value: Decimal) -> Option<i64> {
        value
            .checked_mul(Decimal::from(self.0))?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }

    pub fn from_raw(&self, raw: i64) -> Decimal {
        Decimal::from(raw) / Decimal::from(self.0)
    }

    // distance to the nearest grid point, in raw units, within tolerance
    pub fn is_aligned(&self, value: Decimal, tolerance: Decimal) -> bool {
        match value.checked_mul(Decimal::from(self.0)) {
            Some(scaled) => (scaled - scaled.round()).abs() <= tolerance,
            None => false,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1/{}", self.0)
    }
}

// 1.3: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn add_millis(&self, ms: i64) -> Self {
        Self(self.0.saturating_add(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn precision_from_increment() {
        assert_eq!(Precision::from_increment(dec!(0.001)).unwrap().scale(), 1000);
        assert_eq!(Precision::from_increment(dec!(0.5)).unwrap().scale(), 2);
        assert_eq!(Precision::from_increment(dec!(1)).unwrap().scale(), 1);
        // coarser than one unit still maps to a grid of 1
        assert_eq!(Precision::from_increment(dec!(10)).unwrap().scale(), 1);
        // 1/0.3 = 3.33.. rounds up
        assert_eq!(Precision::from_increment(dec!(0.3)).unwrap().scale(), 4);
        assert!(Precision::from_increment(Decimal::ZERO).is_none());
        assert!(Precision::from_increment(dec!(-1)).is_none());
    }

    #[test]
    fn raw_conversion_rounds_half_away_from_zero() {
        let p = Precision::new(100).unwrap();
        assert_eq!(p.to_raw(dec!(0.125)), Some(13));
        assert_eq!(p.to_raw(dec!(-0.125)), Some(-13));
        assert_eq!(p.to_raw(dec!(0.124)), Some(12));
        assert_eq!(p.from_raw(13), dec!(0.13));
    }

    #[test]
    fn raw_conversion_overflow_is_none() {
        let p = Precision::new(100_000_000).unwrap();
        assert!(p.to_raw(Decimal::MAX).is_none());
    }

    #[test]
    fn lot_alignment() {
        let lot = Precision::new(1000).unwrap();
        assert!(lot.is_aligned(dec!(1.234), dec!(0.00001)));
        assert!(!lot.is_aligned(dec!(1.2345), dec!(0.00001)));
        // tiny representation noise is tolerated
        assert!(lot.is_aligned(dec!(1.234000001), dec!(0.00001)));
    }

    #[test]
    fn side_sign() {
        assert_eq!(Side::Buy.sign(), 1);
        assert_eq!(Side::Sell.sign(), -1);
        assert_eq!(Side::Buy.opposite(), Side::Sell);
    }

    #[test]
    fn order_ref_display() {
        let by_client: OrderRef = ClientOrderId::new("c-1").into();
        let by_venue: OrderRef = VenueOrderId::new("v-9").into();
        assert_eq!(by_client.to_string(), "client:c-1");
        assert_eq!(by_venue.to_string(), "venue:v-9");
    }
}
