//! Minor-units money, the form every amount takes on the RPC surface
//! and in every persisted transaction/subscription row (spec §6:
//! "Monetary amounts are in minor units (integers)").

use serde::{Deserialize, Serialize};
use std::fmt;

/// An amount in the minor unit of `currency` (cents for USD, for
/// example) plus the ISO-4217 currency code it is denominated in.
///
/// Kept as a plain `i64` rather than `rust_decimal::Decimal` on
/// purpose: the wire contract and the gateway's own `AMOUNT` field are
/// both integral minor units, and comparing/summing minor units avoids
/// the rounding questions a `Decimal` balance would raise when callers
/// sum partial captures and refunds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money {
    pub minor_units: i64,
    pub currency: [u8; 3],
}

impl Money {
    pub fn new(minor_units: i64, currency: &str) -> Result<Self, MoneyError> {
        let upper = currency.trim().to_uppercase();
        if upper.len() != 3 || !upper.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(MoneyError::InvalidCurrency(currency.to_string()));
        }
        if minor_units < 0 {
            return Err(MoneyError::NegativeAmount(minor_units));
        }
        let mut bytes = [0u8; 3];
        bytes.copy_from_slice(upper.as_bytes());
        Ok(Self {
            minor_units,
            currency: bytes,
        })
    }

    pub fn currency_str(&self) -> &str {
        std::str::from_utf8(&self.currency).unwrap_or("???")
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        self.minor_units
            .checked_add(other.minor_units)
            .map(|minor_units| Money {
                minor_units,
                currency: self.currency,
            })
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        self.minor_units
            .checked_sub(other.minor_units)
            .map(|minor_units| Money {
                minor_units,
                currency: self.currency,
            })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.minor_units, self.currency_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum MoneyError {
    #[error("invalid ISO currency code: {0}")]
    InvalidCurrency(String),
    #[error("amount must not be negative: {0}")]
    NegativeAmount(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_iso_currency() {
        assert!(Money::new(100, "US").is_err());
        assert!(Money::new(100, "USDD").is_err());
        assert!(Money::new(100, "12D").is_err());
    }

    #[test]
    fn normalizes_case() {
        let m = Money::new(100, "usd").unwrap();
        assert_eq!(m.currency_str(), "USD");
    }

    #[test]
    fn checked_add_requires_matching_currency() {
        let usd = Money::new(100, "USD").unwrap();
        let eur = Money::new(100, "EUR").unwrap();
        assert!(usd.checked_add(eur).is_none());
        assert_eq!(usd.checked_add(usd).unwrap().minor_units, 200);
    }
}
