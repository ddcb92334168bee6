//! Fixed-point amounts in the ledger's smallest unit.
//!
//! The ledger counts value in base units with 18 fractional digits, so one
//! display unit (`1.0`) is `10^18` base units. Conversions between decimal
//! text and base units are exact; no floating point is involved anywhere.

use std::fmt;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use thiserror::Error;

/// Number of fractional digits in one display unit.
pub const DECIMALS: u32 = 18;

/// Base units per display unit.
pub const UNIT: u128 = 10u128.pow(DECIMALS);

/// Errors produced when parsing decimal amount text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("unexpected character {0:?} in amount")]
    InvalidCharacter(char),

    #[error("amount has more than one decimal point")]
    MultipleDecimalPoints,

    #[error("amount has {got} fractional digits, at most {max} are supported")]
    TooPrecise { max: u32, got: usize },

    #[error("amount is too large")]
    Overflow,
}

/// A non-negative amount in base units.
///
/// Serialized as a decimal string of base units so that JSON consumers never
/// round it through a double.
#[serde_as]
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Amount(#[serde_as(as = "DisplayFromStr")] u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// One hundredth of a display unit.
    pub const CENT: Amount = Amount(UNIT / 100);

    pub const fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    pub const fn base_units(self) -> u128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    /// Parse decimal text such as `"1.01"` into base units.
    ///
    /// Accepts an optional fractional part of up to [`DECIMALS`] digits.
    /// Signs, exponents and separators are rejected.
    pub fn parse_decimal(input: &str) -> Result<Self, AmountError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(AmountError::Empty);
        }

        let (whole, frac) = match text.split_once('.') {
            Some((_, frac)) if frac.contains('.') => {
                return Err(AmountError::MultipleDecimalPoints)
            }
            Some((whole, frac)) => (whole, frac),
            None => (text, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(AmountError::Empty);
        }
        if let Some(c) = whole.chars().chain(frac.chars()).find(|c| !c.is_ascii_digit()) {
            return Err(AmountError::InvalidCharacter(c));
        }
        if frac.len() > DECIMALS as usize {
            return Err(AmountError::TooPrecise {
                max: DECIMALS,
                got: frac.len(),
            });
        }

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole.parse::<u128>().map_err(|_| AmountError::Overflow)?
        };
        let frac_units = if frac.is_empty() {
            0
        } else {
            // At most 18 digits, always fits.
            let digits = frac.parse::<u128>().map_err(|_| AmountError::Overflow)?;
            digits * 10u128.pow(DECIMALS - frac.len() as u32)
        };

        whole_units
            .checked_mul(UNIT)
            .and_then(|units| units.checked_add(frac_units))
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_decimal(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNIT;
        let frac = self.0 % UNIT;
        if frac == 0 {
            return write!(f, "{whole}.0");
        }
        let digits = format!("{:0width$}", frac, width = DECIMALS as usize);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exact() {
        assert_eq!(Amount::parse_decimal("1").unwrap().base_units(), UNIT);
        assert_eq!(
            Amount::parse_decimal("1.01").unwrap().base_units(),
            UNIT + UNIT / 100
        );
        assert_eq!(Amount::parse_decimal(".5").unwrap().base_units(), UNIT / 2);
        assert_eq!(
            Amount::parse_decimal("0.000000000000000001").unwrap(),
            Amount::from_base_units(1)
        );
        assert_eq!(Amount::parse_decimal(" 2. ").unwrap().base_units(), 2 * UNIT);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(Amount::parse_decimal(""), Err(AmountError::Empty));
        assert_eq!(Amount::parse_decimal("."), Err(AmountError::Empty));
        assert_eq!(
            Amount::parse_decimal("-1"),
            Err(AmountError::InvalidCharacter('-'))
        );
        assert_eq!(
            Amount::parse_decimal("1e18"),
            Err(AmountError::InvalidCharacter('e'))
        );
        assert_eq!(
            Amount::parse_decimal("1.2.3"),
            Err(AmountError::MultipleDecimalPoints)
        );
        assert_eq!(
            Amount::parse_decimal("0.0000000000000000001"),
            Err(AmountError::TooPrecise { max: 18, got: 19 })
        );
        assert_eq!(
            Amount::parse_decimal("999999999999999999999999999999"),
            Err(AmountError::Overflow)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::from_base_units(UNIT).to_string(), "1.0");
        assert_eq!(Amount::parse_decimal("1.01").unwrap().to_string(), "1.01");
        assert_eq!(Amount::from_base_units(1).to_string(), "0.000000000000000001");
        assert_eq!(Amount::ZERO.to_string(), "0.0");
    }

    #[test]
    fn test_cent_addition_is_exact() {
        // 0.1 + 0.2 style accumulation must not drift.
        let mut total = Amount::ZERO;
        for _ in 0..300 {
            total = total.checked_add(Amount::CENT).unwrap();
        }
        assert_eq!(total, Amount::parse_decimal("3").unwrap());
    }

    #[test]
    fn test_serde_as_base_unit_string() {
        let amount = Amount::parse_decimal("1.5").unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"1500000000000000000\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}
