//! Money amounts in integer minor units.
//!
//! All donation and wallet arithmetic runs on whole pence (GBP). Integer
//! minor units keep the tier and bonus tables exact -- no float rounding in
//! a cap comparison.

use std::fmt;
use std::iter::Sum;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// ISO currency code used across the ledger. Donations are GBP-only.
pub const CURRENCY: &str = "GBP";

/// An amount of money in whole pence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_pence(pence: i64) -> Self {
        Money(pence)
    }

    pub const fn pence(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Saturating addition. Ledger sums never need to wrap.
    pub fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    /// Parse a decimal pounds string ("1.50", "20", "0.05") into pence.
    pub fn parse(input: &str) -> Result<Money, ValidationError> {
        let s = input.trim().trim_start_matches('£');
        let invalid = || ValidationError::InvalidAmount(input.to_string());

        let (pounds, pence) = match s.split_once('.') {
            Some((whole, frac)) => {
                if frac.is_empty() || frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                let mut value: i64 = frac.parse().map_err(|_| invalid())?;
                // "1.5" means 50 pence, not 5.
                if frac.len() == 1 {
                    value *= 10;
                }
                (whole, value)
            }
            None => (s, 0),
        };

        if pounds.is_empty() || !pounds.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let pounds: i64 = pounds.parse().map_err(|_| invalid())?;

        Ok(Money(pounds * 100 + pence))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{sign}£{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Money::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_decimal_strings() {
        assert_eq!(Money::parse("1.50").unwrap(), Money::from_pence(150));
        assert_eq!(Money::parse("1.5").unwrap(), Money::from_pence(150));
        assert_eq!(Money::parse("20").unwrap(), Money::from_pence(2000));
        assert_eq!(Money::parse("0.05").unwrap(), Money::from_pence(5));
        assert_eq!(Money::parse("£3").unwrap(), Money::from_pence(300));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Money::parse("").is_err());
        assert!(Money::parse("1.505").is_err());
        assert!(Money::parse("1.").is_err());
        assert!(Money::parse("abc").is_err());
        assert!(Money::parse("-1").is_err());
    }

    #[test]
    fn display_as_pounds() {
        assert_eq!(Money::from_pence(150).to_string(), "£1.50");
        assert_eq!(Money::from_pence(2000).to_string(), "£20.00");
        assert_eq!(Money::from_pence(5).to_string(), "£0.05");
    }

    #[test]
    fn ordering_and_sum() {
        let total: Money = [100, 150, 200]
            .into_iter()
            .map(Money::from_pence)
            .sum();
        assert_eq!(total, Money::from_pence(450));
        assert!(Money::from_pence(1950) + Money::from_pence(150) > Money::from_pence(2000));
    }
}
