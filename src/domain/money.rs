use crate::error::LifecycleError;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest unit an amount may carry: cents.
const CENT_SCALE: u32 = 2;

/// A non-negative monetary value in the marketplace currency, in whole cents.
///
/// Wraps `rust_decimal::Decimal` so prices, fees and payouts cannot go negative
/// and never pass through floating point. There is no `+` operator: sums go through
/// [`Money::checked_add`] or [`Money::total`], which refuse to overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, LifecycleError> {
        if value < Decimal::ZERO {
            return Err(LifecycleError::ValidationError(format!(
                "Amount must not be negative, got {value}"
            )));
        }
        let value = value.normalize();
        if value.scale() > CENT_SCALE {
            return Err(LifecycleError::ValidationError(format!(
                "Amount {value} is finer than a cent"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, LifecycleError> {
        self.0.checked_add(rhs.0).map(Self).ok_or_else(|| {
            LifecycleError::ValidationError(format!("Amount {self} + {rhs} is out of range"))
        })
    }

    /// Sum of `amounts`, failing instead of overflowing.
    pub fn total(amounts: impl IntoIterator<Item = Self>) -> Result<Self, LifecycleError> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |acc, amount| acc.checked_add(amount))
    }

    /// Subtraction that refuses to produce a negative amount.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        if rhs.0 > self.0 {
            None
        } else {
            Some(Self(self.0 - rhs.0))
        }
    }
}

impl TryFrom<Decimal> for Money {
    type Error = LifecycleError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// A commission percentage between 0 and 100 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Rate(Decimal);

impl Rate {
    pub fn new(percent: Decimal) -> Result<Self, LifecycleError> {
        if percent < Decimal::ZERO || percent > dec!(100) {
            return Err(LifecycleError::ValidationError(format!(
                "Commission rate must be between 0 and 100, got {percent}"
            )));
        }
        Ok(Self(percent.normalize()))
    }

    /// For compile-time constants already known to be within bounds.
    pub(crate) const fn percent_unchecked(percent: Decimal) -> Self {
        Self(percent)
    }

    pub fn percent(&self) -> Decimal {
        self.0
    }

    /// `amount × rate / 100`, rounded half-up to cents.
    pub fn share_of(&self, amount: Money) -> Result<Money, LifecycleError> {
        let share = amount
            .value()
            .checked_mul(self.0)
            .and_then(|product| product.checked_div(dec!(100)))
            .ok_or_else(|| {
                LifecycleError::ValidationError(format!("{self} of {amount} is out of range"))
            })?;
        Ok(Money(share.round_dp_with_strategy(
            CENT_SCALE,
            RoundingStrategy::MidpointAwayFromZero,
        )))
    }
}

impl TryFrom<Decimal> for Rate {
    type Error = LifecycleError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rate> for Decimal {
    fn from(rate: Rate) -> Self {
        rate.0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
