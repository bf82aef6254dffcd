//! Monetary amounts and loosely typed scalar input.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize, Serializer};

/// Largest amount accepted from callers, for a single value or a document total.
pub const MAX_AMOUNT: Decimal = dec!(999999999999999.99);

/// An amount rounded to cents, serialized as a two-decimal string (`"1180.00"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Round `amount` half away from zero to two decimals.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Underlying decimal value.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Whether the amount is strictly positive.
    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// `Some(self)` when positive, `None` otherwise.
    #[must_use]
    pub fn positive(self) -> Option<Self> {
        self.is_positive().then_some(self)
    }

    /// Absolute difference between two amounts, saturating at [`Decimal::MAX`].
    #[must_use]
    pub fn abs_diff(self, other: Self) -> Decimal {
        self.0
            .checked_sub(other.0)
            .map_or(Decimal::MAX, |d| d.abs())
    }

    /// `self + rhs`, or `None` on overflow.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Sum of `amounts`, or `None` on overflow.
    #[must_use]
    pub fn checked_sum(amounts: impl IntoIterator<Item = Self>) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, Self::checked_add)
    }

    /// Whether the amount is within [`MAX_AMOUNT`].
    #[must_use]
    pub fn within_limit(self) -> bool {
        self.0 <= MAX_AMOUNT
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Money {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self {
        Self::new(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parse an amount that may carry thousands separators (`"1,250.50"`).
///
/// Returns `None` when the text is not a number.
#[must_use]
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

/// A JSON scalar that callers send either as text, number or boolean.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// JSON boolean.
    Bool(bool),
    /// JSON number, kept verbatim.
    Number(serde_json::Number),
    /// JSON string.
    Text(String),
}

impl Scalar {
    /// Text form, trimmed; `None` for empty strings.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            Self::Bool(value) => value.to_string(),
            Self::Number(number) => number.to_string(),
            Self::Text(text) => text.trim().to_string(),
        };
        (!text.is_empty()).then_some(text)
    }

    /// Decimal value; `None` when not numeric.
    #[must_use]
    pub fn as_amount(&self) -> Option<Decimal> {
        match self {
            Self::Bool(_) => None,
            Self::Number(number) => parse_amount(&number.to_string()),
            Self::Text(text) => parse_amount(text),
        }
    }

    /// Only a literal JSON `true` counts.
    #[must_use]
    pub const fn is_true(&self) -> bool {
        matches!(self, Self::Bool(true))
    }
}

impl From<&str> for Scalar {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}
