use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Neg;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::errors::{LedgerError, LedgerResult};

/// Immutable amount of money in a specific currency.
///
/// The value is stored as an integer count of minor units (`value * 10^exponent`), so
/// balancing never drifts. Arithmetic and ordering between two different currencies fail,
/// except that a zero amount of any currency acts as the neutral element: it equals every
/// other zero and adding it returns the other operand untouched.
///
/// Minor units stay within `-i64::MAX..=i64::MAX`, so negation and `abs` are exact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Amount {
    minor: i64,
    currency: Currency,
}

impl Amount {
    /// Builds an amount, rounding `value` to the currency exponent (ties to even).
    pub fn new(value: Decimal, currency: Currency) -> Self {
        let minor = to_minor(value, currency.exponent());
        Self { minor, currency }
    }

    pub fn from_minor(minor: i64, currency: Currency) -> Self {
        Self {
            minor: minor.max(-i64::MAX),
            currency,
        }
    }

    pub fn zero(currency: Currency) -> Self {
        Self { minor: 0, currency }
    }

    pub fn minor_units(&self) -> i64 {
        self.minor
    }

    pub fn value(&self) -> Decimal {
        Decimal::new(self.minor, u32::from(self.currency.exponent()))
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    pub fn is_positive(&self) -> bool {
        self.minor > 0
    }

    pub fn is_negative(&self) -> bool {
        self.minor < 0
    }

    pub fn abs(&self) -> Amount {
        Self::from_minor(self.minor.saturating_abs(), self.currency.clone())
    }

    /// The amount if it increases its account, zero otherwise.
    pub fn debit(&self) -> Amount {
        if self.is_positive() {
            self.clone()
        } else {
            Self::zero(self.currency.clone())
        }
    }

    /// The negated amount if it decreases its account, zero otherwise.
    pub fn credit(&self) -> Amount {
        if self.is_negative() {
            -self
        } else {
            Self::zero(self.currency.clone())
        }
    }

    /// Same numeric value tagged with another currency. No exchange rate is involved.
    pub fn with_currency(&self, currency: Currency) -> Amount {
        Self::new(self.value(), currency)
    }

    /// Whether both amounts can be combined. A zero amount is compatible with any currency.
    pub fn same_currency(&self, other: &Amount) -> bool {
        self.is_zero() || other.is_zero() || self.currency == other.currency
    }

    pub fn checked_add(&self, other: &Amount) -> LedgerResult<Amount> {
        if self.is_zero() {
            return Ok(other.clone());
        }
        if other.is_zero() {
            return Ok(self.clone());
        }
        self.ensure_same_currency(other)?;
        let minor = self
            .minor
            .checked_add(other.minor)
            .filter(|minor| *minor != i64::MIN)
            .ok_or_else(|| LedgerError::Overflow(format!("{self} + {other}")))?;
        Ok(Self::from_minor(minor, self.currency.clone()))
    }

    pub fn checked_sub(&self, other: &Amount) -> LedgerResult<Amount> {
        self.checked_add(&-other)
    }

    /// Orders two amounts. Zero compares against anything; otherwise currencies must match.
    pub fn try_cmp(&self, other: &Amount) -> LedgerResult<Ordering> {
        if !self.is_zero() && !other.is_zero() {
            self.ensure_same_currency(other)?;
        }
        Ok(self.value().cmp(&other.value()))
    }

    /// Orders against a plain number, which is only meaningful for zero.
    pub fn cmp_scalar(&self, other: Decimal) -> LedgerResult<Ordering> {
        if !other.is_zero() {
            return Err(LedgerError::TypeMismatch(format!("the plain number {other}")));
        }
        Ok(self.minor.cmp(&0))
    }

    /// Multiplies by a plain factor, rounding to the nearest minor unit.
    ///
    /// Results beyond the representable range saturate.
    pub fn scale(&self, factor: Decimal) -> Amount {
        let value = self.value().checked_mul(factor).unwrap_or_else(|| {
            if self.is_negative() == factor.is_sign_negative() {
                Decimal::MAX
            } else {
                Decimal::MIN
            }
        });
        Self::new(value, self.currency.clone())
    }

    /// Divides by a plain divisor, rounding to the nearest minor unit. `None` when dividing by
    /// zero or when the quotient overflows.
    pub fn checked_div(&self, divisor: Decimal) -> Option<Amount> {
        let value = self.value().checked_div(divisor)?;
        Some(Self::new(value, self.currency.clone()))
    }

    /// `self / other` as a plain number. `Ok(None)` when `other` is zero.
    pub fn ratio(&self, other: &Amount) -> LedgerResult<Option<Decimal>> {
        if other.is_zero() {
            return Ok(None);
        }
        if !self.is_zero() {
            self.ensure_same_currency(other)?;
        }
        Ok(self.value().checked_div(other.value()))
    }

    /// Whether `self` is zero or tagged with `currency`.
    pub fn is_of_currency(&self, currency: &Currency) -> bool {
        self.is_zero() || &self.currency == currency
    }

    /// Sums `amounts`, starting from a zero of `currency`.
    pub fn sum<'a, I>(amounts: I, currency: &Currency) -> LedgerResult<Amount>
    where
        I: IntoIterator<Item = &'a Amount>,
    {
        amounts
            .into_iter()
            .try_fold(Amount::zero(currency.clone()), |acc, amount| {
                acc.checked_add(amount)
            })
    }

    fn ensure_same_currency(&self, other: &Amount) -> LedgerResult<()> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(LedgerError::CurrencyMismatch {
                left: self.currency.code().to_string(),
                right: other.currency.code().to_string(),
            })
        }
    }
}

fn to_minor(value: Decimal, exponent: u8) -> i64 {
    let mut rounded =
        value.round_dp_with_strategy(u32::from(exponent), RoundingStrategy::MidpointNearestEven);
    rounded.rescale(u32::from(exponent));
    let mantissa = rounded.mantissa();
    i64::try_from(mantissa)
        .unwrap_or(if mantissa < 0 { i64::MIN } else { i64::MAX })
        .max(-i64::MAX)
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        if self.is_zero() || other.is_zero() {
            return self.minor == other.minor;
        }
        self.minor == other.minor && self.currency == other.currency
    }
}

impl Eq for Amount {}

impl Hash for Amount {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.minor.hash(state);
        if !self.is_zero() {
            self.currency.hash(state);
        }
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount::from_minor(self.minor.saturating_neg(), self.currency)
    }
}

impl Neg for &Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount::from_minor(self.minor.saturating_neg(), self.currency.clone())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value(), self.currency)
    }
}
