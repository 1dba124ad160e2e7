//! Currencies, exchange rates, and the conversion capability consumed by the ledger.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::errors::{LedgerError, LedgerResult};
use crate::ledger::amount::Amount;

/// ISO 4217 currency with the number of minor digits amounts are stored with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Currency {
    code: String,
    exponent: u8,
}

impl Currency {
    /// Creates a currency, deriving its exponent from the code.
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into().to_uppercase();
        let exponent = minor_units_for(&code);
        Self { code, exponent }
    }

    /// Creates a currency with an explicit exponent, capped at the decimal precision limit.
    pub fn with_exponent(code: impl Into<String>, exponent: u8) -> Self {
        let max = u8::try_from(Decimal::MAX_SCALE).unwrap_or(u8::MAX);
        Self {
            code: code.into().to_uppercase(),
            exponent: exponent.min(max),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn exponent(&self) -> u8 {
        self.exponent
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::new("USD")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

pub fn minor_units_for(code: &str) -> u8 {
    match code {
        "JPY" | "KRW" | "CLP" | "ISK" => 0,
        "KWD" | "BHD" | "OMR" | "TND" => 3,
        _ => 2,
    }
}

/// Converts amounts between currencies as of a given date.
///
/// The ledger never owns exchange rates; whoever drives projections passes a converter in.
pub trait CurrencyConverter {
    fn convert(&self, amount: &Amount, target: &Currency, date: NaiveDate)
        -> LedgerResult<Amount>;
}

impl<F> CurrencyConverter for F
where
    F: Fn(&Amount, &Currency, NaiveDate) -> LedgerResult<Amount>,
{
    fn convert(
        &self,
        amount: &Amount,
        target: &Currency,
        date: NaiveDate,
    ) -> LedgerResult<Amount> {
        self(amount, target, date)
    }
}

/// Metadata for FX lookups. `rate` is how many units of `to` one unit of `from` buys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FxRate {
    pub from: Currency,
    pub to: Currency,
    pub date: NaiveDate,
    pub rate: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl FxRate {
    pub fn new(from: Currency, to: Currency, date: NaiveDate, rate: Decimal) -> Self {
        Self {
            from,
            to,
            date,
            rate,
            source: None,
        }
    }

    pub fn inverse(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            date: self.date,
            rate: invert(self.rate),
            source: self.source.clone(),
        }
    }
}

fn invert(rate: Decimal) -> Decimal {
    if rate.is_zero() {
        Decimal::ZERO
    } else {
        Decimal::ONE / rate
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FxTolerance {
    pub days: i64,
}

impl Default for FxTolerance {
    fn default() -> Self {
        Self { days: 5 }
    }
}

#[derive(Debug, Clone)]
pub struct FxLookup {
    pub rate: Decimal,
    pub date: NaiveDate,
    pub source: String,
}

/// In-memory rate table. Lookups fall back to the inverse pair and to the
/// nearest prior rate within `tolerance`.
#[derive(Debug, Clone, Default)]
pub struct FxBook {
    rates: HashMap<(String, String), BTreeMap<NaiveDate, FxRate>>,
    pub tolerance: FxTolerance,
}

impl FxBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(days: i64) -> Self {
        Self {
            rates: HashMap::new(),
            tolerance: FxTolerance { days },
        }
    }

    pub fn add_rate(&mut self, rate: FxRate) {
        let key = (rate.from.code().to_string(), rate.to.code().to_string());
        self.rates.entry(key).or_default().insert(rate.date, rate);
    }

    pub fn remove_rate(&mut self, from: &str, to: &str, date: NaiveDate) {
        if let Some(map) = self.rates.get_mut(&(from.to_string(), to.to_string())) {
            map.remove(&date);
        }
        if let Some(map) = self.rates.get_mut(&(to.to_string(), from.to_string())) {
            map.remove(&date);
        }
    }

    pub fn lookup_rate(&self, from: &str, to: &str, date: NaiveDate) -> LedgerResult<FxLookup> {
        if from.eq_ignore_ascii_case(to) {
            return Ok(FxLookup {
                rate: Decimal::ONE,
                date,
                source: "parity".into(),
            });
        }
        let key = (from.to_string(), to.to_string());
        if let Some(lookup) = self.rates.get(&key).and_then(|s| self.lookup_within(s, date)) {
            return Ok(lookup);
        }
        let inverse_key = (to.to_string(), from.to_string());
        if let Some(lookup) = self
            .rates
            .get(&inverse_key)
            .and_then(|s| self.lookup_within(s, date))
        {
            return Ok(FxLookup {
                rate: invert(lookup.rate),
                date: lookup.date,
                source: lookup.source,
            });
        }
        Err(LedgerError::RateNotFound {
            from: from.to_string(),
            to: to.to_string(),
            date,
        })
    }

    fn lookup_within(
        &self,
        series: &BTreeMap<NaiveDate, FxRate>,
        date: NaiveDate,
    ) -> Option<FxLookup> {
        let (near_date, rate) = series.range(..=date).next_back()?;
        if *near_date != date && (date - *near_date).num_days() > self.tolerance.days {
            return None;
        }
        Some(FxLookup {
            rate: rate.rate,
            date: *near_date,
            source: rate.source.clone().unwrap_or_else(|| {
                if *near_date == date {
                    "manual".to_string()
                } else {
                    "nearest_prior".to_string()
                }
            }),
        })
    }
}

impl CurrencyConverter for FxBook {
    fn convert(
        &self,
        amount: &Amount,
        target: &Currency,
        date: NaiveDate,
    ) -> LedgerResult<Amount> {
        if amount.is_zero() {
            return Ok(Amount::zero(target.clone()));
        }
        if amount.currency() == target {
            return Ok(amount.clone());
        }
        let lookup = self.lookup_rate(amount.currency().code(), target.code(), date)?;
        trace!(
            from = amount.currency().code(),
            to = target.code(),
            rate = %lookup.rate,
            source = %lookup.source,
            "converted amount"
        );
        let value = amount
            .value()
            .checked_mul(lookup.rate)
            .ok_or_else(|| LedgerError::Overflow(format!("{amount} at rate {}", lookup.rate)))?;
        Ok(Amount::new(value, target.clone()))
    }
}
