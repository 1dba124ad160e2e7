use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::amount::Amount;

/// A span of days, inclusive on both ends. Empty when `start > end`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of days covered, zero for an empty window.
    pub fn days(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).num_days() + 1
        }
    }

    pub fn intersection(&self, other: &DateWindow) -> DateWindow {
        DateWindow::new(self.start.max(other.start), self.end.min(other.end))
    }

    /// The part of the window strictly after `today`.
    pub fn future(&self, today: NaiveDate) -> DateWindow {
        if self.start > today {
            return *self;
        }
        match today.succ_opt() {
            Some(tomorrow) => DateWindow::new(tomorrow, self.end),
            None => DateWindow::new(NaiveDate::MAX, NaiveDate::MIN),
        }
    }

    /// The part of the window up to and including `today`.
    pub fn past(&self, today: NaiveDate) -> DateWindow {
        if self.end < today {
            *self
        } else {
            DateWindow::new(self.start, today)
        }
    }
}

/// Share of `amount`, spread evenly over `spread_over`, that falls within `wanted`.
pub fn prorate(amount: &Amount, spread_over: &DateWindow, wanted: &DateWindow) -> Amount {
    let overlap = spread_over.intersection(wanted);
    if overlap.is_empty() || spread_over.is_empty() {
        return Amount::zero(amount.currency().clone());
    }
    let ratio = Decimal::from(overlap.days()) / Decimal::from(spread_over.days());
    amount.scale(ratio)
}
