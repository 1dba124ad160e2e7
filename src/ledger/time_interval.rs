use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Consecutive candidates a [`DateCounter`] may skip before giving up.
const MAX_SKIPPED_INCREMENTS: u32 = 512;

/// Repetition rules for schedules and budgets.
///
/// `Weekday` repeats on the same weekday and week index of the month ("every second
/// Friday"), `WeekdayLast` on the last such weekday of the month. Both count `repeat_every`
/// in months.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum RepeatType {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Yearly,
    Weekday,
    WeekdayLast,
}

impl RepeatType {
    /// Parses a stored repeat code. Unknown codes fall back to monthly.
    pub fn from_code(code: &str) -> RepeatType {
        match code.trim().to_ascii_lowercase().as_str() {
            "daily" => RepeatType::Daily,
            "weekly" => RepeatType::Weekly,
            "monthly" => RepeatType::Monthly,
            "yearly" => RepeatType::Yearly,
            "weekday" => RepeatType::Weekday,
            "weekday_last" => RepeatType::WeekdayLast,
            other => {
                warn!(code = other, "unknown repeat type, falling back to monthly");
                RepeatType::Monthly
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RepeatType::Daily => "daily",
            RepeatType::Weekly => "weekly",
            RepeatType::Monthly => "monthly",
            RepeatType::Yearly => "yearly",
            RepeatType::Weekday => "weekday",
            RepeatType::WeekdayLast => "weekday_last",
        }
    }

    /// Moves `date` by `count` units of this rule. `None` when the target does not exist.
    pub fn increment(&self, date: NaiveDate, count: i64) -> Option<NaiveDate> {
        match self {
            RepeatType::Daily => inc_day(date, count),
            RepeatType::Weekly => inc_day(date, count.checked_mul(7)?),
            RepeatType::Monthly => inc_month(date, count),
            RepeatType::Yearly => inc_month(date, count.checked_mul(12)?),
            RepeatType::Weekday => inc_weekday_in_month(date, count),
            RepeatType::WeekdayLast => inc_last_weekday_in_month(date, count),
        }
    }

    pub fn label(&self, every: u32, start: NaiveDate) -> String {
        match (every, self) {
            (1, RepeatType::Daily) => "Daily".into(),
            (1, RepeatType::Weekly) => "Weekly".into(),
            (1, RepeatType::Monthly) => "Monthly".into(),
            (1, RepeatType::Yearly) => "Yearly".into(),
            (n, RepeatType::Daily) => format!("Every {n} days"),
            (n, RepeatType::Weekly) => format!("Every {n} weeks"),
            (n, RepeatType::Monthly) => format!("Every {n} months"),
            (n, RepeatType::Yearly) => format!("Every {n} years"),
            (_, RepeatType::Weekday) => {
                let position = match (start.day() - 1) / 7 {
                    0 => "first",
                    1 => "second",
                    2 => "third",
                    3 => "fourth",
                    _ => "fifth",
                };
                format!("Every {} {} of the month", position, start.format("%A"))
            }
            (_, RepeatType::WeekdayLast) => {
                if days_in_month(start.year(), start.month()) - start.day() < 7 {
                    format!("Every last {} of the month", start.format("%A"))
                } else {
                    String::new()
                }
            }
        }
    }
}

pub fn inc_day(date: NaiveDate, count: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::days(count))
}

/// Same day `count` months later, clamped to the length of the target month.
pub fn inc_month(date: NaiveDate, count: i64) -> Option<NaiveDate> {
    let index = i64::from(date.year()) * 12 + i64::from(date.month0()) + count;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Same weekday and week index `count` months later, if that month has it.
pub fn inc_weekday_in_month(date: NaiveDate, count: i64) -> Option<NaiveDate> {
    let weekday = date.weekday().num_days_from_monday();
    let week_index = (date.day() - 1) / 7;
    let first = inc_month(date, count)?.with_day(1)?;
    let first_weekday = first.weekday().num_days_from_monday();
    let offset = (weekday + 7 - first_weekday) % 7;
    first.with_day(week_index * 7 + offset + 1)
}

/// Last occurrence of the same weekday `count` months later.
pub fn inc_last_weekday_in_month(date: NaiveDate, count: i64) -> Option<NaiveDate> {
    let weekday = date.weekday().num_days_from_monday();
    let target = inc_month(date, count)?;
    let length = days_in_month(target.year(), target.month());
    let last = target.with_day(length)?;
    let offset = (last.weekday().num_days_from_monday() + 7 - weekday) % 7;
    last.with_day(length - offset)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if NaiveDate::from_ymd_opt(year, 2, 29).is_some() => 29,
        2 => 28,
        _ => 31,
    }
}

/// Iterates over the dates of a repeat rule, from `base` up to `end` inclusive.
///
/// Every date is computed from `base` with an accumulating multiplier, so month-end
/// clamping never drifts (Jan 31 → Feb 29 → Mar 31). Candidates that do not exist are
/// skipped; a candidate past `end` or not after the previous date ends the sequence.
#[derive(Debug, Clone)]
pub struct DateCounter {
    base: NaiveDate,
    end: NaiveDate,
    repeat_type: RepeatType,
    step: i64,
    count: i64,
    current: Option<NaiveDate>,
    exhausted: bool,
}

impl DateCounter {
    pub fn new(base: NaiveDate, repeat_type: RepeatType, every: u32, end: NaiveDate) -> Self {
        Self {
            base,
            end,
            repeat_type,
            step: i64::from(every),
            count: 0,
            current: None,
            exhausted: false,
        }
    }

    fn next_candidate(&mut self) -> Option<NaiveDate> {
        for _ in 0..MAX_SKIPPED_INCREMENTS {
            self.count = self.count.checked_add(self.step)?;
            if let Some(date) = self.repeat_type.increment(self.base, self.count) {
                return Some(date);
            }
        }
        None
    }
}

impl Iterator for DateCounter {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        if self.exhausted || self.base > self.end {
            return None;
        }
        let Some(current) = self.current else {
            self.current = Some(self.base);
            return Some(self.base);
        };
        match self.next_candidate() {
            Some(candidate) if candidate > current && candidate <= self.end => {
                self.current = Some(candidate);
                Some(candidate)
            }
            _ => {
                self.exhausted = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn collect(
        base: NaiveDate,
        repeat_type: RepeatType,
        every: u32,
        end: NaiveDate,
    ) -> Vec<NaiveDate> {
        DateCounter::new(base, repeat_type, every, end).collect()
    }

    #[test]
    fn month_end_clamps_without_drifting() {
        let dates = collect(date(2020, 1, 31), RepeatType::Monthly, 1, date(2020, 6, 30));
        assert_eq!(
            dates,
            vec![
                date(2020, 1, 31),
                date(2020, 2, 29),
                date(2020, 3, 31),
                date(2020, 4, 30),
                date(2020, 5, 31),
                date(2020, 6, 30),
            ]
        );
    }

    #[test]
    fn steps_multiply_the_unit() {
        let dates = collect(date(2025, 1, 1), RepeatType::Weekly, 2, date(2025, 2, 1));
        assert_eq!(
            dates,
            vec![date(2025, 1, 1), date(2025, 1, 15), date(2025, 1, 29)]
        );
        let yearly = collect(date(2020, 2, 29), RepeatType::Yearly, 1, date(2024, 3, 1));
        assert_eq!(yearly[1], date(2021, 2, 28));
        assert_eq!(yearly[4], date(2024, 2, 29));
    }

    #[test]
    fn base_after_end_yields_nothing() {
        assert!(collect(date(2025, 3, 1), RepeatType::Daily, 1, date(2025, 2, 1)).is_empty());
    }

    #[test]
    fn missing_fifth_weekday_is_skipped() {
        // 2020-01-31 is the fifth Friday of January.
        let dates = collect(date(2020, 1, 31), RepeatType::Weekday, 1, date(2020, 6, 30));
        assert_eq!(dates, vec![date(2020, 1, 31), date(2020, 5, 29)]);
    }

    #[test]
    fn last_weekday_of_month() {
        let dates = collect(date(2020, 1, 31), RepeatType::WeekdayLast, 1, date(2020, 3, 31));
        assert_eq!(dates, vec![date(2020, 1, 31), date(2020, 2, 28), date(2020, 3, 27)]);
    }

    #[test]
    fn unknown_codes_fall_back_to_monthly() {
        assert_eq!(RepeatType::from_code("fortnightly"), RepeatType::Monthly);
        assert_eq!(RepeatType::from_code("Weekday_Last"), RepeatType::WeekdayLast);
    }

    #[test]
    fn labels_describe_the_rule() {
        let start = date(2020, 1, 10);
        assert_eq!(RepeatType::Monthly.label(1, start), "Monthly");
        assert_eq!(RepeatType::Weekly.label(2, start), "Every 2 weeks");
        assert_eq!(
            RepeatType::Weekday.label(1, start),
            "Every second Friday of the month"
        );
        assert_eq!(RepeatType::WeekdayLast.label(1, start), "");
        assert_eq!(
            RepeatType::WeekdayLast.label(1, date(2020, 1, 31)),
            "Every last Friday of the month"
        );
    }
}
