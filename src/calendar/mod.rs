//! Calendar arithmetic for billing periods and weekly recurring slots.
//!
//! Day-of-week numbering follows the booking subsystem: 0 = Sunday through 6 = Saturday.

use std::fmt;

use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::errors::{BillingError, BillingResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sunday,
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    /// Maps the 0..=6 index used by booking rows onto a weekday.
    pub fn from_index(index: u8) -> Option<DayOfWeek> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn of(date: NaiveDate) -> DayOfWeek {
        Self::from(date.weekday())
    }

    pub fn label(self) -> &'static str {
        match self {
            DayOfWeek::Sunday => "Sunday",
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        Self::ALL[weekday.num_days_from_sunday() as usize]
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A (month, year) billing cycle. Ordered chronologically.
///
/// Only constructible through [`BillingPeriod::new`] or [`BillingPeriod::containing`], so every
/// value names a real calendar month. Serialized as `{"year": .., "month": ..}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "PeriodParts", into = "PeriodParts")]
pub struct BillingPeriod {
    first: NaiveDate,
}

#[derive(Serialize, Deserialize)]
struct PeriodParts {
    year: i32,
    month: u32,
}

impl TryFrom<PeriodParts> for BillingPeriod {
    type Error = BillingError;

    fn try_from(parts: PeriodParts) -> Result<Self, Self::Error> {
        BillingPeriod::new(parts.year, parts.month)
    }
}

impl From<BillingPeriod> for PeriodParts {
    fn from(period: BillingPeriod) -> Self {
        PeriodParts {
            year: period.year(),
            month: period.month(),
        }
    }
}

impl BillingPeriod {
    pub fn new(year: i32, month: u32) -> BillingResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(BillingError::Validation(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            BillingError::Validation(format!(
                "year {year} is outside the supported calendar range"
            ))
        })?;
        Ok(Self { first })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first: date - Duration::days(i64::from(date.day0())),
        }
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    /// First day of the following period, i.e. the exclusive end of this one.
    pub fn first_day_of_next(&self) -> NaiveDate {
        self.first
            .checked_add_months(Months::new(1))
            .unwrap_or(NaiveDate::MAX)
    }

    /// `None` past the end of the supported calendar.
    pub fn next(&self) -> Option<Self> {
        self.first
            .checked_add_months(Months::new(1))
            .map(|first| Self { first })
    }

    pub fn previous(&self) -> Option<Self> {
        self.first
            .checked_sub_months(Months::new(1))
            .map(|first| Self { first })
    }

    pub fn window(&self) -> DateWindow {
        DateWindow {
            start: self.first,
            end: self.first_day_of_next(),
        }
    }

    pub fn days(&self) -> u32 {
        days_in_month(self.year(), self.month())
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> BillingResult<Self> {
        if end <= start {
            return Err(BillingError::Validation(
                "date window end must be after start".into(),
            ));
        }
        Ok(Self { start, end })
    }

    /// Window covering an inclusive date range, open-ended when `last` is `None`.
    pub fn active_between(first: NaiveDate, last: Option<NaiveDate>) -> Option<Self> {
        let end = match last {
            Some(last) if last < first => return None,
            Some(last) => last.succ_opt().unwrap_or(NaiveDate::MAX),
            None => NaiveDate::MAX,
        };
        Some(Self { start: first, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn overlaps(&self, other: &DateWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn intersect(&self, other: &DateWindow) -> Option<DateWindow> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(DateWindow { start, end })
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |date| *date < end)
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    match NaiveDate::from_ymd_opt(next_year, next_month, 1) {
        Some(first_next) => (first_next - Duration::days(1)).day(),
        None => 31,
    }
}

/// Counts how many days of the given month fall on `day`. Never looks outside the month.
pub fn count_occurrences(year: i32, month: u32, day: DayOfWeek) -> u32 {
    (1..=days_in_month(year, month))
        .filter_map(|dom| NaiveDate::from_ymd_opt(year, month, dom))
        .filter(|date| DayOfWeek::of(*date) == day)
        .count() as u32
}

/// Every date inside `window` that falls on `day`, in order.
pub fn occurrence_dates(window: &DateWindow, day: DayOfWeek) -> Vec<NaiveDate> {
    window
        .dates()
        .filter(|date| DayOfWeek::of(*date) == day)
        .collect()
}
