use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::Identifiable;
use crate::calendar::{BillingPeriod, DateWindow, DayOfWeek};
use crate::errors::BillingResult;
use crate::pricing::{self, TimeOfDay};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Customer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: None,
        }
    }
}

impl Identifiable for Customer {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum BookingStatus {
    #[default]
    Confirmed,
    Pending,
    Cancelled,
}

/// A single non-recurring booking, priced by the booking subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OneOffCharge {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub court: String,
    pub sport: String,
    pub amount: Decimal,
    #[serde(default)]
    pub status: BookingStatus,
}

impl OneOffCharge {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        customer_id: Uuid,
        date: NaiveDate,
        start_time: TimeOfDay,
        end_time: TimeOfDay,
        court: impl Into<String>,
        sport: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            date,
            start_time,
            end_time,
            court: court.into(),
            sport: sport.into(),
            amount,
            status: BookingStatus::Confirmed,
        }
    }

    pub fn is_billable(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }

    pub fn hours(&self) -> BillingResult<Decimal> {
        pricing::hours(self.start_time, self.end_time)
    }
}

impl Identifiable for OneOffCharge {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// A weekly recurring booking. Several rows may describe the same logical slot over time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringCommitment {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub court: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub day_of_week: DayOfWeek,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub sport: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_rate_override: Option<Decimal>,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
}

impl RecurringCommitment {
    pub fn new(
        customer_id: Uuid,
        court: impl Into<String>,
        day_of_week: DayOfWeek,
        start_time: TimeOfDay,
        end_time: TimeOfDay,
        sport: impl Into<String>,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            court: court.into(),
            label: None,
            day_of_week,
            start_time,
            end_time,
            sport: sport.into(),
            hourly_rate_override: None,
            start_date,
            end_date: None,
            is_active: true,
        }
    }

    pub fn with_rate_override(mut self, rate: Decimal) -> Self {
        self.hourly_rate_override = Some(rate);
        self
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn hours(&self) -> BillingResult<Decimal> {
        pricing::hours(self.start_time, self.end_time)
    }

    /// Inclusive `[start_date, end_date]` as a half-open window; `None` if the dates are inverted.
    pub fn active_window(&self) -> Option<DateWindow> {
        DateWindow::active_between(self.start_date, self.end_date)
    }

    /// The part of `period` this commitment bills for, if it is active and overlaps it.
    pub fn billable_window(&self, period: &BillingPeriod) -> Option<DateWindow> {
        if !self.is_active {
            return None;
        }
        self.active_window()?.intersect(&period.window())
    }
}

impl Identifiable for RecurringCommitment {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn monday_slot(start: NaiveDate) -> RecurringCommitment {
        RecurringCommitment::new(
            Uuid::new_v4(),
            "Court 1",
            DayOfWeek::Monday,
            "10:00".parse().unwrap(),
            "11:30".parse().unwrap(),
            "badminton",
            start,
        )
    }

    #[test]
    fn inactive_commitments_bill_nothing() {
        let period = BillingPeriod::new(2026, 2).unwrap();
        let mut slot = monday_slot(date(2026, 1, 1));
        assert!(slot.billable_window(&period).is_some());
        slot.is_active = false;
        assert!(slot.billable_window(&period).is_none());
    }

    #[test]
    fn ended_commitments_do_not_overlap_later_periods() {
        let slot = monday_slot(date(2025, 6, 1)).with_end_date(date(2026, 1, 31));
        assert!(slot
            .billable_window(&BillingPeriod::new(2026, 2).unwrap())
            .is_none());
        assert!(slot
            .billable_window(&BillingPeriod::new(2026, 1).unwrap())
            .is_some());
    }

    #[test]
    fn cancelled_charges_are_not_billable() {
        let mut charge = OneOffCharge::new(
            Uuid::new_v4(),
            date(2026, 2, 3),
            "09:00".parse().unwrap(),
            "10:00".parse().unwrap(),
            "Court 2",
            "badminton",
            Decimal::from(20),
        );
        assert!(charge.is_billable());
        charge.status = BookingStatus::Cancelled;
        assert!(!charge.is_billable());
    }
}
