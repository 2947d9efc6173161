use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payment::PaymentMethod;
use crate::calendar::BillingPeriod;
use crate::errors::{BillingError, BillingResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SlotRecordStatus {
    #[default]
    Pending,
    Paid,
}

/// Status shown to users for a slot (or slot group) in a period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DisplayStatus {
    Paid,
    Unpaid,
    Overdue,
    Partial,
}

impl DisplayStatus {
    /// Unpaid records from periods before `current` are overdue.
    pub fn derive(
        raw: SlotRecordStatus,
        record_period: BillingPeriod,
        current: BillingPeriod,
    ) -> DisplayStatus {
        match raw {
            SlotRecordStatus::Paid => DisplayStatus::Paid,
            SlotRecordStatus::Pending if record_period < current => DisplayStatus::Overdue,
            SlotRecordStatus::Pending => DisplayStatus::Unpaid,
        }
    }
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DisplayStatus::Paid => "paid",
            DisplayStatus::Unpaid => "unpaid",
            DisplayStatus::Overdue => "overdue",
            DisplayStatus::Partial => "partial",
        };
        f.write_str(label)
    }
}

/// Monthly payment record for one recurring slot. Unique per (slot, period).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotPaymentRecord {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub period: BillingPeriod,
    pub amount: Decimal,
    pub sessions_count: u32,
    pub status: SlotRecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SlotPaymentRecord {
    pub fn pending(
        slot_id: Uuid,
        period: BillingPeriod,
        amount: Decimal,
        sessions_count: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            slot_id,
            period,
            amount,
            sessions_count,
            status: SlotRecordStatus::Pending,
            paid_at: None,
            payment_method: None,
            notes: None,
            created_at,
        }
    }

    /// Pending to paid, exactly once.
    pub fn mark_paid(
        &mut self,
        method: PaymentMethod,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> BillingResult<()> {
        if self.status == SlotRecordStatus::Paid {
            return Err(BillingError::Conflict(format!(
                "slot {} is already paid for {}",
                self.slot_id, self.period
            )));
        }
        self.status = SlotRecordStatus::Paid;
        self.paid_at = Some(at);
        self.payment_method = Some(method);
        self.notes = notes;
        Ok(())
    }

    pub fn display_status(&self, current: BillingPeriod) -> DisplayStatus {
        DisplayStatus::derive(self.status, self.period, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(y: i32, m: u32) -> BillingPeriod {
        BillingPeriod::new(y, m).unwrap()
    }

    #[test]
    fn pending_records_become_overdue_once_the_period_passes() {
        let now = period(2026, 3);
        assert_eq!(
            DisplayStatus::derive(SlotRecordStatus::Pending, period(2026, 2), now),
            DisplayStatus::Overdue
        );
        assert_eq!(
            DisplayStatus::derive(SlotRecordStatus::Pending, period(2026, 3), now),
            DisplayStatus::Unpaid
        );
        assert_eq!(
            DisplayStatus::derive(SlotRecordStatus::Pending, period(2026, 4), now),
            DisplayStatus::Unpaid
        );
        assert_eq!(
            DisplayStatus::derive(SlotRecordStatus::Paid, period(2025, 1), now),
            DisplayStatus::Paid
        );
    }

    #[test]
    fn records_cannot_be_paid_twice() {
        let mut record =
            SlotPaymentRecord::pending(Uuid::new_v4(), period(2026, 2), Decimal::from(480), 4, Utc::now());
        record
            .mark_paid(PaymentMethod::Cash, None, Utc::now())
            .expect("first payment");
        let err = record
            .mark_paid(PaymentMethod::Card, Some("again".into()), Utc::now())
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(record.payment_method, Some(PaymentMethod::Cash));
    }
}
