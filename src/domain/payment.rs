use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::Identifiable;
use crate::calendar::BillingPeriod;

/// Identifies the single summary row a customer has for a period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodKey {
    pub customer_id: Uuid,
    pub period: BillingPeriod,
}

impl PeriodKey {
    pub fn new(customer_id: Uuid, period: BillingPeriod) -> Self {
        Self {
            customer_id,
            period,
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.customer_id, self.period)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    /// Paid needs a positive due fully covered; any smaller positive payment is partial.
    pub fn derive(total_due: Decimal, total_paid: Decimal) -> PaymentStatus {
        if total_due > Decimal::ZERO && total_paid >= total_due {
            PaymentStatus::Paid
        } else if total_paid > Decimal::ZERO && total_paid < total_due {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Unpaid
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    OnlineBanking,
    EWallet,
    Other(String),
}

/// Per customer, per period payment state. Created lazily by the first payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodSummary {
    pub customer_id: Uuid,
    pub period: BillingPeriod,
    pub total_amount_due: Decimal,
    pub total_amount_paid: Decimal,
    pub sessions_count: u32,
    pub total_hours: Decimal,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marked_paid_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marked_paid_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PeriodSummary {
    pub fn new(key: PeriodKey, now: DateTime<Utc>) -> Self {
        Self {
            customer_id: key.customer_id,
            period: key.period,
            total_amount_due: Decimal::ZERO,
            total_amount_paid: Decimal::ZERO,
            sessions_count: 0,
            total_hours: Decimal::ZERO,
            status: PaymentStatus::Unpaid,
            marked_paid_by: None,
            marked_paid_at: None,
            updated_at: now,
        }
    }

    pub fn key(&self) -> PeriodKey {
        PeriodKey::new(self.customer_id, self.period)
    }

    /// Replaces the due snapshot with a fresh recompute and re-derives the status.
    pub fn refresh_due(&mut self, total_due: Decimal, sessions_count: u32, total_hours: Decimal) {
        self.total_amount_due = total_due;
        self.sessions_count = sessions_count;
        self.total_hours = total_hours;
        self.status = PaymentStatus::derive(self.total_amount_due, self.total_amount_paid);
    }

    /// Adds `amount` to the paid total. The paid stamp is only written on the transition into
    /// `Paid` and is never cleared afterwards.
    pub fn apply_payment(&mut self, amount: Decimal, recorded_by: &str, at: DateTime<Utc>) {
        let previous = PaymentStatus::derive(self.total_amount_due, self.total_amount_paid);
        self.total_amount_paid += amount;
        self.status = PaymentStatus::derive(self.total_amount_due, self.total_amount_paid);
        if self.status == PaymentStatus::Paid && previous != PaymentStatus::Paid {
            self.marked_paid_by = Some(recorded_by.to_string());
            self.marked_paid_at = Some(at);
        }
        self.updated_at = at;
    }

    pub fn unpaid_amount(&self) -> Decimal {
        (self.total_amount_due - self.total_amount_paid).max(Decimal::ZERO)
    }
}

/// Append-only payment row attached to one [`PeriodSummary`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub period: BillingPeriod,
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub recorded_by: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl PaymentTransaction {
    pub fn key(&self) -> PeriodKey {
        PeriodKey::new(self.customer_id, self.period)
    }
}

impl Identifiable for PaymentTransaction {
    fn id(&self) -> Uuid {
        self.id
    }
}
