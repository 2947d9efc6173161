//! Payment recording against per-period summaries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::due_service::DueService;
use crate::calendar::BillingPeriod;
use crate::core::time::Clock;
use crate::domain::{
    PaymentMethod, PaymentStatus, PaymentTransaction, PeriodKey, PeriodSummary,
};
use crate::errors::{BillingError, BillingResult};
use crate::pricing::RateTable;
use crate::storage::{BookingRepository, LedgerStore, LedgerWrite};

/// A single payment to record.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub customer_id: Uuid,
    pub period: BillingPeriod,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
    pub recorded_by: String,
}

impl PaymentRequest {
    pub fn new(
        customer_id: Uuid,
        period: BillingPeriod,
        amount: Decimal,
        method: PaymentMethod,
        recorded_by: impl Into<String>,
    ) -> Self {
        Self {
            customer_id,
            period,
            amount,
            method,
            reference: None,
            notes: None,
            idempotency_key: None,
            recorded_by: recorded_by.into(),
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    fn key(&self) -> PeriodKey {
        PeriodKey::new(self.customer_id, self.period)
    }

    fn validate(&self) -> BillingResult<()> {
        if self.customer_id.is_nil() {
            return Err(BillingError::Validation("customer id is required".into()));
        }
        if self.recorded_by.trim().is_empty() {
            return Err(BillingError::Validation("recorded_by is required".into()));
        }
        if matches!(self.idempotency_key.as_deref(), Some(key) if key.trim().is_empty()) {
            return Err(BillingError::Validation(
                "idempotency key must not be blank".into(),
            ));
        }
        validate_amount(self.amount)
    }
}

/// Settles the outstanding balance of several customers for one period.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRequest {
    pub customer_ids: Vec<Uuid>,
    pub period: BillingPeriod,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: String,
}

/// Result of [`PaymentLedgerService::record_payment`].
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub summary: PeriodSummary,
    pub transaction: PaymentTransaction,
    /// Set when the idempotency key matched an earlier payment and nothing was written.
    pub replayed: bool,
}

#[derive(Debug)]
pub enum BulkStatus {
    Paid {
        summary: PeriodSummary,
        transaction: PaymentTransaction,
    },
    Skipped {
        summary: PeriodSummary,
    },
    Failed {
        error: BillingError,
    },
}

#[derive(Debug)]
pub struct BulkOutcome {
    pub customer_id: Uuid,
    pub status: BulkStatus,
}

impl BulkOutcome {
    pub fn is_paid(&self) -> bool {
        matches!(self.status, BulkStatus::Paid { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, BulkStatus::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, BulkStatus::Failed { .. })
    }
}

/// Due versus paid for one customer and period, with the status derived from the fresh due.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOverview {
    pub customer_id: Uuid,
    pub period: BillingPeriod,
    pub total_due: Decimal,
    pub total_paid: Decimal,
    pub unpaid_amount: Decimal,
    pub status: PaymentStatus,
    pub sessions_count: u32,
    pub total_hours: Decimal,
    pub marked_paid_at: Option<DateTime<Utc>>,
    pub transactions: Vec<PaymentTransaction>,
}

/// Records payments as one read-recompute-write unit per (customer, period).
pub struct PaymentLedgerService<'a> {
    bookings: &'a dyn BookingRepository,
    ledger: &'a dyn LedgerStore,
    rates: &'a RateTable,
    clock: &'a dyn Clock,
}

impl<'a> PaymentLedgerService<'a> {
    pub fn new(
        bookings: &'a dyn BookingRepository,
        ledger: &'a dyn LedgerStore,
        rates: &'a RateTable,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            bookings,
            ledger,
            rates,
            clock,
        }
    }

    pub fn record_payment(&self, request: PaymentRequest) -> BillingResult<PaymentReceipt> {
        request.validate()?;
        let key = request.key();

        if let Some(idempotency_key) = request.idempotency_key.as_deref() {
            if let Some(receipt) = self.replay(idempotency_key, &key)? {
                return Ok(receipt);
            }
        }

        let now = self.clock.now();
        let mut work = |current: Option<&PeriodSummary>| -> BillingResult<LedgerWrite> {
            let due = DueService::compute_due(self.bookings, self.rates, key.customer_id, key.period)?;
            let mut summary = current
                .cloned()
                .unwrap_or_else(|| PeriodSummary::new(key, now));
            summary.refresh_due(due.total_due, due.bookings_count, due.total_hours);
            summary.apply_payment(request.amount, &request.recorded_by, now);
            let transaction = PaymentTransaction {
                id: Uuid::new_v4(),
                customer_id: key.customer_id,
                period: key.period,
                amount: request.amount,
                method: request.method.clone(),
                reference: request.reference.clone(),
                notes: request.notes.clone(),
                recorded_by: request.recorded_by.clone(),
                recorded_at: now,
                idempotency_key: request.idempotency_key.clone(),
            };
            Ok(LedgerWrite::Append {
                summary,
                transaction,
            })
        };

        match self.ledger.transact(&key, &mut work) {
            Ok(LedgerWrite::Append {
                summary,
                transaction,
            }) => {
                tracing::info!(
                    customer = %key.customer_id,
                    period = %key.period,
                    amount = %transaction.amount,
                    status = %summary.status,
                    "recorded payment"
                );
                Ok(PaymentReceipt {
                    summary,
                    transaction,
                    replayed: false,
                })
            }
            Ok(LedgerWrite::Skip) => Err(BillingError::Storage(format!(
                "payment for {key} was not applied"
            ))),
            Err(err) if err.is_conflict() => {
                // A concurrent request with the same key won the race.
                let replayed = match request.idempotency_key.as_deref() {
                    Some(idempotency_key) => self.replay(idempotency_key, &key)?,
                    None => None,
                };
                replayed.ok_or(err)
            }
            Err(err) => Err(err),
        }
    }

    fn replay(&self, idempotency_key: &str, key: &PeriodKey) -> BillingResult<Option<PaymentReceipt>> {
        let Some((summary, transaction)) = self.ledger.find_by_idempotency_key(idempotency_key)?
        else {
            return Ok(None);
        };
        if transaction.key() != *key {
            return Err(BillingError::Conflict(format!(
                "idempotency key `{idempotency_key}` belongs to {}",
                transaction.key()
            )));
        }
        tracing::debug!(%key, idempotency_key, "replayed idempotent payment");
        Ok(Some(PaymentReceipt {
            summary,
            transaction,
            replayed: true,
        }))
    }

    /// Pays off every listed customer's remaining balance. Each customer is its own unit of work
    /// and a failure is reported in the outcome instead of aborting the batch.
    pub fn bulk_mark_paid(&self, request: &BulkRequest, default_note: &str) -> Vec<BulkOutcome> {
        let outcomes: Vec<BulkOutcome> = request
            .customer_ids
            .iter()
            .map(|&customer_id| {
                let status = match self.settle_customer(customer_id, request, default_note) {
                    Ok(status) => status,
                    Err(error) => {
                        tracing::warn!(
                            customer = %customer_id,
                            period = %request.period,
                            %error,
                            "bulk settlement failed for customer"
                        );
                        BulkStatus::Failed { error }
                    }
                };
                BulkOutcome {
                    customer_id,
                    status,
                }
            })
            .collect();

        tracing::info!(
            period = %request.period,
            paid = outcomes.iter().filter(|outcome| outcome.is_paid()).count(),
            skipped = outcomes.iter().filter(|outcome| outcome.is_skipped()).count(),
            failed = outcomes.iter().filter(|outcome| outcome.is_failed()).count(),
            "bulk mark paid finished"
        );
        outcomes
    }

    fn settle_customer(
        &self,
        customer_id: Uuid,
        request: &BulkRequest,
        default_note: &str,
    ) -> BillingResult<BulkStatus> {
        if request.recorded_by.trim().is_empty() {
            return Err(BillingError::Validation("recorded_by is required".into()));
        }
        let key = PeriodKey::new(customer_id, request.period);
        let now = self.clock.now();
        let notes = request
            .notes
            .clone()
            .filter(|note| !note.trim().is_empty())
            .unwrap_or_else(|| default_note.to_string());

        let mut settled = None;
        let mut work = |current: Option<&PeriodSummary>| -> BillingResult<LedgerWrite> {
            let due = DueService::compute_due(self.bookings, self.rates, customer_id, request.period)?;
            let mut summary = current
                .cloned()
                .unwrap_or_else(|| PeriodSummary::new(key, now));
            summary.refresh_due(due.total_due, due.bookings_count, due.total_hours);
            let remaining = summary.total_amount_due - summary.total_amount_paid;
            if remaining <= Decimal::ZERO {
                settled = Some(summary);
                return Ok(LedgerWrite::Skip);
            }
            summary.apply_payment(remaining, &request.recorded_by, now);
            let transaction = PaymentTransaction {
                id: Uuid::new_v4(),
                customer_id,
                period: request.period,
                amount: remaining,
                method: request.method.clone(),
                reference: request.reference.clone(),
                notes: Some(notes.clone()),
                recorded_by: request.recorded_by.clone(),
                recorded_at: now,
                idempotency_key: None,
            };
            Ok(LedgerWrite::Append {
                summary,
                transaction,
            })
        };

        let write = self.ledger.transact(&key, &mut work)?;
        match write {
            LedgerWrite::Append {
                summary,
                transaction,
            } => Ok(BulkStatus::Paid {
                summary,
                transaction,
            }),
            LedgerWrite::Skip => {
                let summary = settled.ok_or_else(|| {
                    BillingError::Storage(format!("settlement of {key} produced no summary"))
                })?;
                tracing::debug!(%key, "period already settled, skipping");
                Ok(BulkStatus::Skipped { summary })
            }
        }
    }

    /// Fresh due combined with the stored payments. Nothing is written.
    pub fn payment_overview(
        &self,
        customer_id: Uuid,
        period: BillingPeriod,
    ) -> BillingResult<PaymentOverview> {
        let key = PeriodKey::new(customer_id, period);
        let due = DueService::compute_due(self.bookings, self.rates, customer_id, period)?;
        let stored = self.ledger.period_summary(&key)?;
        let transactions = self.ledger.period_transactions(&key)?;
        let total_paid = stored
            .as_ref()
            .map(|summary| summary.total_amount_paid)
            .unwrap_or(Decimal::ZERO);

        Ok(PaymentOverview {
            customer_id,
            period,
            total_due: due.total_due,
            total_paid,
            unpaid_amount: (due.total_due - total_paid).max(Decimal::ZERO),
            status: PaymentStatus::derive(due.total_due, total_paid),
            sessions_count: due.bookings_count,
            total_hours: due.total_hours,
            marked_paid_at: stored.and_then(|summary| summary.marked_paid_at),
            transactions,
        })
    }
}

/// Payments must be positive whole cents.
fn validate_amount(amount: Decimal) -> BillingResult<()> {
    if amount <= Decimal::ZERO || amount.normalize().scale() > 2 {
        return Err(BillingError::InvalidAmount(amount));
    }
    Ok(())
}
