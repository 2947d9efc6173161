//! Per-slot monthly payment records. A derived view; the aggregated ledger stays authoritative.

use uuid::Uuid;

use super::due_service::DueService;
use crate::calendar::BillingPeriod;
use crate::core::time::Clock;
use crate::domain::{
    DisplayStatus, PaymentMethod, RecurringCommitment, SlotPaymentRecord, SlotRecordStatus,
};
use crate::errors::{BillingError, BillingResult};
use crate::pricing::RateTable;
use crate::storage::{BookingRepository, LedgerStore};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnsureReport {
    pub created: Vec<SlotPaymentRecord>,
    /// Slots that already had a record for the period.
    pub existing: Vec<Uuid>,
    /// Slots with no billable session in the period.
    pub not_billable: Vec<Uuid>,
}

/// A slot's record for a period, if any, with the status to display.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotStatus {
    pub slot_id: Uuid,
    pub period: BillingPeriod,
    pub record: Option<SlotPaymentRecord>,
    pub display: DisplayStatus,
}

pub struct SlotRecordService<'a> {
    bookings: &'a dyn BookingRepository,
    ledger: &'a dyn LedgerStore,
    rates: &'a RateTable,
    clock: &'a dyn Clock,
}

impl<'a> SlotRecordService<'a> {
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

    /// Creates a pending record for every listed slot that lacks one. Safe to repeat.
    ///
    /// Every id is resolved before anything is written, so an unknown slot fails the whole call.
    pub fn ensure_records(
        &self,
        slot_ids: &[Uuid],
        period: BillingPeriod,
    ) -> BillingResult<EnsureReport> {
        let commitments = slot_ids
            .iter()
            .map(|&slot_id| self.commitment(slot_id))
            .collect::<BillingResult<Vec<_>>>()?;

        let mut report = EnsureReport::default();
        for commitment in commitments {
            let slot_id = commitment.id;
            if self.ledger.slot_record(slot_id, period)?.is_some() {
                report.existing.push(slot_id);
                continue;
            }
            let Some(component) = DueService::slot_component(&commitment, period, self.rates)?
            else {
                report.not_billable.push(slot_id);
                continue;
            };
            let record = SlotPaymentRecord::pending(
                slot_id,
                period,
                component.amount(),
                component.sessions(),
                self.clock.now(),
            );
            if self.ledger.insert_slot_record(record.clone())? {
                report.created.push(record);
            } else {
                tracing::warn!(slot = %slot_id, %period, "slot record created concurrently, keeping existing");
                report.existing.push(slot_id);
            }
        }
        tracing::debug!(
            %period,
            created = report.created.len(),
            existing = report.existing.len(),
            "ensured slot payment records"
        );
        Ok(report)
    }

    pub fn derive_status(&self, raw: SlotRecordStatus, record_period: BillingPeriod) -> DisplayStatus {
        DisplayStatus::derive(raw, record_period, self.clock.current_period())
    }

    /// A slot with no record yet is shown as if its record were pending.
    /// Unknown slots are `NotFound`.
    pub fn slot_status(&self, slot_id: Uuid, period: BillingPeriod) -> BillingResult<SlotStatus> {
        self.commitment(slot_id)?;
        let record = self.ledger.slot_record(slot_id, period)?;
        let raw = record
            .as_ref()
            .map(|record| record.status)
            .unwrap_or(SlotRecordStatus::Pending);
        Ok(SlotStatus {
            slot_id,
            period,
            display: self.derive_status(raw, period),
            record,
        })
    }

    pub fn mark_slot_paid(
        &self,
        slot_id: Uuid,
        period: BillingPeriod,
        method: PaymentMethod,
        notes: Option<String>,
    ) -> BillingResult<SlotPaymentRecord> {
        let record =
            self.ledger
                .mark_slot_record_paid(slot_id, period, method, notes, self.clock.now())?;
        tracing::info!(slot = %slot_id, %period, amount = %record.amount, "slot marked paid");
        Ok(record)
    }

    fn commitment(&self, slot_id: Uuid) -> BillingResult<RecurringCommitment> {
        self.bookings
            .recurring_commitment(slot_id)?
            .ok_or_else(|| BillingError::NotFound(format!("recurring slot {slot_id}")))
    }
}
