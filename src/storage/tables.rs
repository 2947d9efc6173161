//! In-memory table layouts shared by every backend. Uniqueness rules live here so each
//! backend enforces them identically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::{BillingPeriod, DateWindow};
use crate::domain::{
    find_by_id, find_by_id_mut, BookingStatus, Customer, OneOffCharge, PaymentMethod,
    PaymentTransaction, PeriodKey, PeriodSummary, RecurringCommitment, SlotPaymentRecord,
};
use crate::errors::{BillingError, BillingResult};

pub const CURRENT_SCHEMA_VERSION: u8 = 1;

fn schema_version_default() -> u8 {
    CURRENT_SCHEMA_VERSION
}

/// A write requested by a ledger unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerWrite {
    /// Nothing to apply (e.g. the period is already settled).
    Skip,
    /// Upsert the summary and append the transaction as one unit.
    Append {
        summary: PeriodSummary,
        transaction: PaymentTransaction,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingTables {
    #[serde(default = "schema_version_default")]
    pub schema_version: u8,
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub one_off_charges: Vec<OneOffCharge>,
    #[serde(default)]
    pub recurring_commitments: Vec<RecurringCommitment>,
}

impl Default for BookingTables {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            customers: Vec::new(),
            one_off_charges: Vec::new(),
            recurring_commitments: Vec::new(),
        }
    }
}

impl BookingTables {
    pub fn customer(&self, id: Uuid) -> Option<&Customer> {
        find_by_id(&self.customers, id)
    }

    pub fn charges_for(&self, customer_id: Uuid, window: &DateWindow) -> Vec<OneOffCharge> {
        self.one_off_charges
            .iter()
            .filter(|charge| charge.customer_id == customer_id && window.contains(charge.date))
            .cloned()
            .collect()
    }

    pub fn commitments_for(&self, customer_id: Uuid) -> Vec<RecurringCommitment> {
        self.recurring_commitments
            .iter()
            .filter(|slot| slot.customer_id == customer_id)
            .cloned()
            .collect()
    }

    pub fn commitment(&self, id: Uuid) -> Option<&RecurringCommitment> {
        find_by_id(&self.recurring_commitments, id)
    }

    pub fn add_customer(&mut self, customer: Customer) -> BillingResult<Uuid> {
        if self.customer(customer.id).is_some() {
            return Err(BillingError::Conflict(format!(
                "customer {} already exists",
                customer.id
            )));
        }
        let id = customer.id;
        self.customers.push(customer);
        Ok(id)
    }

    pub fn add_one_off_charge(&mut self, charge: OneOffCharge) -> BillingResult<Uuid> {
        self.require_customer(charge.customer_id)?;
        if find_by_id(&self.one_off_charges, charge.id).is_some() {
            return Err(BillingError::Conflict(format!(
                "booking {} already exists",
                charge.id
            )));
        }
        let id = charge.id;
        self.one_off_charges.push(charge);
        Ok(id)
    }

    pub fn set_charge_status(&mut self, id: Uuid, status: BookingStatus) -> BillingResult<()> {
        let charge = find_by_id_mut(&mut self.one_off_charges, id)
            .ok_or_else(|| BillingError::NotFound(format!("booking {id}")))?;
        charge.status = status;
        Ok(())
    }

    /// Inserts a new commitment or replaces the row with the same id.
    pub fn upsert_commitment(&mut self, commitment: RecurringCommitment) -> BillingResult<Uuid> {
        self.require_customer(commitment.customer_id)?;
        let id = commitment.id;
        match find_by_id_mut(&mut self.recurring_commitments, id) {
            Some(existing) => *existing = commitment,
            None => self.recurring_commitments.push(commitment),
        }
        Ok(id)
    }

    fn require_customer(&self, id: Uuid) -> BillingResult<()> {
        self.customer(id)
            .map(|_| ())
            .ok_or_else(|| BillingError::NotFound(format!("customer {id}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTables {
    #[serde(default = "schema_version_default")]
    pub schema_version: u8,
    #[serde(default)]
    pub summaries: Vec<PeriodSummary>,
    #[serde(default)]
    pub transactions: Vec<PaymentTransaction>,
    #[serde(default)]
    pub slot_records: Vec<SlotPaymentRecord>,
}

impl Default for LedgerTables {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            summaries: Vec::new(),
            transactions: Vec::new(),
            slot_records: Vec::new(),
        }
    }
}

impl LedgerTables {
    pub fn summary(&self, key: &PeriodKey) -> Option<&PeriodSummary> {
        self.summaries.iter().find(|summary| summary.key() == *key)
    }

    pub fn transactions_for(&self, key: &PeriodKey) -> Vec<PaymentTransaction> {
        self.transactions
            .iter()
            .filter(|txn| txn.key() == *key)
            .cloned()
            .collect()
    }

    pub fn by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> Option<(PeriodSummary, PaymentTransaction)> {
        let txn = self
            .transactions
            .iter()
            .find(|txn| txn.idempotency_key.as_deref() == Some(idempotency_key))?;
        let summary = self.summary(&txn.key())?;
        Some((summary.clone(), txn.clone()))
    }

    /// Applies a write all-or-nothing: every check runs before anything is mutated.
    pub fn apply(&mut self, key: &PeriodKey, write: &LedgerWrite) -> BillingResult<()> {
        let LedgerWrite::Append {
            summary,
            transaction,
        } = write
        else {
            return Ok(());
        };
        if summary.key() != *key || transaction.key() != *key {
            return Err(BillingError::Validation(format!(
                "write does not belong to period {key}"
            )));
        }
        if let Some(idempotency_key) = transaction.idempotency_key.as_deref() {
            if self.by_idempotency_key(idempotency_key).is_some() {
                return Err(BillingError::Conflict(format!(
                    "idempotency key `{idempotency_key}` already recorded"
                )));
            }
        }
        if find_by_id(&self.transactions, transaction.id).is_some() {
            return Err(BillingError::Conflict(format!(
                "transaction {} already recorded",
                transaction.id
            )));
        }

        match self.summaries.iter_mut().find(|row| row.key() == *key) {
            Some(existing) => *existing = summary.clone(),
            None => self.summaries.push(summary.clone()),
        }
        self.transactions.push(transaction.clone());
        Ok(())
    }

    pub fn slot_record(&self, slot_id: Uuid, period: BillingPeriod) -> Option<&SlotPaymentRecord> {
        self.slot_records
            .iter()
            .find(|record| record.slot_id == slot_id && record.period == period)
    }

    /// Inserts unless a record for (slot, period) exists. Existing records are never replaced.
    pub fn insert_slot_record(&mut self, record: SlotPaymentRecord) -> bool {
        if self.slot_record(record.slot_id, record.period).is_some() {
            return false;
        }
        self.slot_records.push(record);
        true
    }

    pub fn mark_slot_record_paid(
        &mut self,
        slot_id: Uuid,
        period: BillingPeriod,
        method: PaymentMethod,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> BillingResult<SlotPaymentRecord> {
        let record = self
            .slot_records
            .iter_mut()
            .find(|record| record.slot_id == slot_id && record.period == period)
            .ok_or_else(|| {
                BillingError::NotFound(format!("payment record for slot {slot_id} in {period}"))
            })?;
        record.mark_paid(method, notes, at)?;
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn append(key: PeriodKey, amount: i64, idempotency_key: Option<&str>) -> LedgerWrite {
        let now = Utc::now();
        let mut summary = PeriodSummary::new(key, now);
        summary.refresh_due(Decimal::from(100), 1, Decimal::ONE);
        summary.apply_payment(Decimal::from(amount), "admin", now);
        LedgerWrite::Append {
            summary,
            transaction: PaymentTransaction {
                id: Uuid::new_v4(),
                customer_id: key.customer_id,
                period: key.period,
                amount: Decimal::from(amount),
                method: PaymentMethod::Cash,
                reference: None,
                notes: None,
                recorded_by: "admin".into(),
                recorded_at: now,
                idempotency_key: idempotency_key.map(str::to_string),
            },
        }
    }

    #[test]
    fn duplicate_idempotency_keys_conflict_without_mutation() {
        let key = PeriodKey::new(Uuid::new_v4(), BillingPeriod::new(2026, 2).unwrap());
        let mut tables = LedgerTables::default();
        tables.apply(&key, &append(key, 40, Some("k-1"))).unwrap();
        let err = tables.apply(&key, &append(key, 40, Some("k-1"))).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(tables.transactions.len(), 1);
        assert_eq!(tables.summaries.len(), 1);
    }

    #[test]
    fn summaries_are_upserted_per_period() {
        let key = PeriodKey::new(Uuid::new_v4(), BillingPeriod::new(2026, 2).unwrap());
        let mut tables = LedgerTables::default();
        tables.apply(&key, &append(key, 40, None)).unwrap();
        tables.apply(&key, &append(key, 60, None)).unwrap();
        assert_eq!(tables.summaries.len(), 1);
        assert_eq!(tables.transactions_for(&key).len(), 2);
    }

    #[test]
    fn foreign_writes_are_rejected() {
        let key = PeriodKey::new(Uuid::new_v4(), BillingPeriod::new(2026, 2).unwrap());
        let other = PeriodKey::new(key.customer_id, BillingPeriod::new(2026, 3).unwrap());
        let mut tables = LedgerTables::default();
        let err = tables.apply(&key, &append(other, 40, None)).unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
        assert!(tables.transactions.is_empty());
    }
}
