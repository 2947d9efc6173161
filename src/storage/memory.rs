//! In-memory store, used by tests and by callers that persist elsewhere.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use super::{
    BookingAdmin, BookingRepository, BookingTables, LedgerStore, LedgerTables, LedgerWork,
    LedgerWrite,
};
use crate::calendar::{BillingPeriod, DateWindow};
use crate::domain::{
    Customer, OneOffCharge, PaymentMethod, PaymentTransaction, PeriodKey, PeriodSummary,
    RecurringCommitment, SlotPaymentRecord,
};
use crate::errors::BillingResult;

/// Bookings and ledger sit behind separate locks so a ledger unit of work can read bookings
/// while it holds the ledger lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bookings: RwLock<BookingTables>,
    ledger: Mutex<LedgerTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(bookings: BookingTables, ledger: LedgerTables) -> Self {
        Self {
            bookings: RwLock::new(bookings),
            ledger: Mutex::new(ledger),
        }
    }

    pub fn ledger_snapshot(&self) -> LedgerTables {
        self.ledger.lock().clone()
    }
}

impl BookingAdmin for MemoryStore {
    fn update_bookings<T>(
        &self,
        change: impl FnOnce(&mut BookingTables) -> BillingResult<T>,
    ) -> BillingResult<T> {
        let mut bookings = self.bookings.write();
        let mut staged = bookings.clone();
        let value = change(&mut staged)?;
        *bookings = staged;
        Ok(value)
    }
}

impl BookingRepository for MemoryStore {
    fn customer(&self, id: Uuid) -> BillingResult<Option<Customer>> {
        Ok(self.bookings.read().customer(id).cloned())
    }

    fn one_off_charges(
        &self,
        customer_id: Uuid,
        window: &DateWindow,
    ) -> BillingResult<Vec<OneOffCharge>> {
        Ok(self.bookings.read().charges_for(customer_id, window))
    }

    fn recurring_commitments(&self, customer_id: Uuid) -> BillingResult<Vec<RecurringCommitment>> {
        Ok(self.bookings.read().commitments_for(customer_id))
    }

    fn recurring_commitment(&self, id: Uuid) -> BillingResult<Option<RecurringCommitment>> {
        Ok(self.bookings.read().commitment(id).cloned())
    }
}

impl LedgerStore for MemoryStore {
    fn period_summary(&self, key: &PeriodKey) -> BillingResult<Option<PeriodSummary>> {
        Ok(self.ledger.lock().summary(key).cloned())
    }

    fn period_transactions(&self, key: &PeriodKey) -> BillingResult<Vec<PaymentTransaction>> {
        Ok(self.ledger.lock().transactions_for(key))
    }

    fn find_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> BillingResult<Option<(PeriodSummary, PaymentTransaction)>> {
        Ok(self.ledger.lock().by_idempotency_key(idempotency_key))
    }

    fn transact(&self, key: &PeriodKey, work: &mut LedgerWork<'_>) -> BillingResult<LedgerWrite> {
        let mut ledger = self.ledger.lock();
        let write = work(ledger.summary(key))?;
        ledger.apply(key, &write)?;
        Ok(write)
    }

    fn slot_record(
        &self,
        slot_id: Uuid,
        period: BillingPeriod,
    ) -> BillingResult<Option<SlotPaymentRecord>> {
        Ok(self.ledger.lock().slot_record(slot_id, period).cloned())
    }

    fn insert_slot_record(&self, record: SlotPaymentRecord) -> BillingResult<bool> {
        Ok(self.ledger.lock().insert_slot_record(record))
    }

    fn mark_slot_record_paid(
        &self,
        slot_id: Uuid,
        period: BillingPeriod,
        method: PaymentMethod,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> BillingResult<SlotPaymentRecord> {
        self.ledger
            .lock()
            .mark_slot_record_paid(slot_id, period, method, notes, at)
    }
}
