pub mod json_backend;
pub mod memory;
pub mod tables;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::calendar::{BillingPeriod, DateWindow};
use crate::domain::{
    BookingStatus, Customer, OneOffCharge, PaymentMethod, PaymentTransaction, PeriodKey,
    PeriodSummary, RecurringCommitment, SlotPaymentRecord,
};
use crate::errors::BillingResult;

pub use json_backend::JsonStore;
pub use memory::MemoryStore;
pub use tables::{BookingTables, LedgerTables, LedgerWrite, CURRENT_SCHEMA_VERSION};

/// Read access to the booking subsystem. The billing engine never writes through this.
pub trait BookingRepository: Send + Sync {
    fn customer(&self, id: Uuid) -> BillingResult<Option<Customer>>;
    /// One-off charges for the customer dated inside `window`, cancelled ones included.
    fn one_off_charges(&self, customer_id: Uuid, window: &DateWindow)
        -> BillingResult<Vec<OneOffCharge>>;
    fn recurring_commitments(&self, customer_id: Uuid) -> BillingResult<Vec<RecurringCommitment>>;
    fn recurring_commitment(&self, id: Uuid) -> BillingResult<Option<RecurringCommitment>>;
}

/// Unit of work run by [`LedgerStore::transact`] against the current summary, if any.
pub type LedgerWork<'a> = dyn FnMut(Option<&PeriodSummary>) -> BillingResult<LedgerWrite> + 'a;

/// Persistence for period summaries, their transactions, and per-slot payment records.
pub trait LedgerStore: Send + Sync {
    fn period_summary(&self, key: &PeriodKey) -> BillingResult<Option<PeriodSummary>>;
    fn period_transactions(&self, key: &PeriodKey) -> BillingResult<Vec<PaymentTransaction>>;
    fn find_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> BillingResult<Option<(PeriodSummary, PaymentTransaction)>>;

    /// Runs `work` while holding the ledger write lock and applies its result atomically.
    /// Uniqueness violations (summary key, idempotency key) surface as `Conflict` and leave
    /// the store untouched.
    fn transact(&self, key: &PeriodKey, work: &mut LedgerWork<'_>) -> BillingResult<LedgerWrite>;

    fn slot_record(
        &self,
        slot_id: Uuid,
        period: BillingPeriod,
    ) -> BillingResult<Option<SlotPaymentRecord>>;
    /// Returns `false` when a record for the same (slot, period) already exists.
    fn insert_slot_record(&self, record: SlotPaymentRecord) -> BillingResult<bool>;
    fn mark_slot_record_paid(
        &self,
        slot_id: Uuid,
        period: BillingPeriod,
        method: PaymentMethod,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> BillingResult<SlotPaymentRecord>;
}

/// Write access to booking tables, used to seed stores and by the scheduling side.
pub trait BookingAdmin {
    fn update_bookings<T>(
        &self,
        change: impl FnOnce(&mut BookingTables) -> BillingResult<T>,
    ) -> BillingResult<T>;

    fn add_customer(&self, customer: Customer) -> BillingResult<Uuid> {
        self.update_bookings(|tables| tables.add_customer(customer))
    }

    fn add_one_off_charge(&self, charge: OneOffCharge) -> BillingResult<Uuid> {
        self.update_bookings(|tables| tables.add_one_off_charge(charge))
    }

    fn set_charge_status(&self, id: Uuid, status: BookingStatus) -> BillingResult<()> {
        self.update_bookings(|tables| tables.set_charge_status(id, status))
    }

    fn upsert_commitment(&self, commitment: RecurringCommitment) -> BillingResult<Uuid> {
        self.update_bookings(|tables| tables.upsert_commitment(commitment))
    }
}
