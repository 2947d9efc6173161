use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use super::{
    BookingAdmin, BookingRepository, BookingTables, LedgerStore, LedgerTables, LedgerWork,
    LedgerWrite, CURRENT_SCHEMA_VERSION,
};
use crate::calendar::{BillingPeriod, DateWindow};
use crate::domain::{
    Customer, OneOffCharge, PaymentMethod, PaymentTransaction, PeriodKey, PeriodSummary,
    RecurringCommitment, SlotPaymentRecord,
};
use crate::errors::{BillingError, BillingResult};

const BOOKINGS_FILE: &str = "bookings.json";
const LEDGER_FILE: &str = "ledger.json";
const TMP_SUFFIX: &str = "tmp";

/// File-backed store. Every write is applied to a staged copy, written to disk atomically,
/// and only then swapped in, so a failed write leaves both memory and disk unchanged.
#[derive(Debug)]
pub struct JsonStore {
    root: PathBuf,
    bookings_path: PathBuf,
    ledger_path: PathBuf,
    bookings: RwLock<BookingTables>,
    ledger: Mutex<LedgerTables>,
}

impl JsonStore {
    pub fn open(root: impl Into<PathBuf>) -> BillingResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let bookings_path = root.join(BOOKINGS_FILE);
        let ledger_path = root.join(LEDGER_FILE);
        let bookings: BookingTables = load_or_default(&bookings_path)?;
        let ledger: LedgerTables = load_or_default(&ledger_path)?;
        ensure_schema_support(&bookings_path, bookings.schema_version)?;
        ensure_schema_support(&ledger_path, ledger.schema_version)?;
        tracing::debug!(
            root = %root.display(),
            summaries = ledger.summaries.len(),
            transactions = ledger.transactions.len(),
            "opened json billing store"
        );
        Ok(Self {
            root,
            bookings_path,
            ledger_path,
            bookings: RwLock::new(bookings),
            ledger: Mutex::new(ledger),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.root
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    fn stage_ledger<T>(
        &self,
        change: impl FnOnce(&mut LedgerTables) -> BillingResult<T>,
    ) -> BillingResult<T> {
        let mut ledger = self.ledger.lock();
        let mut staged = ledger.clone();
        let value = change(&mut staged)?;
        write_json(&self.ledger_path, &staged)?;
        *ledger = staged;
        Ok(value)
    }
}

impl BookingAdmin for JsonStore {
    fn update_bookings<T>(
        &self,
        change: impl FnOnce(&mut BookingTables) -> BillingResult<T>,
    ) -> BillingResult<T> {
        let mut bookings = self.bookings.write();
        let mut staged = bookings.clone();
        let value = change(&mut staged)?;
        write_json(&self.bookings_path, &staged)?;
        *bookings = staged;
        Ok(value)
    }
}

impl BookingRepository for JsonStore {
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

impl LedgerStore for JsonStore {
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
        self.stage_ledger(|staged| {
            let write = work(staged.summary(key))?;
            staged.apply(key, &write)?;
            Ok(write)
        })
    }

    fn slot_record(
        &self,
        slot_id: Uuid,
        period: BillingPeriod,
    ) -> BillingResult<Option<SlotPaymentRecord>> {
        Ok(self.ledger.lock().slot_record(slot_id, period).cloned())
    }

    fn insert_slot_record(&self, record: SlotPaymentRecord) -> BillingResult<bool> {
        {
            let ledger = self.ledger.lock();
            if ledger.slot_record(record.slot_id, record.period).is_some() {
                return Ok(false);
            }
        }
        self.stage_ledger(|staged| Ok(staged.insert_slot_record(record)))
    }

    fn mark_slot_record_paid(
        &self,
        slot_id: Uuid,
        period: BillingPeriod,
        method: PaymentMethod,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> BillingResult<SlotPaymentRecord> {
        self.stage_ledger(|staged| staged.mark_slot_record_paid(slot_id, period, method, notes, at))
    }
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> BillingResult<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn ensure_schema_support(path: &Path, version: u8) -> BillingResult<()> {
    if version > CURRENT_SCHEMA_VERSION {
        return Err(BillingError::Storage(format!(
            "`{}` is from a newer schema version ({version})",
            path.display()
        )));
    }
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> BillingResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = tmp_path(path);
    write_atomic(&tmp, &json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> BillingResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.sync_all()?;
    Ok(())
}
