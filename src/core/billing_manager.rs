use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use crate::calendar::BillingPeriod;
use crate::config::BillingConfig;
use crate::core::services::{
    BreakdownService, BulkOutcome, BulkRequest, DueService, DueSummary, EnsureReport, LineItem,
    PaymentLedgerService, PaymentOverview, PaymentReceipt, PaymentRequest, SlotGroup,
    SlotGroupService, SlotRecordService, SlotStatus,
};
use crate::core::time::{Clock, SystemClock};
use crate::domain::{DisplayStatus, PaymentMethod, SlotPaymentRecord};
use crate::errors::BillingResult;
use crate::storage::{BookingRepository, JsonStore, LedgerStore};

/// Facade over the billing services, wired to a booking source, a ledger store, and a clock.
pub struct BillingManager {
    bookings: Arc<dyn BookingRepository>,
    ledger: Arc<dyn LedgerStore>,
    config: BillingConfig,
    clock: Box<dyn Clock>,
}

impl BillingManager {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        ledger: Arc<dyn LedgerStore>,
        config: BillingConfig,
    ) -> Self {
        Self {
            bookings,
            ledger,
            config,
            clock: Box::new(SystemClock),
        }
    }

    /// Uses one store for both bookings and the ledger.
    pub fn from_store<S>(store: Arc<S>, config: BillingConfig) -> Self
    where
        S: BookingRepository + LedgerStore + 'static,
    {
        Self::new(store.clone(), store, config)
    }

    /// Opens (or creates) a JSON store under `dir`.
    pub fn open_json(dir: &Path, config: BillingConfig) -> BillingResult<Self> {
        config.rates.validate()?;
        let store = Arc::new(JsonStore::open(dir)?);
        Ok(Self::from_store(store, config))
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn current_period(&self) -> BillingPeriod {
        self.clock.current_period()
    }

    fn ledger_service(&self) -> PaymentLedgerService<'_> {
        PaymentLedgerService::new(
            self.bookings.as_ref(),
            self.ledger.as_ref(),
            &self.config.rates,
            self.clock.as_ref(),
        )
    }

    fn slot_records(&self) -> SlotRecordService<'_> {
        SlotRecordService::new(
            self.bookings.as_ref(),
            self.ledger.as_ref(),
            &self.config.rates,
            self.clock.as_ref(),
        )
    }

    pub fn get_due(&self, customer_id: Uuid, period: BillingPeriod) -> BillingResult<DueSummary> {
        DueService::compute_due(self.bookings.as_ref(), &self.config.rates, customer_id, period)
    }

    pub fn get_breakdown(
        &self,
        customer_id: Uuid,
        period: BillingPeriod,
    ) -> BillingResult<Vec<LineItem>> {
        let due = self.get_due(customer_id, period)?;
        Ok(BreakdownService::breakdown(&due))
    }

    pub fn record_payment(&self, request: PaymentRequest) -> BillingResult<PaymentReceipt> {
        self.ledger_service().record_payment(request)
    }

    /// Uses the configured default note when the request carries none.
    pub fn bulk_mark_paid(&self, request: &BulkRequest) -> Vec<BulkOutcome> {
        self.ledger_service()
            .bulk_mark_paid(request, &self.config.default_bulk_note)
    }

    pub fn payment_overview(
        &self,
        customer_id: Uuid,
        period: BillingPeriod,
    ) -> BillingResult<PaymentOverview> {
        self.ledger_service().payment_overview(customer_id, period)
    }

    pub fn ensure_slot_records(
        &self,
        slot_ids: &[Uuid],
        period: BillingPeriod,
    ) -> BillingResult<EnsureReport> {
        self.slot_records().ensure_records(slot_ids, period)
    }

    pub fn get_slot_status(&self, slot_id: Uuid, period: BillingPeriod) -> BillingResult<SlotStatus> {
        self.slot_records().slot_status(slot_id, period)
    }

    pub fn mark_slot_paid(
        &self,
        slot_id: Uuid,
        period: BillingPeriod,
        method: PaymentMethod,
        notes: Option<String>,
    ) -> BillingResult<SlotPaymentRecord> {
        self.slot_records()
            .mark_slot_paid(slot_id, period, method, notes)
    }

    pub fn group_slots(&self, customer_id: Uuid) -> BillingResult<Vec<SlotGroup>> {
        let rows = self.bookings.recurring_commitments(customer_id)?;
        SlotGroupService::group_slots(&rows, &self.config.rates)
    }

    pub fn group_status(
        &self,
        group: &SlotGroup,
        period: BillingPeriod,
    ) -> BillingResult<Option<DisplayStatus>> {
        let mut records = Vec::with_capacity(group.member_slot_ids.len());
        for &slot_id in &group.member_slot_ids {
            if let Some(record) = self.ledger.slot_record(slot_id, period)? {
                records.push(record);
            }
        }
        Ok(SlotGroupService::group_status(
            group,
            &records,
            period,
            self.current_period(),
        ))
    }
}
