//! Period due-amount aggregation. Every read and write path derives "what is owed" here.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::calendar::{occurrence_dates, BillingPeriod};
use crate::domain::{OneOffCharge, RecurringCommitment};
use crate::errors::{BillingError, BillingResult};
use crate::pricing::{quote_session, RateTable, SessionQuote};
use crate::storage::BookingRepository;

/// A billable one-off booking inside the period.
#[derive(Debug, Clone, PartialEq)]
pub struct OneOffComponent {
    pub charge: OneOffCharge,
    pub hours: Decimal,
}

/// A recurring commitment's contribution to the period.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringComponent {
    pub commitment: RecurringCommitment,
    pub quote: SessionQuote,
    pub dates: Vec<NaiveDate>,
}

impl RecurringComponent {
    pub fn sessions(&self) -> u32 {
        self.dates.len() as u32
    }

    pub fn amount(&self) -> Decimal {
        self.quote.amount * Decimal::from(self.sessions())
    }

    pub fn hours(&self) -> Decimal {
        self.quote.hours * Decimal::from(self.sessions())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DueSummary {
    pub customer_id: Uuid,
    pub period: BillingPeriod,
    pub total_due: Decimal,
    pub total_hours: Decimal,
    pub bookings_count: u32,
    pub one_off: Vec<OneOffComponent>,
    pub recurring: Vec<RecurringComponent>,
}

impl DueSummary {
    pub fn one_off_total(&self) -> Decimal {
        self.one_off.iter().map(|item| item.charge.amount).sum()
    }

    pub fn recurring_total(&self) -> Decimal {
        self.recurring.iter().map(RecurringComponent::amount).sum()
    }
}

pub struct DueService;

impl DueService {
    /// Recomputes the customer's due for `period` from source bookings. Never cached.
    pub fn compute_due(
        bookings: &dyn BookingRepository,
        rates: &RateTable,
        customer_id: Uuid,
        period: BillingPeriod,
    ) -> BillingResult<DueSummary> {
        if bookings.customer(customer_id)?.is_none() {
            return Err(BillingError::NotFound(format!("customer {customer_id}")));
        }
        let window = period.window();

        let mut one_off = Vec::new();
        for charge in bookings.one_off_charges(customer_id, &window)? {
            if !charge.is_billable() || !window.contains(charge.date) {
                continue;
            }
            let hours = charge.hours()?;
            one_off.push(OneOffComponent { charge, hours });
        }
        one_off.sort_by_key(|item| (item.charge.date, item.charge.start_time));

        let mut recurring = Vec::new();
        for commitment in bookings.recurring_commitments(customer_id)? {
            if let Some(component) = Self::slot_component(&commitment, period, rates)? {
                recurring.push(component);
            }
        }

        let total_due = one_off.iter().map(|item| item.charge.amount).sum::<Decimal>()
            + recurring.iter().map(RecurringComponent::amount).sum::<Decimal>();
        let total_hours = one_off.iter().map(|item| item.hours).sum::<Decimal>()
            + recurring.iter().map(RecurringComponent::hours).sum::<Decimal>();
        let bookings_count = one_off.len() as u32
            + recurring.iter().map(RecurringComponent::sessions).sum::<u32>();

        tracing::debug!(
            customer = %customer_id,
            %period,
            %total_due,
            bookings_count,
            "recomputed period due"
        );

        Ok(DueSummary {
            customer_id,
            period,
            total_due,
            total_hours: total_hours.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            bookings_count,
            one_off,
            recurring,
        })
    }

    /// Prices one commitment for `period`, or `None` when it is inactive, outside the period,
    /// or has no occurrence inside its active window.
    pub fn slot_component(
        commitment: &RecurringCommitment,
        period: BillingPeriod,
        rates: &RateTable,
    ) -> BillingResult<Option<RecurringComponent>> {
        let Some(window) = commitment.billable_window(&period) else {
            return Ok(None);
        };
        let dates = occurrence_dates(&window, commitment.day_of_week);
        if dates.is_empty() {
            return Ok(None);
        }
        let quote = quote_session(
            commitment.start_time,
            commitment.end_time,
            &commitment.sport,
            commitment.hourly_rate_override,
            rates,
        )?;
        Ok(Some(RecurringComponent {
            commitment: commitment.clone(),
            quote,
            dates,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{count_occurrences, DayOfWeek};
    use crate::domain::{BookingStatus, Customer};
    use crate::pricing::{SportRates, TimeOfDay};
    use crate::storage::{BookingAdmin, MemoryStore};
    use rust_decimal_macros::dec;

    fn t(raw: &str) -> TimeOfDay {
        raw.parse().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rates() -> RateTable {
        RateTable::new().with_sport(
            "badminton",
            SportRates {
                off_peak_rate: dec!(20),
                peak_rate: dec!(30),
                peak_start: TimeOfDay::EVENING,
            },
        )
    }

    fn seeded() -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let customer = store.add_customer(Customer::new("Farid")).unwrap();
        (store, customer)
    }

    #[test]
    fn monday_override_commitment_in_february_2026() {
        let (store, customer) = seeded();
        store
            .upsert_commitment(
                RecurringCommitment::new(
                    customer,
                    "Court 1",
                    DayOfWeek::Monday,
                    t("10:00"),
                    t("11:30"),
                    "badminton",
                    date(2026, 1, 1),
                )
                .with_rate_override(dec!(80)),
            )
            .unwrap();
        let period = BillingPeriod::new(2026, 2).unwrap();
        let due = DueService::compute_due(&store, &rates(), customer, period).unwrap();
        assert_eq!(due.bookings_count, 4);
        assert_eq!(due.total_hours, dec!(6.0));
        assert_eq!(due.total_due, dec!(480.00));
        assert_eq!(
            due.recurring[0].sessions(),
            count_occurrences(2026, 2, DayOfWeek::Monday)
        );
    }

    #[test]
    fn cancelled_and_out_of_period_charges_are_excluded() {
        let (store, customer) = seeded();
        let inside = OneOffCharge::new(
            customer,
            date(2026, 2, 28),
            t("09:00"),
            t("10:00"),
            "Court 2",
            "badminton",
            dec!(20),
        );
        let mut cancelled = inside.clone();
        cancelled.id = Uuid::new_v4();
        cancelled.status = BookingStatus::Cancelled;
        let mut next_month = inside.clone();
        next_month.id = Uuid::new_v4();
        next_month.date = date(2026, 3, 1);
        for charge in [inside, cancelled, next_month] {
            store.add_one_off_charge(charge).unwrap();
        }

        let period = BillingPeriod::new(2026, 2).unwrap();
        let due = DueService::compute_due(&store, &rates(), customer, period).unwrap();
        assert_eq!(due.total_due, dec!(20));
        assert_eq!(due.total_hours, dec!(1));
        assert_eq!(due.bookings_count, 1);
    }

    #[test]
    fn partial_month_commitments_bill_only_active_weeks() {
        let (store, customer) = seeded();
        store
            .upsert_commitment(
                RecurringCommitment::new(
                    customer,
                    "Court 3",
                    DayOfWeek::Monday,
                    t("08:00"),
                    t("09:00"),
                    "badminton",
                    date(2026, 2, 10),
                )
                .with_end_date(date(2026, 2, 20)),
            )
            .unwrap();
        let period = BillingPeriod::new(2026, 2).unwrap();
        let due = DueService::compute_due(&store, &rates(), customer, period).unwrap();
        assert_eq!(due.recurring[0].dates, vec![date(2026, 2, 16)]);
        assert_eq!(due.total_due, dec!(20.00));
    }

    #[test]
    fn unknown_customer_is_not_found() {
        let (store, _) = seeded();
        let period = BillingPeriod::new(2026, 2).unwrap();
        let err = DueService::compute_due(&store, &rates(), Uuid::new_v4(), period).unwrap_err();
        assert!(matches!(err, BillingError::NotFound(_)));
    }

    #[test]
    fn unknown_sport_propagates_as_configuration_error() {
        let (store, customer) = seeded();
        store
            .upsert_commitment(RecurringCommitment::new(
                customer,
                "Court 9",
                DayOfWeek::Friday,
                t("19:00"),
                t("20:00"),
                "futsal",
                date(2026, 1, 1),
            ))
            .unwrap();
        let period = BillingPeriod::new(2026, 2).unwrap();
        let err = DueService::compute_due(&store, &rates(), customer, period).unwrap_err();
        assert!(matches!(err, BillingError::Configuration(_)));
    }
}
