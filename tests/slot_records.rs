mod common;

use chrono::{TimeZone, Utc};
use common::{date, february_2026, memory_env, t};
use court_billing::{
    calendar::{BillingPeriod, DayOfWeek},
    core::time::FixedClock,
    domain::{DisplayStatus, PaymentMethod, RecurringCommitment, SlotRecordStatus},
    storage::{BookingAdmin, LedgerStore},
};
use rust_decimal_macros::dec;

#[test]
fn ensure_then_pay_a_slot() {
    let (store, manager, customer) = memory_env();
    let groups = manager.group_slots(customer).unwrap();
    let slot_ids = groups[0].member_slot_ids.clone();

    let report = manager.ensure_slot_records(&slot_ids, february_2026()).unwrap();
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].amount, dec!(480.00));
    assert_eq!(report.created[0].sessions_count, 4);

    let again = manager.ensure_slot_records(&slot_ids, february_2026()).unwrap();
    assert!(again.created.is_empty());

    let status = manager.get_slot_status(slot_ids[0], february_2026()).unwrap();
    assert_eq!(status.display, DisplayStatus::Unpaid);

    let record = manager
        .mark_slot_paid(slot_ids[0], february_2026(), PaymentMethod::EWallet, None)
        .unwrap();
    assert_eq!(record.status, SlotRecordStatus::Paid);
    assert!(record.paid_at.is_some());
    assert_eq!(store.ledger_snapshot().slot_records.len(), 1);
}

#[test]
fn slot_records_do_not_change_the_aggregated_due() {
    let (_, manager, customer) = memory_env();
    let slot_ids = manager.group_slots(customer).unwrap()[0].member_slot_ids.clone();
    manager.ensure_slot_records(&slot_ids, february_2026()).unwrap();
    manager
        .mark_slot_paid(slot_ids[0], february_2026(), PaymentMethod::Cash, None)
        .unwrap();
    let overview = manager.payment_overview(customer, february_2026()).unwrap();
    assert_eq!(overview.total_due, dec!(480.00));
    assert_eq!(overview.total_paid, dec!(0));
}

#[test]
fn renewed_slot_groups_track_partial_payment() {
    let (store, manager, customer) = memory_env();
    let mut renewal = RecurringCommitment::new(
        customer,
        "Court 1",
        DayOfWeek::Monday,
        t("10:00"),
        t("11:30"),
        "badminton",
        date(2026, 2, 10),
    );
    renewal.hourly_rate_override = Some(dec!(90));
    store.upsert_commitment(renewal.clone()).unwrap();

    let groups = manager.group_slots(customer).unwrap();
    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    assert_eq!(group.member_slot_ids.len(), 2);
    assert_eq!(group.amount_per_session, dec!(135.00));
    assert_eq!(group.start_date, date(2026, 1, 1));

    let period = february_2026();
    manager
        .ensure_slot_records(&group.member_slot_ids, period)
        .unwrap();
    assert_eq!(
        store.slot_record(renewal.id, period).unwrap().unwrap().sessions_count,
        2
    );
    manager
        .mark_slot_paid(renewal.id, period, PaymentMethod::Cash, None)
        .unwrap();
    assert_eq!(
        manager.group_status(group, period).unwrap(),
        Some(DisplayStatus::Partial)
    );
}

#[test]
fn unpaid_records_show_overdue_next_month() {
    let (_, manager, customer) = memory_env();
    let slot_ids = manager.group_slots(customer).unwrap()[0].member_slot_ids.clone();
    let january = BillingPeriod::new(2026, 1).unwrap();
    manager.ensure_slot_records(&slot_ids, january).unwrap();
    assert_eq!(
        manager.get_slot_status(slot_ids[0], january).unwrap().display,
        DisplayStatus::Overdue
    );

    let manager = manager.with_clock(Box::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 1, 31, 23, 0, 0).unwrap(),
    )));
    assert_eq!(
        manager.get_slot_status(slot_ids[0], january).unwrap().display,
        DisplayStatus::Unpaid
    );
    let group = &manager.group_slots(customer).unwrap()[0];
    assert_eq!(
        manager.group_status(group, january).unwrap(),
        Some(DisplayStatus::Unpaid)
    );
}
