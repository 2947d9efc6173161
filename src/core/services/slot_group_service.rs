//! Merges fragmented recurring rows into user-facing weekly commitments.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::calendar::{BillingPeriod, DayOfWeek};
use crate::domain::{DisplayStatus, RecurringCommitment, SlotPaymentRecord, SlotRecordStatus};
use crate::errors::BillingResult;
use crate::pricing::{quote_session, RateTable, TimeOfDay};

/// One logical weekly commitment backed by one or more recurring rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotGroup {
    pub customer_id: Uuid,
    pub court: String,
    pub sport: String,
    pub label: Option<String>,
    pub day_of_week: DayOfWeek,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub duration: Decimal,
    pub amount_per_session: Decimal,
    pub start_date: NaiveDate,
    /// `None` while any member is open-ended.
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    /// Ordered by member start date.
    pub member_slot_ids: Vec<Uuid>,
}

impl SlotGroup {
    pub fn contains(&self, slot_id: Uuid) -> bool {
        self.member_slot_ids.contains(&slot_id)
    }
}

type GroupKey = (u8, TimeOfDay, TimeOfDay, String, String, Uuid);

pub struct SlotGroupService;

impl SlotGroupService {
    /// Groups rows by weekday, time range, court, sport and owning customer.
    pub fn group_slots(
        rows: &[RecurringCommitment],
        rates: &RateTable,
    ) -> BillingResult<Vec<SlotGroup>> {
        let mut buckets: BTreeMap<GroupKey, Vec<&RecurringCommitment>> = BTreeMap::new();
        for row in rows {
            let key = (
                row.day_of_week.index(),
                row.start_time,
                row.end_time,
                row.court.trim().to_lowercase(),
                row.sport.trim().to_lowercase(),
                row.customer_id,
            );
            buckets.entry(key).or_default().push(row);
        }

        let mut groups = Vec::with_capacity(buckets.len());
        for mut members in buckets.into_values() {
            members.sort_by_key(|row| (row.start_date, row.id));
            let Some(latest) = members.last().copied() else {
                continue;
            };
            let quote = quote_session(
                latest.start_time,
                latest.end_time,
                &latest.sport,
                latest.hourly_rate_override,
                rates,
            )?;
            let open_ended = members.iter().any(|row| row.end_date.is_none());
            let end_date = if open_ended {
                None
            } else {
                members.iter().filter_map(|row| row.end_date).max()
            };
            groups.push(SlotGroup {
                customer_id: latest.customer_id,
                court: latest.court.clone(),
                sport: latest.sport.clone(),
                label: members.iter().rev().find_map(|row| row.label.clone()),
                day_of_week: latest.day_of_week,
                start_time: latest.start_time,
                end_time: latest.end_time,
                duration: quote.hours,
                amount_per_session: quote.amount,
                start_date: members[0].start_date,
                end_date,
                is_active: members.iter().any(|row| row.is_active),
                member_slot_ids: members.iter().map(|row| row.id).collect(),
            });
        }
        Ok(groups)
    }

    /// Display status of a group in `period`, from its members' records for that period.
    /// Returns `None` when no member has a record.
    pub fn group_status(
        group: &SlotGroup,
        records: &[SlotPaymentRecord],
        period: BillingPeriod,
        current: BillingPeriod,
    ) -> Option<DisplayStatus> {
        let member_records: Vec<&SlotPaymentRecord> = records
            .iter()
            .filter(|record| record.period == period && group.contains(record.slot_id))
            .collect();
        if member_records.is_empty() {
            return None;
        }
        let paid = member_records
            .iter()
            .filter(|record| record.status == SlotRecordStatus::Paid)
            .count();
        let status = if paid == member_records.len() {
            DisplayStatus::Paid
        } else if paid > 0 {
            DisplayStatus::Partial
        } else {
            DisplayStatus::derive(SlotRecordStatus::Pending, period, current)
        };
        Some(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PaymentMethod;
    use crate::pricing::SportRates;
    use chrono::Utc;
    use rust_decimal_macros::dec;

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

    fn row(customer: Uuid, court: &str, start: NaiveDate) -> RecurringCommitment {
        RecurringCommitment::new(
            customer,
            court,
            DayOfWeek::Tuesday,
            TimeOfDay::new(19, 0).unwrap(),
            TimeOfDay::new(21, 0).unwrap(),
            "badminton",
            start,
        )
    }

    #[test]
    fn fragmented_rows_merge_into_one_group() {
        let customer = Uuid::new_v4();
        let mut old = row(customer, "Court 1", date(2025, 6, 1)).with_end_date(date(2025, 12, 31));
        old.is_active = false;
        let renewed = row(customer, "Court 1", date(2026, 1, 1)).with_rate_override(dec!(45));
        let elsewhere = row(customer, "Court 2", date(2026, 1, 1));

        let groups =
            SlotGroupService::group_slots(&[renewed.clone(), old.clone(), elsewhere], &rates())
                .unwrap();
        assert_eq!(groups.len(), 2);
        let merged = groups.iter().find(|group| group.contains(old.id)).unwrap();
        assert_eq!(merged.member_slot_ids, vec![old.id, renewed.id]);
        assert_eq!(merged.start_date, date(2025, 6, 1));
        assert_eq!(merged.end_date, None);
        assert!(merged.is_active);
        assert_eq!(merged.duration, dec!(2));
        // Latest member's override wins.
        assert_eq!(merged.amount_per_session, dec!(90.00));
    }

    #[test]
    fn closed_groups_report_the_latest_end_date() {
        let customer = Uuid::new_v4();
        let first = row(customer, "Court 1", date(2025, 1, 1)).with_end_date(date(2025, 3, 31));
        let second = row(customer, "Court 1", date(2025, 4, 1)).with_end_date(date(2025, 9, 30));
        let groups = SlotGroupService::group_slots(&[first, second], &rates()).unwrap();
        assert_eq!(groups[0].end_date, Some(date(2025, 9, 30)));
        assert_eq!(groups[0].amount_per_session, dec!(60.00));
    }

    #[test]
    fn different_customers_never_share_a_group() {
        let groups = SlotGroupService::group_slots(
            &[
                row(Uuid::new_v4(), "Court 1", date(2026, 1, 1)),
                row(Uuid::new_v4(), "Court 1", date(2026, 1, 1)),
            ],
            &rates(),
        )
        .unwrap();
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn sports_sharing_a_court_and_time_stay_apart() {
        let customer = Uuid::new_v4();
        let badminton = row(customer, "Court 1", date(2026, 1, 1));
        let mut spelled = row(customer, "Court 1", date(2026, 2, 1));
        spelled.sport = " Badminton".into();
        let mut pickleball = row(customer, "Court 1", date(2026, 1, 1)).with_rate_override(dec!(25));
        pickleball.sport = "pickleball".into();

        let groups = SlotGroupService::group_slots(
            &[badminton.clone(), spelled.clone(), pickleball.clone()],
            &rates(),
        )
        .unwrap();
        assert_eq!(groups.len(), 2);
        let merged = groups.iter().find(|group| group.contains(badminton.id)).unwrap();
        assert_eq!(merged.member_slot_ids, vec![badminton.id, spelled.id]);
        let alone = groups.iter().find(|group| group.contains(pickleball.id)).unwrap();
        assert_eq!(alone.member_slot_ids, vec![pickleball.id]);
        assert_eq!(alone.amount_per_session, dec!(50.00));
    }

    #[test]
    fn group_status_reports_partial_when_members_disagree() {
        let customer = Uuid::new_v4();
        let a = row(customer, "Court 1", date(2025, 1, 1));
        let b = row(customer, "Court 1", date(2026, 1, 1));
        let groups = SlotGroupService::group_slots(&[a.clone(), b.clone()], &rates()).unwrap();
        let period = BillingPeriod::new(2026, 1).unwrap();
        let current = BillingPeriod::new(2026, 2).unwrap();

        let mut paid = SlotPaymentRecord::pending(a.id, period, dec!(240), 4, Utc::now());
        paid.mark_paid(PaymentMethod::Cash, None, Utc::now()).unwrap();
        let pending = SlotPaymentRecord::pending(b.id, period, dec!(240), 4, Utc::now());

        let status = SlotGroupService::group_status(
            &groups[0],
            &[paid.clone(), pending.clone()],
            period,
            current,
        );
        assert_eq!(status, Some(DisplayStatus::Partial));
        assert_eq!(
            SlotGroupService::group_status(&groups[0], &[pending], period, current),
            Some(DisplayStatus::Overdue)
        );
        assert_eq!(
            SlotGroupService::group_status(&groups[0], &[paid], period, current),
            Some(DisplayStatus::Paid)
        );
        assert_eq!(
            SlotGroupService::group_status(&groups[0], &[], period, current),
            None
        );
    }
}
