//! Line-item expansion of a period's due amount.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::due_service::DueSummary;
use crate::pricing::{round_money, TimeOfDay};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineItemKind {
    OneOff,
    Recurring,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub kind: LineItemKind,
    pub date: NaiveDate,
    pub court: String,
    pub sport: String,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub hours: Decimal,
    /// Effective hourly rate for the line.
    pub rate: Decimal,
    pub amount: Decimal,
    pub source_id: Uuid,
}

impl LineItem {
    pub fn time_range(&self) -> String {
        format!("{}-{}", self.start_time, self.end_time)
    }
}

pub struct BreakdownService;

impl BreakdownService {
    /// Expands `due` into one line per one-off charge and one per recurring occurrence,
    /// ordered by date then start time. Amounts sum to `due.total_due`.
    pub fn breakdown(due: &DueSummary) -> Vec<LineItem> {
        let mut items = Vec::new();
        for component in &due.one_off {
            let charge = &component.charge;
            let rate = if component.hours.is_zero() {
                Decimal::ZERO
            } else {
                round_money(charge.amount / component.hours)
            };
            items.push(LineItem {
                kind: LineItemKind::OneOff,
                date: charge.date,
                court: charge.court.clone(),
                sport: charge.sport.clone(),
                start_time: charge.start_time,
                end_time: charge.end_time,
                hours: component.hours,
                rate,
                amount: charge.amount,
                source_id: charge.id,
            });
        }
        for component in &due.recurring {
            let slot = &component.commitment;
            for &date in &component.dates {
                items.push(LineItem {
                    kind: LineItemKind::Recurring,
                    date,
                    court: slot.court.clone(),
                    sport: slot.sport.clone(),
                    start_time: slot.start_time,
                    end_time: slot.end_time,
                    hours: component.quote.hours,
                    rate: component.quote.effective_rate(),
                    amount: component.quote.amount,
                    source_id: slot.id,
                });
            }
        }
        items.sort_by(|a, b| (a.date, a.start_time).cmp(&(b.date, b.start_time)));
        items
    }

    pub fn total(items: &[LineItem]) -> Decimal {
        items.iter().map(|item| item.amount).sum()
    }
}
