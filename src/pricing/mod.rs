//! Session duration and rate calculations, including peak-hour split pricing.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::{BillingError, BillingResult};

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Rounds a monetary value to cents.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A 24-hour "HH:MM" wall-clock time. `24:00` marks the end of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    minutes: u16,
}

impl TimeOfDay {
    /// 18:00, the usual peak-hour boundary.
    pub const EVENING: TimeOfDay = TimeOfDay { minutes: 18 * 60 };

    pub fn new(hour: u16, minute: u16) -> BillingResult<Self> {
        let invalid =
            || BillingError::Validation(format!("invalid time of day {hour:02}:{minute:02}"));
        let minutes = hour
            .checked_mul(60)
            .and_then(|m| m.checked_add(minute))
            .ok_or_else(invalid)?;
        if minute >= 60 || minutes > MINUTES_PER_DAY {
            return Err(invalid());
        }
        Ok(Self { minutes })
    }

    pub fn minutes(self) -> u16 {
        self.minutes
    }
}

impl FromStr for TimeOfDay {
    type Err = BillingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || BillingError::Validation(format!("expected HH:MM time, got `{raw}`"));
        let (hour, minute) = raw.trim().split_once(':').ok_or_else(invalid)?;
        let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }
        if !digits(hour) || !digits(minute) {
            return Err(invalid());
        }
        let hour: u16 = hour.parse().map_err(|_| invalid())?;
        let minute: u16 = minute.parse().map_err(|_| invalid())?;
        TimeOfDay::new(hour, minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = BillingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes / 60, self.minutes % 60)
    }
}

/// Elapsed hours between two same-day times. Overnight ranges are expressed with `24:00`.
pub fn hours(start: TimeOfDay, end: TimeOfDay) -> BillingResult<Decimal> {
    if end <= start {
        return Err(BillingError::Validation(format!(
            "end time {end} must be after start time {start}"
        )));
    }
    Ok(minutes_to_hours(end.minutes - start.minutes))
}

fn minutes_to_hours(minutes: u16) -> Decimal {
    Decimal::from(minutes) / Decimal::from(60)
}

/// Off-peak and peak hourly rates for one sport, split at `peak_start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SportRates {
    pub off_peak_rate: Decimal,
    pub peak_rate: Decimal,
    pub peak_start: TimeOfDay,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    #[serde(default)]
    sports: BTreeMap<String, SportRates>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sport(mut self, sport: impl AsRef<str>, rates: SportRates) -> Self {
        self.insert(sport, rates);
        self
    }

    pub fn insert(&mut self, sport: impl AsRef<str>, rates: SportRates) {
        self.sports.insert(sport_key(sport.as_ref()), rates);
    }

    /// Looks up a sport's rates. Unknown sports are a deployment defect, never priced at zero.
    pub fn rates_for(&self, sport: &str) -> BillingResult<&SportRates> {
        self.sports.get(&sport_key(sport)).ok_or_else(|| {
            BillingError::Configuration(format!("no rate configured for sport `{sport}`"))
        })
    }

    pub fn sports(&self) -> impl Iterator<Item = &str> {
        self.sports.keys().map(String::as_str)
    }

    pub fn validate(&self) -> BillingResult<()> {
        for (sport, rates) in &self.sports {
            if rates.off_peak_rate <= Decimal::ZERO || rates.peak_rate <= Decimal::ZERO {
                return Err(BillingError::Configuration(format!(
                    "rates for `{sport}` must be positive"
                )));
            }
            if rates.peak_start.minutes() == 0 || rates.peak_start.minutes() >= MINUTES_PER_DAY {
                return Err(BillingError::Configuration(format!(
                    "peak boundary for `{sport}` must fall inside the day"
                )));
            }
        }
        Ok(())
    }
}

fn sport_key(sport: &str) -> String {
    sport.trim().to_lowercase()
}

/// Priced result for one session of a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionQuote {
    pub hours: Decimal,
    pub off_peak_hours: Decimal,
    pub peak_hours: Decimal,
    pub amount: Decimal,
}

impl SessionQuote {
    /// Average hourly rate actually charged, in cents.
    pub fn effective_rate(&self) -> Decimal {
        if self.hours.is_zero() {
            return Decimal::ZERO;
        }
        round_money(self.amount / self.hours)
    }
}

/// Prices one session. An hourly override is a flat rate for the whole duration and bypasses
/// both the rate table and the peak split.
pub fn quote_session(
    start: TimeOfDay,
    end: TimeOfDay,
    sport: &str,
    hourly_rate_override: Option<Decimal>,
    rates: &RateTable,
) -> BillingResult<SessionQuote> {
    let total_hours = hours(start, end)?;

    if let Some(rate) = hourly_rate_override {
        if rate <= Decimal::ZERO {
            return Err(BillingError::Validation(format!(
                "hourly rate override must be positive, got {rate}"
            )));
        }
        return Ok(SessionQuote {
            hours: total_hours,
            off_peak_hours: total_hours,
            peak_hours: Decimal::ZERO,
            amount: round_money(total_hours * rate),
        });
    }

    let sport_rates = rates.rates_for(sport)?;
    let boundary = sport_rates.peak_start;
    let (off_peak_minutes, peak_minutes) = if end <= boundary {
        (end.minutes - start.minutes, 0)
    } else if start >= boundary {
        (0, end.minutes - start.minutes)
    } else {
        (
            boundary.minutes - start.minutes,
            end.minutes - boundary.minutes,
        )
    };
    let off_peak_hours = minutes_to_hours(off_peak_minutes);
    let peak_hours = minutes_to_hours(peak_minutes);
    let amount =
        off_peak_hours * sport_rates.off_peak_rate + peak_hours * sport_rates.peak_rate;

    Ok(SessionQuote {
        hours: total_hours,
        off_peak_hours,
        peak_hours,
        amount: round_money(amount),
    })
}

/// Monetary amount for one session; see [`quote_session`].
pub fn session_amount(
    start: TimeOfDay,
    end: TimeOfDay,
    sport: &str,
    hourly_rate_override: Option<Decimal>,
    rates: &RateTable,
) -> BillingResult<Decimal> {
    quote_session(start, end, sport, hourly_rate_override, rates).map(|quote| quote.amount)
}
