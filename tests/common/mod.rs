#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, TimeZone, Utc};
use court_billing::{
    calendar::{BillingPeriod, DayOfWeek},
    config::{BillingConfig, ConfigManager},
    core::time::FixedClock,
    domain::{Customer, RecurringCommitment},
    pricing::TimeOfDay,
    storage::{BookingAdmin, JsonStore, MemoryStore},
    BillingManager,
};
use once_cell::sync::Lazy;
use rust_decimal_macros::dec;
use tempfile::TempDir;
use uuid::Uuid;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub fn temp_dir() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let path = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    path
}

pub fn t(raw: &str) -> TimeOfDay {
    raw.parse().expect("valid time")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn february_2026() -> BillingPeriod {
    BillingPeriod::new(2026, 2).expect("valid period")
}

/// Clock pinned inside February 2026.
pub fn clock() -> Box<FixedClock> {
    Box::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 2, 15, 10, 0, 0).unwrap(),
    ))
}

pub fn monday_override_slot(customer: Uuid) -> RecurringCommitment {
    RecurringCommitment::new(
        customer,
        "Court 1",
        DayOfWeek::Monday,
        t("10:00"),
        t("11:30"),
        "badminton",
        date(2026, 1, 1),
    )
    .with_rate_override(dec!(80))
}

/// In-memory manager seeded with one customer holding the Monday RM80/hr commitment.
pub fn memory_env() -> (Arc<MemoryStore>, BillingManager, Uuid) {
    let store = Arc::new(MemoryStore::new());
    let customer = store
        .add_customer(Customer::new("Hafiz"))
        .expect("add customer");
    store
        .upsert_commitment(monday_override_slot(customer))
        .expect("add commitment");
    let manager =
        BillingManager::from_store(store.clone(), BillingConfig::default()).with_clock(clock());
    (store, manager, customer)
}

/// JSON-backed manager plus a config manager, both rooted in a fresh temp directory.
pub fn json_env() -> (Arc<JsonStore>, BillingManager, ConfigManager) {
    let base = temp_dir();
    let config_manager = ConfigManager::with_base_dir(base).expect("config manager");
    let config = config_manager.load().expect("default config");
    let store =
        Arc::new(JsonStore::open(config_manager.data_dir(&config)).expect("open json store"));
    let manager = BillingManager::from_store(store.clone(), config).with_clock(clock());
    (store, manager, config_manager)
}
