pub mod billing_manager;
pub mod services;
pub mod time;

pub use billing_manager::BillingManager;
