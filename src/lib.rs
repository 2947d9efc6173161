#![doc(test(attr(deny(warnings))))]

//! Court Billing computes what customers owe for recurring and one-off court bookings each
//! month and reconciles it against an idempotent payment ledger.

pub mod calendar;
pub mod config;
pub mod core;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod storage;
pub mod utils;

pub use crate::core::BillingManager;
pub use errors::{BillingError, BillingResult};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and logs the embedded build metadata.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        let build = utils::build_info::current();
        tracing::info!(
            version = build.version,
            git_hash = build.git_hash,
            built_at = build.timestamp,
            profile = build.profile,
            rustc = build.rustc,
            "court billing initialized"
        );
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
        super::init();
    }
}
