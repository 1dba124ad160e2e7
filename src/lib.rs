#![doc(test(attr(deny(warnings))))]

//! Ledger Core is a double-entry bookkeeping engine: balanced multi-currency
//! transactions, recurring schedules with per-occurrence exceptions, and budgets
//! projected against already posted spending.

pub mod config;
pub mod currency;
pub mod errors;
pub mod ledger;
pub mod time;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    init_with_filter(None);
}

/// Same as [`init`], adding `filter` (for instance [`config::Config::log_filter`]) to the
/// default directives.
pub fn init_with_filter(filter: Option<&str>) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(filter);
        tracing::info!("Ledger Core tracing initialized.");
    });
}
