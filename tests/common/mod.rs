#![allow(dead_code)]

use std::sync::Mutex;

use chrono::NaiveDate;
use ledger_core::{
    config::ConfigManager,
    currency::{Currency, FxBook, FxRate},
    ledger::{Account, AccountBook, AccountId, AccountKind, Amount},
};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// CAD→USD at 0.75 and EUR→USD at 1.10, published on the first of each month of 2020.
pub static RATES: Lazy<FxBook> = Lazy::new(|| {
    let mut book = FxBook::with_tolerance(31);
    for month in 1..=12 {
        let day = date(2020, month, 1);
        book.add_rate(FxRate::new(
            Currency::new("CAD"),
            Currency::new("USD"),
            day,
            Decimal::new(75, 2),
        ));
        book.add_rate(FxRate::new(
            Currency::new("EUR"),
            Currency::new("USD"),
            day,
            Decimal::new(110, 2),
        ));
    }
    book
});

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn usd(value: Decimal) -> Amount {
    Amount::new(value, Currency::new("USD"))
}

pub fn cad(value: Decimal) -> Amount {
    Amount::new(value, Currency::new("CAD"))
}

/// Accounts shared by most scenarios.
pub struct Books {
    pub accounts: AccountBook,
    pub checking: AccountId,
    pub groceries: AccountId,
    pub salary: AccountId,
    pub visa: AccountId,
}

pub fn books() -> Books {
    let mut accounts = AccountBook::new();
    let checking = accounts
        .add(Account::new("Checking", Currency::new("USD"), AccountKind::Asset))
        .expect("add checking");
    let groceries = accounts
        .add(Account::new("Groceries", Currency::new("USD"), AccountKind::Expense))
        .expect("add groceries");
    let salary = accounts
        .add(Account::new("Salary", Currency::new("USD"), AccountKind::Income))
        .expect("add salary");
    let visa = accounts
        .add(Account::new("Visa", Currency::new("USD"), AccountKind::Liability))
        .expect("add visa");
    Books {
        accounts,
        checking,
        groceries,
        salary,
        visa,
    }
}

/// Creates a config manager backed by a unique directory.
pub fn temp_config_manager() -> ConfigManager {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    ConfigManager::with_base_dir(base).expect("create config manager for temp dir")
}
