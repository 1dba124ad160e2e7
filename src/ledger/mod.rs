//! Ledger domain: amounts, accounts, balanced transactions, schedules and budgets.

pub mod account;
pub mod amount;
pub mod budget;
pub mod date_window;
pub mod recurring;
pub mod time_interval;
pub mod transaction;

pub use account::{Account, AccountBook, AccountId, AccountKind};
pub use amount::Amount;
pub use budget::{Budget, BudgetList, ProjectionContext};
pub use date_window::{prorate, DateWindow};
pub use recurring::{LocalException, Recurrence};
pub use time_interval::{DateCounter, RepeatType};
pub use transaction::{
    Origin, Split, SpawnOrigin, Transaction, TransactionChange, TransactionQuery,
};
