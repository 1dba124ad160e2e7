use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::amount::Amount;
use crate::currency::Currency;
use crate::errors::{LedgerError, LedgerResult};

/// Stable handle to an account living in an [`AccountBook`]. Splits only ever store this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AccountKind {
    Asset,
    Liability,
    Income,
    Expense,
}

/// Represents an account in the accounting sense. Accounts hold little more than an
/// identity to assign splits to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub currency: Currency,
    pub kind: AccountKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub notes: String,
}

impl Account {
    pub fn new(name: impl Into<String>, currency: Currency, kind: AccountKind) -> Self {
        Self {
            id: AccountId::new(),
            name: name.into(),
            currency,
            kind,
            reference: None,
            account_number: String::new(),
            notes: String::new(),
        }
    }

    pub fn is_balance_sheet_account(&self) -> bool {
        matches!(self.kind, AccountKind::Asset | AccountKind::Liability)
    }

    pub fn is_income_statement_account(&self) -> bool {
        matches!(self.kind, AccountKind::Income | AccountKind::Expense)
    }

    pub fn is_credit_account(&self) -> bool {
        matches!(self.kind, AccountKind::Liability | AccountKind::Income)
    }

    pub fn is_debit_account(&self) -> bool {
        matches!(self.kind, AccountKind::Asset | AccountKind::Expense)
    }

    /// Liabilities and incomes grow with negative splits; flip them for display-oriented totals.
    pub fn normalize_amount(&self, amount: &Amount) -> Amount {
        if self.is_credit_account() {
            -amount
        } else {
            amount.clone()
        }
    }
}

/// Arena of accounts keyed by [`AccountId`].
#[derive(Debug, Clone, Default)]
pub struct AccountBook {
    accounts: HashMap<AccountId, Account>,
}

impl AccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account, rejecting names already used (case-insensitive).
    pub fn add(&mut self, account: Account) -> LedgerResult<AccountId> {
        if self.find_by_name(&account.name).is_some() {
            return Err(LedgerError::DuplicateAccount(account.name));
        }
        let id = account.id;
        self.accounts.insert(id, account);
        Ok(id)
    }

    pub fn get(&self, id: AccountId) -> LedgerResult<&Account> {
        self.accounts.get(&id).ok_or(LedgerError::UnknownAccount(id))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Account> {
        let needle = name.trim().to_lowercase();
        self.accounts
            .values()
            .find(|account| account.name.trim().to_lowercase() == needle)
    }

    pub fn remove(&mut self, id: AccountId) -> LedgerResult<Account> {
        self.accounts
            .remove(&id)
            .ok_or(LedgerError::UnknownAccount(id))
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn book_rejects_duplicate_names() {
        let mut book = AccountBook::new();
        book.add(Account::new("Checking", Currency::new("USD"), AccountKind::Asset))
            .unwrap();
        let err = book
            .add(Account::new("checking ", Currency::new("USD"), AccountKind::Asset))
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateAccount(_)));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn unknown_ids_are_reported() {
        let book = AccountBook::new();
        let missing = AccountId::new();
        assert!(matches!(
            book.get(missing),
            Err(LedgerError::UnknownAccount(id)) if id == missing
        ));
    }

    #[test]
    fn credit_accounts_normalize_sign() {
        let salary = Account::new("Salary", Currency::new("USD"), AccountKind::Income);
        let amount = Amount::new(dec!(-100), Currency::new("USD"));
        assert!(salary.is_credit_account());
        assert!(salary.is_income_statement_account());
        assert_eq!(
            salary.normalize_amount(&amount),
            Amount::new(dec!(100), Currency::new("USD"))
        );
    }
}
