use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::account::{AccountBook, AccountId};
use super::amount::Amount;
use crate::currency::{Currency, CurrencyConverter};
use crate::errors::LedgerResult;
use crate::time::Clock;

/// Assignment of money to an account within a [`Transaction`].
///
/// A positive amount is a debit, a negative one a credit, and zero a null split. A split
/// without an account is "unassigned".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Split {
    amount: Amount,
    account: Option<AccountId>,
    #[serde(default)]
    pub memo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciliation_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Split {
    pub fn new(account: Option<AccountId>, amount: Amount) -> Self {
        Self {
            amount,
            account,
            memo: String::new(),
            reconciliation_date: None,
            reference: None,
        }
    }

    pub fn amount(&self) -> &Amount {
        &self.amount
    }

    pub fn account(&self) -> Option<AccountId> {
        self.account
    }

    /// Reassigns the split. Moving it to another account clears its reconciliation.
    pub fn set_account(&mut self, account: Option<AccountId>) {
        if account == self.account {
            return;
        }
        self.account = account;
        self.reconciliation_date = None;
    }

    /// Changes the amount. A change of currency clears the reconciliation.
    pub fn set_amount(&mut self, amount: Amount) {
        if !amount.same_currency(&self.amount) {
            self.reconciliation_date = None;
        }
        self.amount = amount;
    }

    pub fn is_unassigned(&self) -> bool {
        self.account.is_none()
    }

    pub fn is_reconciled(&self) -> bool {
        self.reconciliation_date.is_some()
    }

    pub fn debit(&self) -> Amount {
        self.amount.debit()
    }

    pub fn credit(&self) -> Amount {
        self.amount.credit()
    }

    pub fn is_on_same_side(&self, other: &Split) -> bool {
        self.amount.is_negative() == other.amount.is_negative()
    }
}

/// Link from a materialized occurrence back to the schedule that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpawnOrigin {
    pub recurrence_id: Uuid,
    /// Nominal date of the occurrence. Identifies it within its schedule even when the
    /// effective date was moved.
    pub recurrence_date: NaiveDate,
    pub template: Box<Transaction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Origin {
    #[default]
    Plain,
    Spawn(SpawnOrigin),
    BudgetSpawn(SpawnOrigin),
}

/// A movement of money between two or more accounts at a specific date.
///
/// Splits are expected to balance: call [`Transaction::balance`] after any edit that may
/// have unbalanced them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub payee: String,
    #[serde(default)]
    pub checkno: String,
    #[serde(default)]
    pub notes: String,
    /// Orders transactions sharing the same date.
    #[serde(default)]
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub splits: Vec<Split>,
    #[serde(default)]
    pub origin: Origin,
}

/// Optional edits applied together by [`Transaction::change`]. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct TransactionChange {
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub payee: Option<String>,
    pub checkno: Option<String>,
    pub notes: Option<String>,
    pub from: Option<Option<AccountId>>,
    pub to: Option<Option<AccountId>>,
    pub amount: Option<Amount>,
    pub currency: Option<Currency>,
}

/// Search criteria for [`Transaction::matches`]. Text is compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub description: Option<String>,
    pub payee: Option<String>,
    pub checkno: Option<String>,
    pub memo: Option<String>,
    /// Compared with the magnitude of each split, whatever its currency.
    pub amount: Option<Amount>,
    /// Account names. A split assigned to any of them matches.
    pub accounts: Option<Vec<String>>,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        payee: impl Into<String>,
        checkno: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            description: description.into(),
            payee: payee.into(),
            checkno: checkno.into(),
            notes: String::new(),
            position: 0,
            mtime: None,
            splits: Vec::new(),
            origin: Origin::Plain,
        }
    }

    /// Two-split transaction moving `amount` into `account`, balanced by an unassigned split.
    pub fn with_amount(
        date: NaiveDate,
        description: impl Into<String>,
        account: Option<AccountId>,
        amount: Amount,
    ) -> Self {
        let mut txn = Self::new(date, description, "", "");
        let opposite = -&amount;
        txn.splits = vec![Split::new(account, amount), Split::new(None, opposite)];
        txn
    }

    /// Materializes `template` as the occurrence of a schedule at `recurrence_date`.
    ///
    /// Splits are copied without their reconciliation and balanced. `wrap` picks the kind of
    /// origin (`Origin::Spawn` or `Origin::BudgetSpawn`).
    pub fn spawn(
        template: &Transaction,
        recurrence_id: Uuid,
        recurrence_date: NaiveDate,
        date: NaiveDate,
        wrap: fn(SpawnOrigin) -> Origin,
    ) -> Transaction {
        let mut spawn = Transaction::new(
            date,
            template.description.clone(),
            template.payee.clone(),
            template.checkno.clone(),
        );
        spawn.set_splits(&template.splits);
        for split in &mut spawn.splits {
            split.reconciliation_date = None;
        }
        spawn.balance(None, false);
        spawn.origin = wrap(SpawnOrigin {
            recurrence_id,
            recurrence_date,
            template: Box::new(template.clone()),
        });
        spawn
    }

    /// Structural copy. Splits are owned by the copy; id and origin are kept.
    pub fn replicate(&self) -> Transaction {
        self.clone()
    }

    /// Copy of a spawn severed from its schedule, with a fresh id.
    pub fn detach(&self) -> Transaction {
        let mut txn = self.replicate();
        txn.id = Uuid::new_v4();
        txn.origin = Origin::Plain;
        txn
    }

    pub fn spawn_origin(&self) -> Option<&SpawnOrigin> {
        match &self.origin {
            Origin::Plain => None,
            Origin::Spawn(origin) | Origin::BudgetSpawn(origin) => Some(origin),
        }
    }

    pub fn recurrence_date(&self) -> Option<NaiveDate> {
        self.spawn_origin().map(|origin| origin.recurrence_date)
    }

    pub fn is_spawn(&self) -> bool {
        !matches!(self.origin, Origin::Plain)
    }

    pub fn is_budget_spawn(&self) -> bool {
        matches!(self.origin, Origin::BudgetSpawn(_))
    }

    /// Balances the splits out.
    ///
    /// `strong` is the index of the split the user just edited; it is never adjusted. With two
    /// splits and a strong one, the weak split either mirrors it (`keep_two_splits`) or flips
    /// side when both ended up on the same side. Multi-currency splits go through
    /// [`Transaction::balance_currencies`]. Otherwise the imbalance is absorbed by the first
    /// unassigned split, or by a new one, and null unassigned splits are dropped.
    pub fn balance(&mut self, strong: Option<usize>, keep_two_splits: bool) {
        let strong = strong.filter(|&index| index < self.splits.len());
        if let (2, Some(strong_index)) = (self.splits.len(), strong) {
            let strong_amount = self.splits[strong_index].amount.clone();
            let weak = &mut self.splits[1 - strong_index];
            if keep_two_splits {
                weak.set_amount(-&strong_amount);
            } else if weak.amount.is_positive() == strong_amount.is_positive() {
                let flipped = -&weak.amount;
                weak.set_amount(flipped);
            }
        }
        if self.is_mct() {
            self.balance_currencies(strong);
            return;
        }
        let imbalance = match self.net() {
            Ok(imbalance) => imbalance,
            Err(err) => {
                warn!(txn = %self.id, error = %err, "transaction left unbalanced");
                return;
            }
        };
        if imbalance.is_zero() {
            return;
        }
        let is_unassigned = |index: usize, split: &Split| {
            split.account.is_none() && Some(index) != strong
        };
        match (0..self.splits.len()).find(|&index| is_unassigned(index, &self.splits[index])) {
            Some(index) => {
                let split = &mut self.splits[index];
                let adjusted = Amount::from_minor(
                    split.amount.minor_units() - imbalance.minor_units(),
                    imbalance.currency().clone(),
                );
                split.set_amount(adjusted);
            }
            None => self.splits.push(Split::new(None, -&imbalance)),
        }
        let mut index = 0;
        self.splits.retain(|split| {
            let keep = !(is_unassigned(index, split) && split.amount.is_zero());
            index += 1;
            keep
        });
    }

    /// Fixes logical imbalances of a multi-currency transaction.
    ///
    /// Currencies never mix, so a transaction with nets on both sides is considered balanced.
    /// When every non-zero net sits on the same side, each one is cancelled by an unassigned
    /// split of its currency.
    pub fn balance_currencies(&mut self, strong: Option<usize>) {
        let mut nets: Vec<Amount> = Vec::new();
        for split in self.splits.iter().filter(|split| !split.amount.is_zero()) {
            match nets
                .iter_mut()
                .find(|net| net.currency() == split.amount.currency())
            {
                Some(net) => {
                    *net = Amount::from_minor(
                        net.minor_units() + split.amount.minor_units(),
                        net.currency().clone(),
                    )
                }
                None => nets.push(split.amount.clone()),
            }
        }
        nets.retain(|net| !net.is_zero());
        let Some(first) = nets.first() else {
            return;
        };
        let side = first.is_positive();
        if nets.iter().any(|net| net.is_positive() != side) {
            return;
        }
        let mut strong = strong;
        for net in nets {
            let found = (0..self.splits.len()).find(|&index| {
                let split = &self.splits[index];
                split.account.is_none()
                    && Some(index) != strong
                    && split.amount.is_of_currency(net.currency())
            });
            match found {
                Some(index) if self.splits[index].amount == net => {
                    self.splits.remove(index);
                    strong = strong.map(|s| if index < s { s - 1 } else { s });
                }
                Some(index) => {
                    let split = &mut self.splits[index];
                    let adjusted = Amount::from_minor(
                        split.amount.minor_units() - net.minor_units(),
                        net.currency().clone(),
                    );
                    split.set_amount(adjusted);
                }
                None => self.splits.push(Split::new(None, -&net)),
            }
        }
    }

    /// Balances a multi-currency transaction with exchange rates at the transaction date.
    ///
    /// Never called implicitly. Any remaining converted total lands on an unassigned split of
    /// `currency`.
    pub fn mct_balance(
        &mut self,
        currency: &Currency,
        fx: &dyn CurrencyConverter,
    ) -> LedgerResult<()> {
        let mut total = Amount::zero(currency.clone());
        for split in &self.splits {
            let converted = fx.convert(&split.amount, currency, self.date)?;
            total = total.checked_add(&converted)?;
        }
        if total.is_zero() {
            return Ok(());
        }
        debug!(txn = %self.id, imbalance = %total, "balancing with exchange rates");
        match self
            .splits
            .iter_mut()
            .find(|split| split.account.is_none() && split.amount.is_of_currency(currency))
        {
            Some(split) => {
                let adjusted = Amount::from_minor(
                    split.amount.minor_units() - total.minor_units(),
                    currency.clone(),
                );
                split.set_amount(adjusted);
            }
            None => self.splits.push(Split::new(None, -&total)),
        }
        Ok(())
    }

    /// Total amount moved: the sum of debits.
    ///
    /// For a multi-currency transaction this is an approximation: every split's magnitude is
    /// converted to the currency of the first non-null split and the sum is halved.
    pub fn amount(&self, fx: &dyn CurrencyConverter) -> LedgerResult<Amount> {
        if !self.is_mct() {
            return self.debit_total();
        }
        let currency = self.leading_currency();
        let mut total = Amount::zero(currency.clone());
        for split in self.splits.iter().filter(|split| !split.amount.is_zero()) {
            let converted = fx.convert(&split.amount.abs(), &currency, self.date)?;
            total = total.checked_add(&converted)?;
        }
        Ok(total.scale(Decimal::new(5, 1)))
    }

    /// Rebuilds a two-way transaction of `amount`, keeping the from and to accounts.
    ///
    /// Returns `false` without touching anything when [`Transaction::can_set_amount`] is false.
    pub fn set_amount(&mut self, amount: Amount) -> bool {
        if !self.can_set_amount() {
            debug!(txn = %self.id, "amount cannot be set on this transaction");
            return false;
        }
        if self.debit_total().map_or(false, |total| total == amount) {
            return true;
        }
        let debit_account = self
            .splits
            .iter()
            .find(|split| split.amount.is_positive())
            .and_then(|split| split.account);
        let credit_account = self
            .splits
            .iter()
            .find(|split| split.amount.is_negative())
            .and_then(|split| split.account);
        let opposite = -&amount;
        self.splits = vec![
            Split::new(debit_account, amount),
            Split::new(credit_account, opposite),
        ];
        true
    }

    /// At most two splits, all in one currency.
    pub fn can_set_amount(&self) -> bool {
        self.splits.len() <= 2 && !self.is_mct()
    }

    /// Whether non-null splits carry more than one currency.
    pub fn is_mct(&self) -> bool {
        let mut currencies = self
            .splits
            .iter()
            .filter(|split| !split.amount.is_zero())
            .map(|split| split.amount.currency());
        match currencies.next() {
            Some(first) => currencies.any(|currency| currency != first),
            None => false,
        }
    }

    pub fn is_null(&self) -> bool {
        self.splits.iter().all(|split| split.amount.is_zero())
    }

    pub fn has_unassigned_split(&self) -> bool {
        self.splits.iter().any(Split::is_unassigned)
    }

    /// Indices of the splits split into `(froms, tos)`.
    ///
    /// Negative splits are froms, positive ones tos. Null splits go to froms, except that the
    /// last one becomes the only to when there is no positive split.
    pub fn splitted_splits(&self) -> (Vec<usize>, Vec<usize>) {
        let mut froms = Vec::new();
        let mut tos = Vec::new();
        let mut nulls = Vec::new();
        for (index, split) in self.splits.iter().enumerate() {
            if split.amount.is_negative() {
                froms.push(index);
            } else if split.amount.is_positive() {
                tos.push(index);
            } else {
                nulls.push(index);
            }
        }
        if tos.is_empty() {
            if let Some(last) = nulls.pop() {
                tos.push(last);
            }
        }
        froms.extend(nulls);
        (froms, tos)
    }

    /// Replaces the splits with copies of `splits`, reconciliation included.
    pub fn set_splits(&mut self, splits: &[Split]) {
        self.splits = splits.to_vec();
    }

    /// Appends a split and returns its index. The caller balances afterwards.
    pub fn add_split(&mut self, split: Split) -> usize {
        self.splits.push(split);
        self.splits.len() - 1
    }

    /// Removes the split at `index` and re-balances.
    pub fn remove_split(&mut self, index: usize) -> Option<Split> {
        if index >= self.splits.len() {
            return None;
        }
        let removed = self.splits.remove(index);
        self.balance(None, false);
        Some(removed)
    }

    pub fn move_split(&mut self, from: usize, to: usize) {
        if from >= self.splits.len() {
            return;
        }
        let split = self.splits.remove(from);
        let to = to.min(self.splits.len());
        self.splits.insert(to, split);
    }

    pub fn affected_accounts(&self) -> HashSet<AccountId> {
        self.splits.iter().filter_map(|split| split.account).collect()
    }

    pub fn affects_account(&self, account: AccountId) -> bool {
        self.splits
            .iter()
            .any(|split| split.account == Some(account))
    }

    /// Sum of the splits assigned to `account`, converted to `currency` at the transaction date.
    pub fn amount_for_account(
        &self,
        account: AccountId,
        currency: &Currency,
        fx: &dyn CurrencyConverter,
    ) -> LedgerResult<Amount> {
        let mut total = Amount::zero(currency.clone());
        for split in self
            .splits
            .iter()
            .filter(|split| split.account == Some(account))
        {
            let converted = fx.convert(&split.amount, currency, self.date)?;
            total = total.checked_add(&converted)?;
        }
        Ok(total)
    }

    /// Whether any criterion of `query` matches.
    ///
    /// Description, payee and memo match on substrings, the check number and account names
    /// on the whole text.
    pub fn matches(&self, query: &TransactionQuery, accounts: &AccountBook) -> bool {
        let contains =
            |text: &str, needle: &str| text.to_lowercase().contains(&needle.to_lowercase());
        if let Some(description) = &query.description {
            if contains(&self.description, description) {
                return true;
            }
        }
        if let Some(payee) = &query.payee {
            if contains(&self.payee, payee) {
                return true;
            }
        }
        if let Some(checkno) = &query.checkno {
            if self.checkno.to_lowercase() == checkno.to_lowercase() {
                return true;
            }
        }
        if let Some(memo) = &query.memo {
            if self.splits.iter().any(|split| contains(&split.memo, memo)) {
                return true;
            }
        }
        if let Some(amount) = &query.amount {
            let wanted = amount.value();
            if self.splits.iter().any(|split| split.amount.value().abs() == wanted) {
                return true;
            }
        }
        if let Some(names) = &query.accounts {
            let names: Vec<String> = names.iter().map(|name| name.to_lowercase()).collect();
            let matched = self
                .splits
                .iter()
                .filter_map(|split| split.account)
                .filter_map(|id| accounts.get(id).ok())
                .any(|account| names.contains(&account.name.to_lowercase()));
            if matched {
                return true;
            }
        }
        false
    }

    /// Moves every split of `account` to `reassign_to`, clearing their reconciliation.
    pub fn reassign_account(&mut self, account: AccountId, reassign_to: Option<AccountId>) {
        for split in self
            .splits
            .iter_mut()
            .filter(|split| split.account == Some(account))
        {
            split.reconciliation_date = None;
            split.account = reassign_to;
        }
    }

    /// Applies a set of edits and keeps reconciliation dates consistent.
    pub fn change(&mut self, change: TransactionChange, clock: &dyn Clock) {
        if let Some(date) = change.date {
            for split in &mut self.splits {
                if split.reconciliation_date == Some(self.date) {
                    split.reconciliation_date = Some(date);
                }
            }
            if date > clock.today() {
                for split in &mut self.splits {
                    split.reconciliation_date = None;
                }
            }
            self.date = date;
        }
        if let Some(description) = change.description {
            self.description = description;
        }
        if let Some(payee) = change.payee {
            self.payee = payee;
        }
        if let Some(checkno) = change.checkno {
            self.checkno = checkno;
        }
        if let Some(notes) = change.notes {
            self.notes = notes;
        }
        // Set before from/to so that splitted_splits() does not see null splits.
        if let Some(amount) = change.amount {
            self.set_amount(amount.abs());
        }
        if let Some(from) = change.from {
            let (froms, _) = self.splitted_splits();
            if let [index] = froms.as_slice() {
                self.splits[*index].set_account(from);
            }
        }
        if let Some(to) = change.to {
            let (_, tos) = self.splitted_splits();
            if let [index] = tos.as_slice() {
                self.splits[*index].set_account(to);
            }
        }
        if let Some(currency) = change.currency {
            for split in self
                .splits
                .iter_mut()
                .filter(|split| !split.amount.is_of_currency(&currency))
            {
                split.amount = split.amount.with_currency(currency.clone());
                split.reconciliation_date = None;
            }
        }
        let date = self.date;
        for split in &mut self.splits {
            if let Some(reconciled) = split.reconciliation_date {
                split.reconciliation_date = Some(reconciled.max(date));
            }
        }
        self.mtime = Some(clock.now());
    }

    /// Sum of all splits. Only meaningful when the transaction is not multi-currency.
    fn net(&self) -> LedgerResult<Amount> {
        Amount::sum(
            self.splits.iter().map(|split| &split.amount),
            &self.leading_currency(),
        )
    }

    fn debit_total(&self) -> LedgerResult<Amount> {
        Amount::sum(
            self.splits
                .iter()
                .map(|split| &split.amount)
                .filter(|amount| amount.is_positive()),
            &self.leading_currency(),
        )
    }

    /// Currency of the first non-null split.
    fn leading_currency(&self) -> Currency {
        self.splits
            .iter()
            .find(|split| !split.amount.is_zero())
            .or_else(|| self.splits.first())
            .map(|split| split.amount.currency().clone())
            .unwrap_or_default()
    }
}
