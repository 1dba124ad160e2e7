use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::account::{AccountBook, AccountId};
use super::amount::Amount;
use super::date_window::{prorate, DateWindow};
use super::recurring::Recurrence;
use super::time_interval::{DateCounter, RepeatType};
use super::transaction::{Origin, Split, Transaction};
use crate::currency::{Currency, CurrencyConverter};
use crate::errors::LedgerResult;
use crate::time::Clock;

/// Collaborators a projection needs: account polarity, exchange rates and the current date.
#[derive(Clone, Copy)]
pub struct ProjectionContext<'a> {
    pub accounts: &'a AccountBook,
    pub fx: &'a dyn CurrencyConverter,
    pub clock: &'a dyn Clock,
}

impl<'a> ProjectionContext<'a> {
    pub fn new(
        accounts: &'a AccountBook,
        fx: &'a dyn CurrencyConverter,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            accounts,
            fx,
            clock,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}

/// Regular budget for an income or expense account.
///
/// Each period yields one spawn whose recurrence date is the first day of the period and
/// whose effective date is the last one. The spawn only carries what is left of the budget
/// once the transactions already posted in the period are accounted for, and budgets never
/// project into the past.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub account: AccountId,
    /// Asset or liability receiving the other side of the budget, if any.
    pub target: Option<AccountId>,
    pub amount: Amount,
    #[serde(default)]
    pub notes: String,
    recurrence: Recurrence,
    #[serde(skip)]
    previous_spawns: Vec<Transaction>,
}

impl Budget {
    pub fn new(
        account: AccountId,
        target: Option<AccountId>,
        amount: Amount,
        start: NaiveDate,
        repeat_type: RepeatType,
    ) -> Self {
        Self {
            account,
            target,
            amount,
            notes: String::new(),
            recurrence: Recurrence::new(Transaction::new(start, "", "", ""), repeat_type, 1),
            previous_spawns: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.recurrence.id
    }

    pub fn recurrence(&self) -> &Recurrence {
        &self.recurrence
    }

    /// Schedule of the budget, for exception and rule edits.
    pub fn recurrence_mut(&mut self) -> &mut Recurrence {
        &mut self.recurrence
    }

    pub fn start_date(&self) -> NaiveDate {
        self.recurrence.start_date()
    }

    /// Spawns of the last [`Budget::get_spawns`] call.
    pub fn previous_spawns(&self) -> &[Transaction] {
        &self.previous_spawns
    }

    /// Future budget spawns up to `end`, reduced by the posted `transactions`.
    ///
    /// A transaction counts toward the period containing its date. Ids of counted
    /// transactions are added to `consumed` and ignored by later calls sharing the set, so
    /// two budgets on one account never count the same spending twice.
    pub fn get_spawns(
        &mut self,
        end: NaiveDate,
        transactions: &[Transaction],
        consumed: &mut HashSet<Uuid>,
        ctx: &ProjectionContext<'_>,
    ) -> LedgerResult<Vec<Transaction>> {
        let today = ctx.today();
        let account = ctx.accounts.get(self.account)?;
        let budget_amount = if account.is_debit_account() {
            self.amount.clone()
        } else {
            -&self.amount
        };
        let currency = budget_amount.currency().clone();

        let id = self.recurrence.id;
        let repeat_type = self.recurrence.repeat_type();
        let repeat_every = self.recurrence.repeat_every();
        let mut spawns = self.recurrence.collect_spawns(end, |template, recurrence_date| {
            let period_end = period_end(recurrence_date, repeat_type, repeat_every);
            Transaction::spawn(template, id, recurrence_date, period_end, Origin::BudgetSpawn)
        });
        spawns.retain(|spawn| spawn.date > today);

        let mut relevant: Vec<&Transaction> = transactions
            .iter()
            .filter(|txn| txn.affects_account(self.account) && !consumed.contains(&txn.id))
            .collect();
        for spawn in &mut spawns {
            let start = spawn.recurrence_date().unwrap_or(spawn.date);
            let period = DateWindow::new(start, spawn.date);
            let (taken, rest): (Vec<&Transaction>, Vec<&Transaction>) =
                relevant.into_iter().partition(|txn| period.contains(txn.date));
            relevant = rest;

            let mut posted = Amount::zero(currency.clone());
            for txn in &taken {
                let contribution = txn.amount_for_account(self.account, &currency, ctx.fx)?;
                posted = posted.checked_add(&contribution)?;
            }
            if posted.abs().try_cmp(&budget_amount.abs())?.is_lt() {
                let remaining = budget_amount.checked_sub(&posted)?;
                let opposite = -&remaining;
                spawn.set_splits(&[
                    Split::new(Some(self.account), remaining),
                    Split::new(self.target, opposite),
                ]);
            } else {
                spawn.set_splits(&[]);
            }
            debug!(
                budget = %id,
                period_start = %start,
                period_end = %spawn.date,
                posted = %posted,
                consumed = taken.len(),
                "computed budget spawn"
            );
            consumed.extend(taken.iter().map(|txn| txn.id));
        }
        self.previous_spawns = spawns.clone();
        Ok(spawns)
    }

    /// Budgeted amount for `range`, pro-rated from the spawns of the last
    /// [`Budget::get_spawns`] call over their future part.
    ///
    /// Spawns must have been generated far enough to cover `range`.
    pub fn amount_for_date_range(
        &self,
        range: &DateWindow,
        currency: &Currency,
        ctx: &ProjectionContext<'_>,
    ) -> LedgerResult<Amount> {
        let tomorrow = ctx.today().succ_opt().unwrap_or(NaiveDate::MAX);
        let mut total = Amount::zero(currency.clone());
        for spawn in &self.previous_spawns {
            let amount = spawn.amount_for_account(self.account, currency, ctx.fx)?;
            if amount.is_zero() {
                continue;
            }
            let start = spawn.recurrence_date().unwrap_or(spawn.date).max(tomorrow);
            let spread = DateWindow::new(start, spawn.date);
            total = total.checked_add(&prorate(&amount, &spread, range))?;
        }
        Ok(total)
    }
}

/// Day before the period following the one starting at `start`.
fn period_end(start: NaiveDate, repeat_type: RepeatType, repeat_every: u32) -> NaiveDate {
    DateCounter::new(start, repeat_type, repeat_every, NaiveDate::MAX)
        .nth(1)
        .and_then(|next| next.pred_opt())
        .unwrap_or(start)
}

/// The budgets of a ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetList {
    budgets: Vec<Budget>,
}

impl BudgetList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, budget: Budget) {
        self.budgets.push(budget);
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Budget> {
        let index = self.budgets.iter().position(|budget| budget.id() == id)?;
        Some(self.budgets.remove(index))
    }

    pub fn len(&self) -> usize {
        self.budgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Budget> {
        self.budgets.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Budget> {
        self.budgets.iter_mut()
    }

    /// Spawns of every budget up to `end`, sharing one consumed set.
    pub fn get_spawns(
        &mut self,
        end: NaiveDate,
        transactions: &[Transaction],
        ctx: &ProjectionContext<'_>,
    ) -> LedgerResult<Vec<Transaction>> {
        let mut consumed = HashSet::new();
        let mut spawns = Vec::new();
        for budget in &mut self.budgets {
            spawns.extend(budget.get_spawns(end, transactions, &mut consumed, ctx)?);
        }
        Ok(spawns)
    }

    /// Sum of the budgets of `account` over `range`, in `currency` or the account's own.
    ///
    /// Zero when no part of `range` lies in the future.
    pub fn amount_for_account(
        &self,
        account: AccountId,
        range: &DateWindow,
        currency: Option<&Currency>,
        ctx: &ProjectionContext<'_>,
    ) -> LedgerResult<Amount> {
        let currency = match currency {
            Some(currency) => currency.clone(),
            None => ctx.accounts.get(account)?.currency.clone(),
        };
        let mut total = Amount::zero(currency.clone());
        if range.future(ctx.today()).is_empty() {
            return Ok(total);
        }
        for budget in self
            .budgets
            .iter()
            .filter(|budget| budget.account == account && !budget.amount.is_zero())
        {
            total = total.checked_add(&budget.amount_for_date_range(range, &currency, ctx)?)?;
        }
        Ok(total)
    }

    /// [`BudgetList::amount_for_account`] with the sign flipped for credit accounts.
    pub fn normal_amount_for_account(
        &self,
        account: AccountId,
        range: &DateWindow,
        currency: Option<&Currency>,
        ctx: &ProjectionContext<'_>,
    ) -> LedgerResult<Amount> {
        let amount = self.amount_for_account(account, range, currency, ctx)?;
        Ok(ctx.accounts.get(account)?.normalize_amount(&amount))
    }

    pub fn budgets_for_target(&self, target: AccountId) -> Vec<&Budget> {
        self.budgets
            .iter()
            .filter(|budget| budget.target == Some(target))
            .collect()
    }
}
