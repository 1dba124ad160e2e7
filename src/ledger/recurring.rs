use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::account::AccountId;
use super::time_interval::{DateCounter, RepeatType};
use super::transaction::{Origin, Transaction};

/// Per-occurrence exception of a [`Recurrence`], keyed by recurrence date.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LocalException {
    #[default]
    NoOverride,
    Deleted,
    Override(Transaction),
}

static NO_OVERRIDE: LocalException = LocalException::NoOverride;

/// A recurring transaction, also called a schedule.
///
/// The reference transaction is the template for every occurrence and its date is the
/// start date. Exceptions come in two kinds:
///
/// * local exceptions replace or delete exactly one occurrence;
/// * global changes replace the template from their occurrence onward, including the shift
///   between their date and their recurrence date.
///
/// Occurrences ("spawns") are cached per recurrence date until the rule, the template or an
/// exception changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recurrence {
    pub id: Uuid,
    reference: Transaction,
    repeat_type: RepeatType,
    repeat_every: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_date: Option<NaiveDate>,
    #[serde(default)]
    local_exceptions: BTreeMap<NaiveDate, LocalException>,
    #[serde(default)]
    global_changes: BTreeMap<NaiveDate, Transaction>,
    #[serde(skip)]
    spawn_cache: BTreeMap<NaiveDate, Transaction>,
}

impl Recurrence {
    pub fn new(reference: Transaction, repeat_type: RepeatType, repeat_every: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            reference,
            repeat_type,
            repeat_every: repeat_every.max(1),
            stop_date: None,
            local_exceptions: BTreeMap::new(),
            global_changes: BTreeMap::new(),
            spawn_cache: BTreeMap::new(),
        }
    }

    /// Builds a schedule from a stored repeat code, falling back to monthly.
    pub fn from_code(reference: Transaction, code: &str, repeat_every: u32) -> Self {
        Self::new(reference, RepeatType::from_code(code), repeat_every)
    }

    pub fn reference(&self) -> &Transaction {
        &self.reference
    }

    pub fn start_date(&self) -> NaiveDate {
        self.reference.date
    }

    pub fn repeat_type(&self) -> RepeatType {
        self.repeat_type
    }

    pub fn repeat_every(&self) -> u32 {
        self.repeat_every
    }

    pub fn label(&self) -> String {
        self.repeat_type.label(self.repeat_every, self.start_date())
    }

    pub fn local_exception(&self, date: NaiveDate) -> &LocalException {
        self.local_exceptions.get(&date).unwrap_or(&NO_OVERRIDE)
    }

    pub fn local_exceptions(&self) -> impl Iterator<Item = (&NaiveDate, &LocalException)> {
        self.local_exceptions.iter()
    }

    pub fn global_changes(&self) -> impl Iterator<Item = (&NaiveDate, &Transaction)> {
        self.global_changes.iter()
    }

    /// Occurrences from the start date up to `end`, exceptions applied.
    pub fn get_spawns(&mut self, end: NaiveDate) -> Vec<Transaction> {
        let id = self.id;
        self.collect_spawns(end, |template, recurrence_date| {
            Transaction::spawn(template, id, recurrence_date, recurrence_date, Origin::Spawn)
        })
    }

    /// Walks the schedule, creating missing occurrences with `make_spawn`.
    ///
    /// `end` is pushed to the last local exception and by the largest backward shift of a
    /// global change, so that moved occurrences are not missed, then clamped to the stop date.
    pub(crate) fn collect_spawns<F>(&mut self, end: NaiveDate, make_spawn: F) -> Vec<Transaction>
    where
        F: Fn(&Transaction, NaiveDate) -> Transaction,
    {
        let mut end = end;
        if let Some((&last, _)) = self.local_exceptions.iter().next_back() {
            end = end.max(last);
        }
        let min_delta = self
            .global_changes
            .iter()
            .map(|(&date, change)| change.date - date)
            .min();
        if let Some(delta) = min_delta.filter(|delta| *delta < Duration::zero()) {
            end = end.checked_add_signed(-delta).unwrap_or(NaiveDate::MAX);
        }
        if let Some(stop) = self.stop_date {
            end = end.min(stop);
        }

        let counter = DateCounter::new(self.start_date(), self.repeat_type, self.repeat_every, end);
        let mut result = Vec::new();
        let mut current_ref = &self.reference;
        let mut date_delta = Duration::zero();
        for current_date in counter {
            if let Some(change) = self.global_changes.get(&current_date) {
                current_ref = change;
                date_delta = change.date - current_date;
            }
            match self.local_exceptions.get(&current_date) {
                Some(LocalException::Override(txn)) => result.push(txn.clone()),
                Some(LocalException::Deleted) => {
                    trace!(recurrence = %self.id, date = %current_date, "skipping deleted occurrence");
                }
                Some(LocalException::NoOverride) | None => {
                    let spawn = self.spawn_cache.entry(current_date).or_insert_with(|| {
                        let mut spawn = make_spawn(current_ref, current_date);
                        if date_delta != Duration::zero() {
                            spawn.date = current_date
                                .checked_add_signed(date_delta)
                                .unwrap_or(current_date);
                        }
                        spawn
                    });
                    result.push(spawn.clone());
                }
            }
        }
        debug!(recurrence = %self.id, %end, count = result.len(), "generated spawns");
        result
    }

    /// Makes `spawn` the template for its occurrence and every later one.
    ///
    /// Later global changes and later local overrides are dropped; local deletions stay.
    pub fn change_globally(&mut self, spawn: Transaction) {
        let Some(date) = spawn.recurrence_date() else {
            warn!(txn = %spawn.id, "global change ignored: transaction is not a spawn");
            return;
        };
        self.global_changes.retain(|&key, _| key < date);
        self.local_exceptions.retain(|&key, exception| {
            key < date || matches!(exception, LocalException::Deleted)
        });
        self.global_changes.insert(date, spawn);
        debug!(recurrence = %self.id, %date, "recorded global change");
        self.update_reference();
    }

    /// Replaces exactly one occurrence with `spawn`.
    pub fn change_locally(&mut self, spawn: Transaction) {
        let Some(date) = spawn.recurrence_date() else {
            warn!(txn = %spawn.id, "local change ignored: transaction is not a spawn");
            return;
        };
        self.local_exceptions
            .insert(date, LocalException::Override(spawn));
        self.reset_spawn_cache();
        debug!(recurrence = %self.id, %date, "recorded local change");
    }

    pub fn delete(&mut self, spawn: &Transaction) {
        match spawn.recurrence_date() {
            Some(date) => self.delete_at(date),
            None => warn!(txn = %spawn.id, "delete ignored: transaction is not a spawn"),
        }
    }

    /// Prevents any occurrence at `date`.
    pub fn delete_at(&mut self, date: NaiveDate) {
        self.local_exceptions.insert(date, LocalException::Deleted);
        debug!(recurrence = %self.id, %date, "deleted occurrence");
        self.update_reference();
    }

    pub fn stop_at(&mut self, spawn: &Transaction) {
        if let Some(date) = spawn.recurrence_date() {
            self.stop_date = Some(date);
            self.reset_spawn_cache();
        }
    }

    pub fn stop_before(&mut self, spawn: &Transaction) {
        if let Some(date) = spawn.recurrence_date() {
            self.stop_date = date.pred_opt();
            self.reset_spawn_cache();
        }
    }

    pub fn set_repeat_type(&mut self, repeat_type: RepeatType) {
        if repeat_type == self.repeat_type {
            return;
        }
        self.repeat_type = repeat_type;
        self.reset_exceptions();
    }

    pub fn set_repeat_every(&mut self, repeat_every: u32) {
        let repeat_every = repeat_every.max(1);
        if repeat_every == self.repeat_every {
            return;
        }
        self.repeat_every = repeat_every;
        self.reset_exceptions();
    }

    pub fn set_start_date(&mut self, date: NaiveDate) {
        if date == self.reference.date {
            return;
        }
        self.reference.date = date;
        self.reset_exceptions();
    }

    /// Replaces the template. Its date becomes the start date.
    pub fn set_reference(&mut self, reference: Transaction) {
        self.reference = reference;
        self.reset_spawn_cache();
    }

    pub fn reset_exceptions(&mut self) {
        self.local_exceptions.clear();
        self.global_changes.clear();
        self.reset_spawn_cache();
    }

    pub fn reset_spawn_cache(&mut self) {
        self.spawn_cache.clear();
    }

    /// Accounts touched by the template or by any exception.
    pub fn affected_accounts(&self) -> HashSet<AccountId> {
        let mut accounts = self.reference.affected_accounts();
        for exception in self.exceptions() {
            accounts.extend(exception.affected_accounts());
        }
        accounts
    }

    pub fn reassign_account(&mut self, account: AccountId, reassign_to: Option<AccountId>) {
        self.reference.reassign_account(account, reassign_to);
        for exception in self.local_exceptions.values_mut() {
            if let LocalException::Override(txn) = exception {
                txn.reassign_account(account, reassign_to);
            }
        }
        for change in self.global_changes.values_mut() {
            change.reassign_account(account, reassign_to);
        }
        self.reset_spawn_cache();
    }

    /// Copy with a replicated template, the same exceptions and an empty cache.
    pub fn replicate(&self) -> Recurrence {
        Recurrence {
            id: self.id,
            reference: self.reference.replicate(),
            repeat_type: self.repeat_type,
            repeat_every: self.repeat_every,
            stop_date: self.stop_date,
            local_exceptions: self.local_exceptions.clone(),
            global_changes: self.global_changes.clone(),
            spawn_cache: BTreeMap::new(),
        }
    }

    /// Whether [`Recurrence::get_spawns`] can ever return anything.
    pub fn is_alive(&mut self) -> bool {
        match self.stop_date {
            None => true,
            Some(stop) => !self.get_spawns(stop).is_empty(),
        }
    }

    fn exceptions(&self) -> impl Iterator<Item = &Transaction> {
        let overrides = self
            .local_exceptions
            .values()
            .filter_map(|exception| match exception {
                LocalException::Override(txn) => Some(txn),
                _ => None,
            });
        overrides.chain(self.global_changes.values())
    }

    /// Rebases the template on the first live occurrence.
    ///
    /// A global change on that occurrence becomes the template; otherwise the template moves
    /// to its date. Exceptions that no longer lie strictly after the start date are dropped.
    fn update_reference(&mut self) {
        let counter = DateCounter::new(
            self.start_date(),
            self.repeat_type,
            self.repeat_every,
            NaiveDate::MAX,
        );
        for date in counter {
            if matches!(self.local_exceptions.get(&date), Some(LocalException::Deleted)) {
                continue;
            }
            match self.global_changes.get(&date) {
                Some(change) => {
                    let mut reference = change.replicate();
                    reference.origin = Origin::Plain;
                    self.reference = reference;
                }
                None => self.reference.date = date,
            }
            break;
        }
        let start = self.start_date();
        self.local_exceptions.retain(|&date, _| date > start);
        self.global_changes.retain(|&date, _| date > start);
        self.reset_spawn_cache();
        trace!(recurrence = %self.id, %start, "updated reference");
    }
}
