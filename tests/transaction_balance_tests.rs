mod common;

use std::collections::HashMap;

use common::{books, cad, date, usd, RATES};
use ledger_core::currency::Currency;
use ledger_core::ledger::{Recurrence, RepeatType, Split, Transaction, TransactionChange};
use ledger_core::time::FixedClock;
use rust_decimal_macros::dec;

/// Every currency nets to zero, unless non-zero nets sit on both sides.
fn assert_balanced(txn: &Transaction) {
    let mut nets: HashMap<Currency, i64> = HashMap::new();
    for split in txn.splits.iter().filter(|split| !split.amount().is_zero()) {
        *nets.entry(split.amount().currency().clone()).or_default() +=
            split.amount().minor_units();
    }
    let open: Vec<i64> = nets.values().copied().filter(|net| *net != 0).collect();
    let both_sides = open.iter().any(|net| *net > 0) && open.iter().any(|net| *net < 0);
    assert!(
        open.is_empty() || both_sides,
        "unbalanced transaction: {:?}",
        nets
    );
}

#[test]
fn balancing_always_leaves_a_balanced_transaction() {
    let books = books();
    let cases = vec![
        vec![Split::new(Some(books.groceries), usd(dec!(12.34)))],
        vec![
            Split::new(Some(books.groceries), usd(dec!(10))),
            Split::new(Some(books.checking), usd(dec!(10))),
        ],
        vec![
            Split::new(Some(books.groceries), usd(dec!(10))),
            Split::new(None, usd(dec!(3))),
            Split::new(Some(books.checking), usd(dec!(-20))),
        ],
        vec![
            Split::new(Some(books.groceries), usd(dec!(10))),
            Split::new(Some(books.visa), cad(dec!(7))),
        ],
        vec![
            Split::new(Some(books.groceries), usd(dec!(10))),
            Split::new(Some(books.checking), usd(dec!(-10))),
            Split::new(Some(books.visa), cad(dec!(-7))),
        ],
        vec![Split::new(None, usd(dec!(0))), Split::new(None, cad(dec!(0)))],
    ];
    for splits in cases {
        let mut txn = Transaction::new(date(2020, 1, 5), "case", "", "");
        txn.splits = splits;
        txn.balance(None, false);
        assert_balanced(&txn);
        for strong in 0..txn.splits.len() {
            let mut edited = txn.clone();
            edited.balance(Some(strong), false);
            assert_balanced(&edited);
        }
    }
}

#[test]
fn strong_split_is_never_adjusted() {
    let books = books();
    let mut txn = Transaction::new(date(2020, 1, 5), "lunch", "", "");
    txn.splits = vec![
        Split::new(Some(books.groceries), usd(dec!(10))),
        Split::new(None, usd(dec!(-10))),
        Split::new(Some(books.checking), usd(dec!(-5))),
    ];
    txn.balance(Some(1), false);
    assert_eq!(txn.splits[1].amount(), &usd(dec!(-10)));
    assert_eq!(txn.splits.len(), 4);
    assert_eq!(txn.splits[3].amount(), &usd(dec!(5)));
    assert_balanced(&txn);
}

#[test]
fn mct_with_one_sided_currency_gets_an_unassigned_split() {
    let books = books();
    let mut txn = Transaction::new(date(2020, 1, 5), "transfer", "", "");
    txn.splits = vec![
        Split::new(Some(books.checking), usd(dec!(-10))),
        Split::new(Some(books.visa), cad(dec!(13))),
        Split::new(Some(books.groceries), cad(dec!(-13))),
        Split::new(Some(books.groceries), usd(dec!(-2))),
    ];
    txn.balance(None, false);
    assert_eq!(txn.splits.len(), 5);
    assert!(txn.splits[4].is_unassigned());
    assert_eq!(txn.splits[4].amount(), &usd(dec!(12)));
    assert_balanced(&txn);
}

#[test]
fn replicate_and_detach_keep_content_without_sharing_splits() {
    let books = books();
    let mut original = Transaction::with_amount(
        date(2020, 2, 3),
        "groceries",
        Some(books.groceries),
        usd(dec!(42)),
    );
    original.payee = "Market".into();
    original.checkno = "101".into();

    let mut copy = original.replicate();
    assert_eq!(copy, original);
    copy.splits[0].set_amount(usd(dec!(1)));
    assert_eq!(original.splits[0].amount(), &usd(dec!(42)));

    let mut recurrence = Recurrence::new(original.clone(), RepeatType::Monthly, 1);
    let spawn = recurrence.get_spawns(date(2020, 2, 3)).remove(0);
    assert!(spawn.is_spawn());
    let detached = spawn.detach();
    assert!(!detached.is_spawn());
    assert_ne!(detached.id, spawn.id);
    assert_eq!(detached.date, original.date);
    assert_eq!(detached.description, original.description);
    assert_eq!(detached.payee, original.payee);
    assert_eq!(detached.checkno, original.checkno);
    assert_eq!(detached.splits, spawn.splits);
}

#[test]
fn amounts_per_account_are_converted() {
    let books = books();
    let mut txn = Transaction::new(date(2020, 3, 10), "trip", "", "");
    txn.splits = vec![
        Split::new(Some(books.groceries), cad(dec!(40))),
        Split::new(Some(books.groceries), usd(dec!(5))),
        Split::new(Some(books.checking), usd(dec!(-35))),
    ];
    let usd_currency = Currency::new("USD");
    let total = txn
        .amount_for_account(books.groceries, &usd_currency, &*RATES)
        .unwrap();
    assert_eq!(total, usd(dec!(35)));
    assert!(txn.is_mct());
    assert!(!txn.can_set_amount());
    // Halved sum of 40 CAD, 5 USD and 35 USD, all priced in CAD.
    assert_eq!(txn.amount(&*RATES).unwrap(), cad(dec!(46.67)));
}

#[test]
fn missing_rates_surface_as_errors() {
    let books = books();
    let mut txn = Transaction::new(date(2019, 6, 1), "old", "", "");
    txn.splits = vec![
        Split::new(Some(books.groceries), cad(dec!(40))),
        Split::new(Some(books.checking), usd(dec!(-30))),
    ];
    let result = txn.amount_for_account(books.groceries, &Currency::new("USD"), &*RATES);
    assert!(matches!(
        result,
        Err(ledger_core::errors::LedgerError::RateNotFound { .. })
    ));
}

#[test]
fn change_keeps_reconciliation_consistent() {
    let books = books();
    let clock = FixedClock::new(date(2020, 5, 1));
    let mut txn = Transaction::with_amount(
        date(2020, 4, 1),
        "rent",
        Some(books.groceries),
        usd(dec!(800)),
    );
    txn.splits[1].set_account(Some(books.checking));
    txn.splits[0].reconciliation_date = Some(date(2020, 3, 20));
    txn.change(
        TransactionChange {
            description: Some("Rent".into()),
            amount: Some(usd(dec!(850))),
            to: Some(Some(books.visa)),
            ..Default::default()
        },
        &clock,
    );
    assert_eq!(txn.description, "Rent");
    assert_eq!(txn.splits[0].account(), Some(books.visa));
    assert_eq!(txn.splits[0].amount(), &usd(dec!(850)));
    assert_eq!(txn.splits[1].account(), Some(books.checking));
    assert!(txn.splits.iter().all(|split| split
        .reconciliation_date
        .map_or(true, |reconciled| reconciled >= txn.date)));
}
