mod common;

use common::{books, cad, date, usd, Books};
use ledger_core::ledger::{Split, Transaction, TransactionQuery};
use rust_decimal_macros::dec;

fn haircut(books: &Books) -> Transaction {
    let mut txn = Transaction::new(date(2020, 3, 2), "Haircut and beard", "Barber Shop", "0042");
    let mut paid = Split::new(Some(books.visa), usd(dec!(-25)));
    paid.memo = "Card ending 1234".into();
    txn.splits = vec![Split::new(Some(books.groceries), usd(dec!(25))), paid];
    txn
}

fn with_accounts(names: &[&str]) -> TransactionQuery {
    TransactionQuery {
        accounts: Some(names.iter().map(|name| name.to_string()).collect()),
        ..Default::default()
    }
}

#[test]
fn empty_query_matches_nothing() {
    let books = books();
    assert!(!haircut(&books).matches(&TransactionQuery::default(), &books.accounts));
}

#[test]
fn text_criteria_ignore_case() {
    let books = books();
    let txn = haircut(&books);
    let by = |query: TransactionQuery| txn.matches(&query, &books.accounts);

    assert!(by(TransactionQuery {
        description: Some("BEARD".into()),
        ..Default::default()
    }));
    assert!(by(TransactionQuery {
        payee: Some("barber".into()),
        ..Default::default()
    }));
    assert!(!by(TransactionQuery {
        payee: Some("florist".into()),
        ..Default::default()
    }));
    assert!(by(TransactionQuery {
        memo: Some("ending 1234".into()),
        ..Default::default()
    }));
}

#[test]
fn check_number_must_match_exactly() {
    let books = books();
    let txn = haircut(&books);
    let with_checkno = |checkno: &str| TransactionQuery {
        checkno: Some(checkno.into()),
        ..Default::default()
    };
    assert!(txn.matches(&with_checkno("0042"), &books.accounts));
    assert!(!txn.matches(&with_checkno("004"), &books.accounts));
}

#[test]
fn amounts_match_split_magnitudes() {
    let books = books();
    let txn = haircut(&books);
    let with_amount = |amount| TransactionQuery {
        amount: Some(amount),
        ..Default::default()
    };
    assert!(txn.matches(&with_amount(usd(dec!(25))), &books.accounts));
    assert!(txn.matches(&with_amount(cad(dec!(25.00))), &books.accounts));
    assert!(!txn.matches(&with_amount(usd(dec!(-25))), &books.accounts));
    assert!(!txn.matches(&with_amount(usd(dec!(24.99))), &books.accounts));
}

#[test]
fn account_names_match_whole_names() {
    let books = books();
    let txn = haircut(&books);
    assert!(txn.matches(&with_accounts(&["salary", "VISA"]), &books.accounts));
    assert!(!txn.matches(&with_accounts(&["vis"]), &books.accounts));
    assert!(!txn.matches(&with_accounts(&["checking"]), &books.accounts));
}

#[test]
fn any_matching_criterion_is_enough() {
    let books = books();
    let query = TransactionQuery {
        payee: Some("florist".into()),
        checkno: Some("0042".into()),
        ..Default::default()
    };
    assert!(haircut(&books).matches(&query, &books.accounts));
}
