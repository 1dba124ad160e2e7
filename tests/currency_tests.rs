mod common;

use chrono::NaiveDate;
use common::{cad, date, temp_config_manager, usd, RATES};
use ledger_core::config::Config;
use ledger_core::currency::{Currency, CurrencyConverter, FxRate};
use ledger_core::errors::{LedgerError, LedgerResult};
use ledger_core::ledger::Amount;
use rust_decimal_macros::dec;

#[test]
fn configured_tolerance_bounds_rate_lookups() {
    let manager = temp_config_manager();
    manager
        .save(&Config {
            fx_tolerance_days: 3,
            ..Config::default()
        })
        .unwrap();
    let config = manager.load().unwrap();
    let mut book = config.fx_book();
    book.add_rate(FxRate::new(
        Currency::new("EUR"),
        config.base_currency(),
        date(2020, 6, 1),
        dec!(1.25),
    ));

    let eur = Amount::new(dec!(8), Currency::new("EUR"));
    let base = config.base_currency();
    assert_eq!(
        book.convert(&eur, &base, date(2020, 6, 4)).unwrap(),
        usd(dec!(10))
    );
    assert!(matches!(
        book.convert(&eur, &base, date(2020, 6, 5)),
        Err(LedgerError::RateNotFound { .. })
    ));
    assert!(matches!(
        book.convert(&eur, &base, date(2020, 5, 31)),
        Err(LedgerError::RateNotFound { .. })
    ));
}

#[test]
fn inverse_rates_are_used_and_rounded() {
    let converted = RATES
        .convert(&usd(dec!(10)), &Currency::new("CAD"), date(2020, 2, 15))
        .unwrap();
    assert_eq!(converted, cad(dec!(13.33)));
    let zero = RATES
        .convert(&usd(dec!(0)), &Currency::new("JPY"), date(1999, 1, 1))
        .unwrap();
    assert!(zero.is_zero());
    assert_eq!(zero.currency(), &Currency::new("JPY"));
}

#[test]
fn closures_act_as_converters() {
    let flat = |amount: &Amount, target: &Currency, _date: NaiveDate| -> LedgerResult<Amount> {
        Ok(Amount::new(amount.value() * dec!(2), target.clone()))
    };
    let converter: &dyn CurrencyConverter = &flat;
    assert_eq!(
        converter
            .convert(&cad(dec!(4.5)), &Currency::new("USD"), date(2020, 1, 1))
            .unwrap(),
        usd(dec!(9))
    );
}

#[test]
fn arithmetic_refuses_mixed_currencies() {
    let sum = usd(dec!(1)).checked_add(&cad(dec!(1)));
    assert!(matches!(sum, Err(LedgerError::CurrencyMismatch { .. })));
    assert!(usd(dec!(1)).try_cmp(&cad(dec!(2))).is_err());
    // Zero is neutral.
    assert_eq!(
        usd(dec!(3)).checked_add(&cad(dec!(0))).unwrap(),
        usd(dec!(3))
    );
}
