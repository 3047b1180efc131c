//! Integration tests for the day-by-day evolver.
//!
//! Tests:
//! 1. BuyAll with constant prices: one confirmed buy, daily reports
//! 2. Sells before buys within one open
//! 3. Burn-in and increment control which days trade
//! 4. Same trades as the event-driven evolver for the same intentions
//! 5. Setup failures and a swapped-in submitter

mod common;

use chrono::{DateTime, Duration, Utc};
use common::{at, day, flat_exchange, inputs, settings, trading};
use tradesim_core::decision::{BuyAll, ScriptedDecisions};
use tradesim_core::domain::{SecurityTrade, Trade, TradeDirection};
use tradesim_core::exchange::{PriceService, TradeSubmitter};
use tradesim_core::logging::LogSink;
use tradesim_core::pipeline::Rejection;
use tradesim_core::{EventEvolver, EvolverError, TimeIncrementEvolver};

#[test]
fn buy_all_buys_once_and_reports_every_trading_day() {
    let data = flat_exchange(&[("AAA", 100.0)], 2, 12);
    let (inputs, _log) = inputs(settings(2, 12), trading(20_000.0, 10.0), data, BuyAll);
    let evolver = TimeIncrementEvolver::new(inputs).unwrap();

    let mut reports = Vec::new();
    let result = evolver.run(|r| reports.push(r.clone()));

    // 2nd-5th and 8th-11th.
    let dates: Vec<_> = reports.iter().map(|r| r.date).collect();
    assert_eq!(
        dates,
        vec![day(2), day(3), day(4), day(5), day(8), day(9), day(10), day(11)]
    );
    // Nothing is visible before the first close.
    assert!(reports[0].decisions.is_none());
    assert_eq!(reports[1].confirmed().count(), 1);
    assert!(reports[2..].iter().all(|r| r.confirmed().count() == 0));
    assert!(matches!(
        reports[2].outcomes[0].rejection,
        Some(Rejection::Invalid(_))
    ));

    let last = reports.last().unwrap();
    assert_eq!(last.cash, 90.0);
    assert_eq!(last.value, 90.0 + 199.0 * 100.0);

    assert_eq!(result.trades.trade_count(), 1);
    assert_eq!(result.decisions.trade_count(), 7);
    assert_eq!(result.portfolio.unwrap().holding("AAA"), 199.0);
}

#[test]
fn sells_run_before_buys_at_the_open() {
    let data = flat_exchange(&[("AAA", 100.0), ("BBB", 50.0)], 2, 12);
    let script = ScriptedDecisions::new()
        .on(day(3), [Trade::buy("AAA").with_quantity(10.0)])
        .on(day(4), [Trade::buy("BBB").with_quantity(10.0), Trade::sell("AAA")]);
    let (inputs, _log) = inputs(settings(2, 8), trading(100_000.0, 0.0), data, script);

    let mut day4 = None;
    let result = TimeIncrementEvolver::new(inputs)
        .unwrap()
        .run(|r| {
            if r.date == day(4) {
                day4 = Some(r.clone());
            }
        });

    let report = day4.unwrap();
    let directions: Vec<_> = report.outcomes.iter().map(|o| o.intention.direction).collect();
    assert_eq!(directions, vec![TradeDirection::Sell, TradeDirection::Buy]);
    assert!(report.outcomes.iter().all(|o| o.is_confirmed()));

    let portfolio = result.portfolio.unwrap();
    assert_eq!(portfolio.holding("AAA"), 0.0);
    assert_eq!(portfolio.holding("BBB"), 10.0);
}

#[test]
fn burn_in_days_are_not_traded() {
    let data = flat_exchange(&[("AAA", 100.0)], 2, 12);
    let script = ScriptedDecisions::new()
        .on(day(3), [Trade::buy("AAA").with_quantity(1.0)])
        .on(day(9), [Trade::buy("AAA").with_quantity(1.0)]);
    let settings = settings(2, 12).with_burn_in_end(at(8, 0, 0));
    let (inputs, _log) = inputs(settings, trading(10_000.0, 0.0), data, script);

    let mut dates = Vec::new();
    let result = TimeIncrementEvolver::new(inputs).unwrap().run(|r| dates.push(r.date));

    assert_eq!(dates.first(), Some(&day(8)));
    let times: Vec<_> = result.trades.iter().map(|(t, _)| *t).collect();
    assert_eq!(times, vec![at(9, 14, 30)]);
}

#[test]
fn increment_skips_days() {
    let data = flat_exchange(&[("AAA", 100.0)], 2, 12);
    let settings = settings(2, 12).with_increment(Duration::days(2));
    let (inputs, _log) = inputs(settings, trading(10_000.0, 0.0), data, BuyAll);

    let mut dates = Vec::new();
    TimeIncrementEvolver::new(inputs).unwrap().run(|r| dates.push(r.date));

    // 2nd, 4th, (6th Saturday), 8th, 10th.
    assert_eq!(dates, vec![day(2), day(4), day(8), day(10)]);
}

#[test]
fn matches_event_evolver_for_the_same_executions() {
    let intents = |d: u32| {
        [
            (d, vec![Trade::buy("AAA").with_quantity(20.0)]),
            (d + 1, vec![Trade::buy("BBB"), Trade::sell("AAA")]),
        ]
    };
    let data = || flat_exchange(&[("AAA", 100.0), ("BBB", 40.0)], 2, 12);
    let trading = tradesim_core::settings::TradingSettings {
        fraction_to_invest: 0.5,
        ..trading(30_000.0, 5.0)
    };

    // The event path decides at the close before the open it trades at.
    let mut event_script = ScriptedDecisions::new();
    for (d, trades) in intents(2) {
        event_script = event_script.on(day(d), trades);
    }
    let (event_inputs, _) = inputs(settings(2, 12), trading, data(), event_script);
    let event = EventEvolver::new(event_inputs).unwrap().run().unwrap();

    let mut stepped_script = ScriptedDecisions::new();
    for (d, trades) in intents(3) {
        stepped_script = stepped_script.on(day(d), trades);
    }
    let (stepped_inputs, _) = inputs(settings(2, 12), trading, data(), stepped_script);
    let stepped = TimeIncrementEvolver::new(stepped_inputs).unwrap().evolve();

    assert_eq!(event.trades, stepped.trades);
    assert_eq!(event.decisions, stepped.decisions);
    assert_eq!(
        event.portfolio.unwrap().cash_balance(),
        stepped.portfolio.unwrap().cash_balance()
    );
}

#[test]
fn failed_calibration_is_a_setup_error() {
    let data = flat_exchange(&[("AAA", 100.0)], 2, 12);
    let script = ScriptedDecisions::new().failing_calibration("not enough history");
    let (inputs, log) = inputs(settings(2, 12), trading(10_000.0, 0.0), data, script);

    let err = TimeIncrementEvolver::new(inputs).unwrap_err();

    match err {
        EvolverError::Calibration { module, .. } => assert_eq!(module, "Scripted"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(log.contains("not enough history"));
}

#[test]
fn invalid_settings_are_rejected() {
    let data = flat_exchange(&[("AAA", 100.0)], 2, 12);
    let (inputs, _log) = inputs(settings(12, 2), trading(10_000.0, 0.0), data, BuyAll);

    assert!(matches!(
        TimeIncrementEvolver::new(inputs),
        Err(EvolverError::InvalidSettings(_))
    ));
}

/// Submitter that never fills.
struct Refusing;

impl TradeSubmitter for Refusing {
    fn trade(
        &mut self,
        _time: DateTime<Utc>,
        _trade: &Trade,
        _prices: &dyn PriceService,
        _funds: f64,
        _log: &dyn LogSink,
    ) -> Option<SecurityTrade> {
        None
    }
}

#[test]
fn swapped_submitter_handles_every_trade() {
    let data = flat_exchange(&[("AAA", 100.0)], 2, 12);
    let (inputs, _log) = inputs(settings(2, 12), trading(10_000.0, 0.0), data, BuyAll);

    let result = TimeIncrementEvolver::new(inputs)
        .unwrap()
        .with_submitter(Box::new(Refusing))
        .evolve();

    assert!(result.trades.is_empty());
    assert_eq!(result.decisions.trade_count(), 7);
    assert_eq!(result.portfolio.unwrap().cash_balance(), 10_000.0);
}
