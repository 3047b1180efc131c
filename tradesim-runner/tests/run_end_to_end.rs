//! End-to-end runs from a TOML config.
//!
//! Uses a flat CSV fixture written to a temp dir: AAA trades at 100 every
//! day of early January 2024.

use std::path::Path;
use std::sync::Arc;

use tradesim_core::logging::MemoryLog;
use tradesim_runner::config::{Driver, RunConfig};
use tradesim_runner::data_loader::{load_candles, CandleSource, LoadError};
use tradesim_runner::runner::{run, run_with_log, RunError};

fn write_flat_csv(dir: &Path, symbol: &str, price: f64) {
    let mut wtr = csv::Writer::from_path(dir.join(format!("{symbol}.csv"))).unwrap();
    wtr.write_record(["date", "open", "high", "low", "close", "volume"]).unwrap();
    // Weekend rows are present on purpose; the calendar drops them.
    for d in 2..=12 {
        let p = price.to_string();
        wtr.write_record([&format!("2024-01-{d:02}"), &p, &p, &p, &p, "1000"])
            .unwrap();
    }
    wtr.flush().unwrap();
}

fn flat_config(dir: &Path, driver: Driver) -> RunConfig {
    let toml = format!(
        r#"
[simulation]
start = "2024-01-02"
end = "2024-01-11"
driver = "{driver}"

[portfolio]
starting_cash = 20000.0
fraction_to_invest = 1.0
trade_fee = 10.0
slippage_bps = 0.0

[data]
source = "csv"
dir = "{}"
symbols = ["AAA"]
"#,
        dir.display().to_string().replace('\\', "/")
    );
    RunConfig::from_toml(&toml).unwrap()
}

#[test]
fn event_driver_buys_once_with_flat_prices() {
    let dir = tempfile::tempdir().unwrap();
    write_flat_csv(dir.path(), "AAA", 100.0);

    let report = run(&flat_config(dir.path(), Driver::Event)).unwrap();

    assert_eq!(report.driver, Driver::Event);
    assert!(!report.has_synthetic);
    assert_eq!(report.sources["AAA"], CandleSource::Csv);

    let portfolio = report.result.portfolio.as_ref().unwrap();
    assert_eq!(portfolio.holding("AAA"), 199.0);
    assert_eq!(portfolio.cash_balance(), 90.0);

    let m = &report.metrics;
    assert_eq!(m.trade_count, 1);
    assert_eq!((m.buy_count, m.sell_count), (1, 0));
    assert_eq!(m.decision_count, 7);
    assert_eq!(m.fees_paid, 10.0);
    assert_eq!(m.starting_value, 20_000.0);
    assert_eq!(m.final_value, 19_990.0);
    assert!((m.max_drawdown - (-0.0005)).abs() < 1e-12);
}

#[test]
fn both_drivers_end_in_the_same_portfolio() {
    let dir = tempfile::tempdir().unwrap();
    write_flat_csv(dir.path(), "AAA", 100.0);

    let event = run(&flat_config(dir.path(), Driver::Event)).unwrap();
    let stepped = run(&flat_config(dir.path(), Driver::TimeIncrement)).unwrap();

    assert_eq!(stepped.driver, Driver::TimeIncrement);
    assert_ne!(event.run_id, stepped.run_id);
    assert_eq!(event.dataset_hash, stepped.dataset_hash);

    let a = event.result.portfolio.as_ref().unwrap();
    let b = stepped.result.portfolio.as_ref().unwrap();
    assert_eq!(a.holding("AAA"), b.holding("AAA"));
    assert_eq!(a.cash_balance(), b.cash_balance());
    assert_eq!(event.metrics.final_value, stepped.metrics.final_value);
    assert_eq!(event.metrics.trade_count, stepped.metrics.trade_count);
}

#[test]
fn synthetic_momentum_run_is_deterministic() {
    let toml = r#"
[simulation]
start = "2024-02-01"
end = "2024-04-30"

[portfolio]
starting_cash = 100000.0
fraction_to_invest = 0.2
trade_fee = 1.0
slippage_bps = 5.0

[data]
source = "synthetic"
symbols = ["AAA", "BBB", "CCC"]
history_start = "2024-01-02"

[decision]
type = "momentum"
lookback = 10
"#;
    let config = RunConfig::from_toml(toml).unwrap();

    let first = run(&config).unwrap();
    let second = run(&config).unwrap();

    assert!(first.has_synthetic);
    assert_eq!(first, second);
    assert!(first.metrics.trade_count > 0);
    let portfolio = first.result.portfolio.as_ref().unwrap();
    assert!(portfolio.cash_balance() >= 0.0);
    assert!(first.metrics.max_drawdown <= 0.0);
}

#[test]
fn engine_log_lines_reach_the_given_sink() {
    let dir = tempfile::tempdir().unwrap();
    write_flat_csv(dir.path(), "AAA", 100.0);
    let config = flat_config(dir.path(), Driver::Event);
    let loaded = load_candles(
        &config.data,
        &config.exchange,
        config.simulation.start,
        config.simulation.end,
    )
    .unwrap();

    let log = Arc::new(MemoryLog::new());
    run_with_log(&config, loaded, log.clone()).unwrap();

    assert!(!log.entries().is_empty());
}

#[test]
fn missing_csv_is_a_data_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = run(&flat_config(dir.path(), Driver::Event)).unwrap_err();
    assert!(matches!(err, RunError::Data(LoadError::MissingFile { .. })));
}

#[test]
fn failed_calibration_surfaces_as_evolver_error() {
    let dir = tempfile::tempdir().unwrap();
    write_flat_csv(dir.path(), "AAA", 100.0);
    let mut config = flat_config(dir.path(), Driver::TimeIncrement);
    // Bypasses validation, which would reject the zero lookback up front.
    config.decision = tradesim_runner::DecisionConfig::Momentum { lookback: 0 };
    let loaded = load_candles(
        &config.data,
        &config.exchange,
        config.simulation.start,
        config.simulation.end,
    )
    .unwrap();

    let err = run_with_log(&config, loaded, Arc::new(MemoryLog::new())).unwrap_err();
    assert!(matches!(
        err,
        RunError::Evolver(tradesim_core::EvolverError::Calibration { .. })
    ));
}
