//! Run orchestration: wires config, data, decision module and evolver.
//!
//! Two entry points:
//! - `run()`: loads candles as configured, then runs. Used by the CLI.
//! - `run_with_data()`: takes pre-loaded candles. Used by tests and benches.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use tradesim_core::logging::{LogFacade, LogSink};
use tradesim_core::{EventEvolver, EvolverError, EvolverInputs, EvolverResult, TimeIncrementEvolver};

use crate::config::{ConfigError, DecisionConfig, Driver, RunConfig, RunId};
use crate::data_loader::{load_candles, CandleSource, LoadError, LoadedData};
use crate::decision::build_decision;
use crate::metrics::RunMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("simulation failed: {0}")]
    Evolver(#[from] EvolverError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub driver: Driver,
    pub decision: DecisionConfig,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub sources: BTreeMap<String, CandleSource>,
    pub metrics: RunMetrics,
    pub result: EvolverResult,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Load the configured candles and run.
pub fn run(config: &RunConfig) -> Result<RunReport, RunError> {
    config.validate()?;
    let sim = &config.simulation;
    let from = config.data.history_start.unwrap_or(sim.start).min(sim.start);
    let loaded = load_candles(&config.data, &config.exchange, from, sim.end)?;
    run_with_data(config, loaded)
}

/// Run on already loaded candles. Engine log lines go to the `log` facade.
pub fn run_with_data(config: &RunConfig, loaded: LoadedData) -> Result<RunReport, RunError> {
    run_with_log(config, loaded, Arc::new(LogFacade))
}

/// Run on already loaded candles, reporting engine log lines to `log`.
pub fn run_with_log(
    config: &RunConfig,
    loaded: LoadedData,
    log: Arc<dyn LogSink>,
) -> Result<RunReport, RunError> {
    let run_id = config.run_id();
    let driver = config.simulation.driver;
    log::info!(
        "run {} ({driver}, {}) on {} symbol(s)",
        &run_id[..12],
        decision_label(&config.decision),
        loaded.sources.len()
    );

    let inputs = EvolverInputs::new(
        config.evolver_settings(),
        config.trading_settings(),
        Arc::new(loaded.data),
        build_decision(&config.decision),
        log,
    );
    let result = match driver {
        Driver::Event => EventEvolver::new(inputs)?.run()?,
        Driver::TimeIncrement => TimeIncrementEvolver::new(inputs)?.evolve(),
    };

    let metrics = RunMetrics::compute(&result);
    log::info!(
        "run {} finished: {} trades, final value {:.2}",
        &run_id[..12],
        metrics.trade_count,
        metrics.final_value
    );

    Ok(RunReport {
        schema_version: SCHEMA_VERSION,
        run_id,
        driver,
        decision: config.decision.clone(),
        dataset_hash: loaded.dataset_hash,
        has_synthetic: loaded.has_synthetic,
        sources: loaded.sources,
        metrics,
        result,
    })
}

fn decision_label(decision: &DecisionConfig) -> String {
    match decision {
        DecisionConfig::BuyAll => "buy_all".into(),
        DecisionConfig::Momentum { lookback } => format!("momentum({lookback})"),
    }
}
