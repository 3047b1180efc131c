//! TradeSim Runner: run configuration, data loading, metrics and artifacts.
//!
//! This crate builds on `tradesim-core` to provide:
//! - TOML run configs with content-addressed run ids
//! - Candle loading from CSV files or a deterministic synthetic walk
//! - Config-selectable decision modules
//! - One entry point that drives either evolver and computes run metrics
//! - JSON, CSV and Markdown artifact export

pub mod config;
pub mod data_loader;
pub mod decision;
pub mod export;
pub mod metrics;
pub mod runner;

pub use config::{ConfigError, DataConfig, DecisionConfig, Driver, RunConfig, RunId};
pub use data_loader::{load_candles, CandleSource, LoadError, LoadedData};
pub use decision::{build_decision, MomentumDecision};
pub use export::{load_artifacts, save_artifacts};
pub use metrics::RunMetrics;
pub use runner::{run, run_with_data, run_with_log, RunError, RunReport, SCHEMA_VERSION};
