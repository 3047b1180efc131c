//! Error types for the engine.

use thiserror::Error;

use crate::scheduler::SchedulerError;

/// Problems with the historical exchange data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error("exchange data has no instruments")]
    NoInstruments,

    #[error("no candles for instrument {0}")]
    NoCandles(String),

    #[error("candles for {instrument} are not strictly increasing in time at index {index}")]
    Unordered { instrument: String, index: usize },

    #[error("candle for {instrument} at {time} fails OHLC sanity checks")]
    InsaneCandle { instrument: String, time: String },

    #[error("calendar closes before it opens")]
    InvalidCalendar,
}

/// Failure reported by a decision module.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecisionError {
    #[error("calibration failed: {0}")]
    Calibration(String),

    #[error("not enough history: need {needed} candles, have {available}")]
    InsufficientHistory { needed: usize, available: usize },
}

/// Failure in a service lifecycle step.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    #[error("service {service} failed to initialize: {reason}")]
    Initialize { service: String, reason: String },

    #[error("service {service} failed: {reason}")]
    Failed { service: String, reason: String },
}

/// Setup or run failure of an evolver.
#[derive(Debug, Error)]
pub enum EvolverError {
    #[error("invalid exchange data: {0}")]
    InvalidExchangeData(#[from] DataError),

    #[error("decision module {module} could not be calibrated: {source}")]
    Calibration {
        module: String,
        #[source]
        source: DecisionError,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("evolver setup already failed")]
    SetupFailed,
}
