//! TradeSim Core: clock, scheduler, services, order pipeline and evolvers.
//!
//! This crate contains the simulation engine:
//! - Domain types (candles, trades, trade collections, portfolios)
//! - Simulated and real-time clocks with a timed event scheduler
//! - Publish/subscribe event streams and the service lifecycle
//! - Historical price feed, exchange session tracker and simulated exchange
//! - Execution strategy that decides at the close and trades at the next open
//! - Order pipeline: validate, check funds, submit, apply
//! - Event-driven and day-by-day evolvers

pub mod clock;
pub mod decision;
pub mod domain;
pub mod error;
pub mod events;
pub mod evolver;
pub mod exchange;
pub mod logging;
pub mod order_listener;
pub mod pipeline;
pub mod portfolio_manager;
pub mod scheduler;
pub mod service;
pub mod settings;
pub mod strategy;
pub mod sync;

pub use error::{DataError, DecisionError, EvolverError, ServiceError};
pub use evolver::{EventEvolver, EvolverInputs, EvolverResult, TimeIncrementEvolver};
