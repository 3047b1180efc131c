//! Evolvers: the drivers that move a simulation through time.
//!
//! [`EventEvolver`] runs the scheduler-driven, publish/subscribe wiring.
//! [`TimeIncrementEvolver`] steps day by day synchronously. Both push every
//! intention through the same submission pipeline.

mod event;
mod result;
mod time_increment;

pub use event::EventEvolver;
pub use result::{EvolverInputs, EvolverResult};
pub use time_increment::{DayReport, TimeIncrementEvolver};

use crate::error::EvolverError;
use crate::logging::LogSink;

const CATEGORY: &str = "Evolver";

/// Log a setup failure once and hand it back.
fn setup_failed(log: &dyn LogSink, error: EvolverError) -> EvolverError {
    log.error(CATEGORY, &format!("setup failed: {error}"));
    error
}

/// Checks shared by both evolvers before anything is built.
fn validate_inputs(inputs: &result::EvolverInputs) -> Result<(), EvolverError> {
    inputs
        .settings
        .validate()
        .map_err(EvolverError::InvalidSettings)?;
    inputs
        .trading
        .validate()
        .map_err(EvolverError::InvalidSettings)?;
    inputs.exchange.validate()?;
    Ok(())
}
