//! Service lifecycle contract and the registry that broadcasts it.

mod manager;

pub use manager::{ServiceManager, ServiceState};

use crate::error::ServiceError;
use crate::settings::EvolverSettings;

/// A long-lived component with an explicit lifecycle.
///
/// Every step is broadcast by the [`ServiceManager`] in registration order.
pub trait Service: Send {
    fn name(&self) -> &str;

    /// Prepare for a run over `settings`. Called once before the scheduler
    /// starts.
    fn initialize(&mut self, settings: &EvolverSettings) -> Result<(), ServiceError>;

    /// Drop transient state and resume from the current time.
    fn restart(&mut self) -> Result<(), ServiceError>;

    /// Stop publishing and release transient state.
    fn shutdown(&mut self) -> Result<(), ServiceError>;
}
