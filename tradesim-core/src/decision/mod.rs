//! Decision modules: turn an exchange snapshot into trade intentions.

mod buy_all;
mod scripted;

pub use buy_all::BuyAll;
pub use scripted::ScriptedDecisions;

use chrono::{DateTime, Utc};

use crate::domain::TradeCollection;
use crate::error::DecisionError;
use crate::exchange::ExchangeSnapshot;
use crate::logging::LogSink;
use crate::settings::EvolverSettings;

/// Pluggable trading logic. The engine never looks inside.
pub trait DecisionModule: Send {
    fn name(&self) -> &str;

    /// One-time fit before the simulation starts. `snapshot` shows the data
    /// up to the end of the burn-in period.
    fn calibrate(
        &mut self,
        settings: &EvolverSettings,
        snapshot: &ExchangeSnapshot,
        log: &dyn LogSink,
    ) -> Result<(), DecisionError>;

    /// Intentions for the next session, or `None` to do nothing.
    fn decide(
        &mut self,
        day: DateTime<Utc>,
        snapshot: &ExchangeSnapshot,
        log: &dyn LogSink,
    ) -> Option<TradeCollection>;
}
