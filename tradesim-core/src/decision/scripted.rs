use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;

use super::DecisionModule;
use crate::domain::{Trade, TradeCollection};
use crate::error::DecisionError;
use crate::exchange::ExchangeSnapshot;
use crate::logging::LogSink;
use crate::settings::EvolverSettings;

/// Replays fixed intentions keyed by the date of the decision.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDecisions {
    script: BTreeMap<NaiveDate, Vec<Trade>>,
    calibration_error: Option<String>,
    calls: usize,
}

impl ScriptedDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `trades` to the intentions emitted on `date`.
    pub fn on(mut self, date: NaiveDate, trades: impl IntoIterator<Item = Trade>) -> Self {
        self.script.entry(date).or_default().extend(trades);
        self
    }

    /// Make `calibrate` fail with `reason`.
    pub fn failing_calibration(mut self, reason: impl Into<String>) -> Self {
        self.calibration_error = Some(reason.into());
        self
    }

    /// Number of `decide` calls so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl DecisionModule for ScriptedDecisions {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn calibrate(
        &mut self,
        _settings: &EvolverSettings,
        _snapshot: &ExchangeSnapshot,
        _log: &dyn LogSink,
    ) -> Result<(), DecisionError> {
        match &self.calibration_error {
            Some(reason) => Err(DecisionError::Calibration(reason.clone())),
            None => Ok(()),
        }
    }

    fn decide(
        &mut self,
        day: DateTime<Utc>,
        _snapshot: &ExchangeSnapshot,
        _log: &dyn LogSink,
    ) -> Option<TradeCollection> {
        self.calls += 1;
        let trades = self.script.get(&day.date_naive())?;
        Some(TradeCollection::from_trades(
            day,
            day + Duration::days(1),
            trades.iter().cloned(),
        ))
    }
}
