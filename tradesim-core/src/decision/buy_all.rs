use chrono::{DateTime, Duration, Utc};

use super::DecisionModule;
use crate::domain::{Trade, TradeCollection};
use crate::error::DecisionError;
use crate::exchange::ExchangeSnapshot;
use crate::logging::LogSink;
use crate::settings::EvolverSettings;

/// Buys every instrument with price history, every day.
#[derive(Debug, Clone, Default)]
pub struct BuyAll;

impl DecisionModule for BuyAll {
    fn name(&self) -> &str {
        "BuyAll"
    }

    fn calibrate(
        &mut self,
        _settings: &EvolverSettings,
        _snapshot: &ExchangeSnapshot,
        _log: &dyn LogSink,
    ) -> Result<(), DecisionError> {
        Ok(())
    }

    fn decide(
        &mut self,
        day: DateTime<Utc>,
        snapshot: &ExchangeSnapshot,
        _log: &dyn LogSink,
    ) -> Option<TradeCollection> {
        let trades = snapshot
            .instruments()
            .filter(|i| snapshot.latest(i).is_some())
            .map(Trade::buy);
        let collection = TradeCollection::from_trades(day, day + Duration::days(1), trades);
        (!collection.is_empty()).then_some(collection)
    }
}
