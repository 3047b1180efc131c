//! Decision modules selectable from a run config.

use chrono::{DateTime, Duration, Utc};

use tradesim_core::decision::{BuyAll, DecisionModule};
use tradesim_core::domain::{Trade, TradeCollection, TradeDirection};
use tradesim_core::error::DecisionError;
use tradesim_core::exchange::ExchangeSnapshot;
use tradesim_core::logging::LogSink;
use tradesim_core::settings::EvolverSettings;

use crate::config::DecisionConfig;

/// Instantiate the configured decision module.
pub fn build_decision(config: &DecisionConfig) -> Box<dyn DecisionModule> {
    match config {
        DecisionConfig::BuyAll => Box::new(BuyAll),
        DecisionConfig::Momentum { lookback } => Box::new(MomentumDecision::new(*lookback)),
    }
}

/// Trailing-mean momentum.
///
/// Buys an instrument whose latest close is above the mean of its last
/// `lookback` closes and sells one whose latest close is below it. Instruments
/// with less history are left alone.
#[derive(Debug, Clone)]
pub struct MomentumDecision {
    lookback: usize,
}

impl MomentumDecision {
    pub fn new(lookback: usize) -> Self {
        Self { lookback }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    fn signal(&self, closes: &[f64]) -> Option<TradeDirection> {
        let (&last, _) = closes.split_last()?;
        if closes.len() < self.lookback {
            return None;
        }
        let mean = closes.iter().sum::<f64>() / closes.len() as f64;
        if last > mean {
            Some(TradeDirection::Buy)
        } else if last < mean {
            Some(TradeDirection::Sell)
        } else {
            None
        }
    }
}

impl DecisionModule for MomentumDecision {
    fn name(&self) -> &str {
        "Momentum"
    }

    fn calibrate(
        &mut self,
        _settings: &EvolverSettings,
        snapshot: &ExchangeSnapshot,
        log: &dyn LogSink,
    ) -> Result<(), DecisionError> {
        if self.lookback == 0 {
            return Err(DecisionError::Calibration("lookback must be positive".into()));
        }
        let shortest = snapshot
            .instruments()
            .map(|i| snapshot.candles(i).len())
            .min()
            .unwrap_or(0);
        if shortest < self.lookback {
            log.info(
                self.name(),
                &format!(
                    "{shortest} candles of history for a lookback of {}; first signals come later",
                    self.lookback
                ),
            );
        }
        Ok(())
    }

    fn decide(
        &mut self,
        day: DateTime<Utc>,
        snapshot: &ExchangeSnapshot,
        _log: &dyn LogSink,
    ) -> Option<TradeCollection> {
        let trades = snapshot.instruments().filter_map(|instrument| {
            let closes = snapshot.closes(instrument, self.lookback);
            self.signal(&closes)
                .map(|direction| Trade::new(instrument, direction, 0.0))
        });
        let collection = TradeCollection::from_trades(day, day + Duration::days(1), trades);
        (!collection.is_empty()).then_some(collection)
    }
}
