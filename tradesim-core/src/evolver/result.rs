use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::decision::DecisionModule;
use crate::domain::{Portfolio, TradeHistory};
use crate::exchange::ExchangeData;
use crate::logging::LogSink;
use crate::settings::{EvolverSettings, TradingSettings};

/// Outcome of a run.
///
/// Empty until the run shuts down. A run whose setup failed keeps
/// `portfolio == None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvolverResult {
    pub portfolio: Option<Portfolio>,
    pub start_portfolio: Option<Portfolio>,
    /// Every intention submitted, keyed by submission time.
    pub decisions: TradeHistory,
    /// Every confirmed trade as executed, keyed by execution time.
    pub trades: TradeHistory,
}

impl EvolverResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when the run completed.
    pub fn is_complete(&self) -> bool {
        self.portfolio.is_some()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Everything an evolver needs to run.
pub struct EvolverInputs {
    pub settings: EvolverSettings,
    pub trading: TradingSettings,
    pub exchange: Arc<dyn ExchangeData>,
    pub decision: Box<dyn DecisionModule>,
    /// Starting portfolio. Built from `trading.starting_cash` when absent.
    pub portfolio: Option<Portfolio>,
    pub log: Arc<dyn LogSink>,
}

impl fmt::Debug for EvolverInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvolverInputs")
            .field("settings", &self.settings)
            .field("trading", &self.trading)
            .field("decision", &self.decision.name())
            .finish_non_exhaustive()
    }
}

impl EvolverInputs {
    pub fn new(
        settings: EvolverSettings,
        trading: TradingSettings,
        exchange: Arc<dyn ExchangeData>,
        decision: Box<dyn DecisionModule>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            settings,
            trading,
            exchange,
            decision,
            portfolio: None,
            log,
        }
    }

    pub fn with_portfolio(mut self, portfolio: Portfolio) -> Self {
        self.portfolio = Some(portfolio);
        self
    }

    pub(crate) fn starting_portfolio(&mut self) -> Portfolio {
        self.portfolio
            .take()
            .unwrap_or_else(|| Portfolio::new(self.trading.starting_cash))
    }
}
