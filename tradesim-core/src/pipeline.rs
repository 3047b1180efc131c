//! Order-submission pipeline: one intention in, at most one confirmed trade
//! out.
//!
//! 1. validate against the portfolio
//! 2. check available funds
//! 3. submit to the trade submitter
//! 4. apply the confirmed trade to the portfolio
//!
//! Recording (step 5) belongs to the caller through [`SubmissionRecords`].
//! No step aborts the run: every failure ends in a [`Rejection`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{SecurityTrade, Trade, TradeHistory};
use crate::events::{CompletionListener, TradeCompleted};
use crate::exchange::TradeSubmitter;
use crate::logging::LogSink;
use crate::portfolio_manager::{InvalidTrade, PortfolioManager};

const CATEGORY: &str = "OrderPipeline";

/// Where an intention stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Invalid(InvalidTrade),
    NoFunds,
    NotExecuted,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Invalid(reason) => write!(f, "invalid: {reason}"),
            Rejection::NoFunds => f.write_str("no funds available"),
            Rejection::NotExecuted => f.write_str("not executed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    pub time: DateTime<Utc>,
    pub intention: Trade,
    pub confirmed: Option<SecurityTrade>,
    pub rejection: Option<Rejection>,
}

impl SubmissionOutcome {
    fn rejected(time: DateTime<Utc>, intention: &Trade, rejection: Rejection) -> Self {
        Self {
            time,
            intention: intention.clone(),
            confirmed: None,
            rejection: Some(rejection),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed.is_some()
    }
}

/// Run one intention through validation, funds check, submission and
/// application.
pub fn submit_intention(
    time: DateTime<Utc>,
    intention: &Trade,
    portfolio: &mut PortfolioManager,
    submitter: &mut dyn TradeSubmitter,
    log: &dyn LogSink,
) -> SubmissionOutcome {
    let validated = match portfolio.validate_trade(time, intention) {
        Ok(trade) => trade,
        Err(reason) => {
            log.info(CATEGORY, &format!("{intention} rejected at {time}: {reason}"));
            return SubmissionOutcome::rejected(time, intention, Rejection::Invalid(reason));
        }
    };

    let funds = portfolio.available_funds();
    if funds <= 0.0 {
        log.info(CATEGORY, &format!("{intention} abandoned at {time}: no funds"));
        return SubmissionOutcome::rejected(time, intention, Rejection::NoFunds);
    }

    let confirmed = submitter.trade(time, &validated, portfolio.price_service(), funds, log);
    let Some(confirmed) = confirmed else {
        log.warning(CATEGORY, &format!("{validated} could not be executed at {time}"));
        return SubmissionOutcome::rejected(time, intention, Rejection::NotExecuted);
    };

    portfolio.add_trade(confirmed.clone());
    log.info(
        CATEGORY,
        &format!(
            "confirmed {} {} x{} @ {:.4}, cash {:.2}",
            confirmed.direction,
            confirmed.instrument,
            confirmed.quantity,
            confirmed.price,
            portfolio.available_funds()
        ),
    );
    SubmissionOutcome {
        time,
        intention: intention.clone(),
        confirmed: Some(confirmed),
        rejection: None,
    }
}

/// Decision and trade histories, both keyed by submission time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecords {
    pub decisions: TradeHistory,
    pub trades: TradeHistory,
}

impl SubmissionRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_intention(&mut self, time: DateTime<Utc>, intention: Trade) {
        self.decisions.add_trade(time, intention);
    }

    pub fn record_confirmed(&mut self, confirmed: &SecurityTrade) {
        self.trades.add_trade(confirmed.time, confirmed.executed());
    }

    /// Record both sides of an outcome.
    pub fn record(&mut self, outcome: &SubmissionOutcome) {
        self.record_intention(outcome.time, outcome.intention.clone());
        if let Some(confirmed) = &outcome.confirmed {
            self.record_confirmed(confirmed);
        }
    }
}

impl CompletionListener for SubmissionRecords {
    fn on_trade_completed(&mut self, trade: &TradeCompleted) {
        self.record_confirmed(trade);
    }
}
