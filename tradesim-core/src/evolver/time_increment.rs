//! Synchronous day-by-day evolver.
//!
//! No scheduler and no streams: each trading day the evolver shows the
//! decision module the data up to the open, submits the resulting trades at
//! the open (sells first), then marks the portfolio to the close.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::sync::Arc;

use super::result::{EvolverInputs, EvolverResult};
use super::{setup_failed, validate_inputs};
use crate::decision::DecisionModule;
use crate::domain::{SecurityTrade, Trade, TradeCollection};
use crate::error::EvolverError;
use crate::exchange::{
    CostModel, ExchangeCalendar, ExchangeData, ExchangeSnapshot, HistoricalPriceService,
    PriceService, SimulatedExchange, TradeSubmitter,
};
use crate::logging::LogSink;
use crate::pipeline::{submit_intention, SubmissionOutcome, SubmissionRecords};
use crate::portfolio_manager::PortfolioManager;
use crate::settings::EvolverSettings;

const CATEGORY: &str = "TimeIncrementEvolver";

/// What happened on one trading day.
#[derive(Debug, Clone)]
pub struct DayReport {
    pub date: NaiveDate,
    pub open: DateTime<Utc>,
    pub close: DateTime<Utc>,
    pub decisions: Option<TradeCollection>,
    pub outcomes: Vec<SubmissionOutcome>,
    pub cash: f64,
    /// Cash plus holdings at the latest known closes.
    pub value: f64,
}

impl DayReport {
    pub fn confirmed(&self) -> impl Iterator<Item = &SecurityTrade> {
        self.outcomes.iter().filter_map(|o| o.confirmed.as_ref())
    }
}

pub struct TimeIncrementEvolver {
    settings: EvolverSettings,
    data: Arc<dyn ExchangeData>,
    decision: Box<dyn DecisionModule>,
    snapshot: ExchangeSnapshot,
    portfolio: PortfolioManager,
    submitter: Box<dyn TradeSubmitter>,
    records: SubmissionRecords,
    log: Arc<dyn LogSink>,
}

impl fmt::Debug for TimeIncrementEvolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeIncrementEvolver")
            .field("portfolio", &self.portfolio)
            .finish_non_exhaustive()
    }
}

impl TimeIncrementEvolver {
    /// Validate the inputs and calibrate the decision module.
    pub fn new(mut inputs: EvolverInputs) -> Result<Self, EvolverError> {
        let log = Arc::clone(&inputs.log);
        validate_inputs(&inputs).map_err(|e| setup_failed(log.as_ref(), e))?;

        let settings = inputs.settings.clone();
        let trading = inputs.trading;
        let data = Arc::clone(&inputs.exchange);
        let starting = inputs.starting_portfolio();
        let mut decision = inputs.decision;

        let history = ExchangeSnapshot::as_of(Arc::clone(&data), settings.trading_start());
        if let Err(source) = decision.calibrate(&settings, &history, log.as_ref()) {
            let module = decision.name().to_string();
            return Err(setup_failed(
                log.as_ref(),
                EvolverError::Calibration { module, source },
            ));
        }

        let prices: Arc<dyn PriceService> = Arc::new(
            HistoricalPriceService::new(Arc::clone(&data)).with_spread_bps(trading.spread_bps),
        );
        Ok(Self {
            snapshot: ExchangeSnapshot::as_of(Arc::clone(&data), settings.start),
            portfolio: PortfolioManager::new(starting, prices, trading, Arc::clone(&log)),
            submitter: Box::new(SimulatedExchange::new(CostModel::from_settings(&trading))),
            records: SubmissionRecords::new(),
            settings,
            data,
            decision,
            log,
        })
    }

    /// Replace the default simulated exchange.
    pub fn with_submitter(mut self, submitter: Box<dyn TradeSubmitter>) -> Self {
        self.submitter = submitter;
        self
    }

    pub fn portfolio_manager(&self) -> &PortfolioManager {
        &self.portfolio
    }

    /// Run to the end without observing the days.
    pub fn evolve(self) -> EvolverResult {
        self.run(|_| {})
    }

    /// Run to the end, handing each trading day's report to `on_day`.
    pub fn run(mut self, mut on_day: impl FnMut(&DayReport)) -> EvolverResult {
        let calendar = self.data.calendar().clone();
        let first = self.settings.trading_start();
        let step = self.settings.day_step();
        let last = self.settings.end.date_naive();
        self.log.info(
            CATEGORY,
            &format!("evolving {} .. {} in steps of {} day(s)", first, self.settings.end, step.num_days()),
        );

        let mut day = first.date_naive();
        let mut days = 0usize;
        while day <= last {
            if calendar.is_trading_day(day) {
                let open = calendar.open_on(day);
                if open >= first && open < self.settings.end {
                    let report = self.trade_day(day, &calendar);
                    on_day(&report);
                    days += 1;
                }
            }
            day += step;
        }

        self.log.info(
            CATEGORY,
            &format!("finished after {days} trading days, value {:.2}", self.portfolio.value()),
        );
        self.finish()
    }

    fn trade_day(&mut self, day: NaiveDate, calendar: &ExchangeCalendar) -> DayReport {
        let open = calendar.open_on(day);
        self.snapshot.advance_to(open);
        let decisions = self
            .decision
            .decide(open, &self.snapshot, self.log.as_ref())
            .filter(|c| !c.is_empty());

        let mut outcomes = Vec::new();
        if let Some(collection) = &decisions {
            let ordered: Vec<Trade> = collection.sells().into_iter().chain(collection.buys()).collect();
            for trade in &ordered {
                let outcome = submit_intention(
                    open,
                    trade,
                    &mut self.portfolio,
                    self.submitter.as_mut(),
                    self.log.as_ref(),
                );
                self.records.record(&outcome);
                outcomes.push(outcome);
            }
        }

        let close = calendar.close_on(day);
        let value = if close <= self.settings.end {
            self.snapshot.advance_to(close);
            let closes = self.snapshot.latest_closes();
            self.portfolio.update_valuation(close, &closes)
        } else {
            self.portfolio.value()
        };

        DayReport {
            date: day,
            open,
            close,
            decisions,
            outcomes,
            cash: self.portfolio.available_funds(),
            value,
        }
    }

    fn finish(self) -> EvolverResult {
        EvolverResult {
            portfolio: Some(self.portfolio.portfolio().clone()),
            start_portfolio: Some(self.portfolio.start_portfolio().clone()),
            decisions: self.records.decisions,
            trades: self.records.trades,
        }
    }
}
