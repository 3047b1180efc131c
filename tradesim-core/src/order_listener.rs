//! Order listener: runs submitted trades through the pipeline.

use std::sync::{Arc, Mutex};

use crate::error::ServiceError;
use crate::events::{SubmissionListener, TradeSubmission};
use crate::exchange::TradeSubmitter;
use crate::logging::LogSink;
use crate::pipeline::{submit_intention, SubmissionOutcome, SubmissionRecords};
use crate::portfolio_manager::PortfolioManager;
use crate::service::Service;
use crate::settings::EvolverSettings;
use crate::sync::lock;

pub const ORDER_LISTENER: &str = "OrderListener";

/// Receives `trade_submitted` events from the strategy.
///
/// The intention is recorded whatever happens to it. Confirmed trades reach
/// the records through the exchange's `trade_completed` stream, subscribed to
/// [`OrderListener::recorder`] at wiring time. Once shut down, submissions
/// are dropped with a warning.
pub struct OrderListener {
    portfolio: Arc<Mutex<PortfolioManager>>,
    submitter: Arc<Mutex<dyn TradeSubmitter>>,
    records: Arc<Mutex<SubmissionRecords>>,
    log: Arc<dyn LogSink>,
    active: bool,
    submitted: usize,
    confirmed: usize,
}

impl OrderListener {
    pub fn new(
        portfolio: Arc<Mutex<PortfolioManager>>,
        submitter: Arc<Mutex<dyn TradeSubmitter>>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            portfolio,
            submitter,
            records: Arc::new(Mutex::new(SubmissionRecords::new())),
            log,
            active: true,
            submitted: 0,
            confirmed: 0,
        }
    }

    /// Shared records, written by this listener and the completion stream.
    pub fn recorder(&self) -> Arc<Mutex<SubmissionRecords>> {
        Arc::clone(&self.records)
    }

    pub fn submitted(&self) -> usize {
        self.submitted
    }

    pub fn confirmed(&self) -> usize {
        self.confirmed
    }

    fn submit(&mut self, submission: &TradeSubmission) -> SubmissionOutcome {
        let mut portfolio = lock(&self.portfolio);
        let mut submitter = lock(&self.submitter);
        submit_intention(
            submission.time,
            &submission.trade,
            &mut portfolio,
            &mut *submitter,
            self.log.as_ref(),
        )
    }
}

impl SubmissionListener for OrderListener {
    fn on_trade_submitted(&mut self, submission: &TradeSubmission) {
        if !self.active {
            self.log.warning(
                ORDER_LISTENER,
                &format!("{} dropped: listener is shut down", submission.trade),
            );
            return;
        }
        let outcome = self.submit(submission);
        self.submitted += 1;
        if outcome.is_confirmed() {
            self.confirmed += 1;
        }
        lock(&self.records).record_intention(outcome.time, outcome.intention);
    }
}

impl Service for OrderListener {
    fn name(&self) -> &str {
        ORDER_LISTENER
    }

    fn initialize(&mut self, _settings: &EvolverSettings) -> Result<(), ServiceError> {
        self.active = true;
        self.submitted = 0;
        self.confirmed = 0;
        Ok(())
    }

    fn restart(&mut self) -> Result<(), ServiceError> {
        self.active = true;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ServiceError> {
        self.active = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Portfolio, Trade};
    use crate::exchange::{CostModel, PriceService, SimulatedExchange};
    use crate::logging::MemoryLog;
    use crate::settings::TradingSettings;
    use chrono::{DateTime, TimeZone, Utc};

    struct Fixed(f64);

    impl PriceService for Fixed {
        fn ask_price(&self, _: DateTime<Utc>, _: &str) -> Option<f64> {
            Some(self.0)
        }
        fn bid_price(&self, _: DateTime<Utc>, _: &str) -> Option<f64> {
            Some(self.0)
        }
    }

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap()
    }

    fn listener(log: Arc<MemoryLog>) -> OrderListener {
        let pm = PortfolioManager::new(
            Portfolio::new(1_000.0),
            Arc::new(Fixed(10.0)),
            TradingSettings::default(),
            log.clone(),
        );
        let submitter: Arc<Mutex<dyn TradeSubmitter>> =
            Arc::new(Mutex::new(SimulatedExchange::new(CostModel::frictionless())));
        OrderListener::new(Arc::new(Mutex::new(pm)), submitter, log)
    }

    fn submission(trade: Trade) -> TradeSubmission {
        TradeSubmission { time: t(), trade }
    }

    #[test]
    fn shut_down_listener_drops_submissions() {
        let log = Arc::new(MemoryLog::new());
        let mut listener = listener(log.clone());
        listener.on_trade_submitted(&submission(Trade::buy("AAA").with_quantity(1.0)));
        assert_eq!((listener.submitted(), listener.confirmed()), (1, 1));

        listener.shutdown().unwrap();
        listener.on_trade_submitted(&submission(Trade::buy("AAA").with_quantity(1.0)));

        assert_eq!(listener.submitted(), 1);
        assert_eq!(lock(&listener.recorder()).decisions.trade_count(), 1);
        assert!(log.contains("listener is shut down"));
    }

    #[test]
    fn initialize_reactivates_and_resets_counters() {
        let log = Arc::new(MemoryLog::new());
        let mut listener = listener(log);
        listener.on_trade_submitted(&submission(Trade::sell("AAA")));
        listener.shutdown().unwrap();

        let settings = EvolverSettings::new(t(), t());
        listener.initialize(&settings).unwrap();
        assert_eq!((listener.submitted(), listener.confirmed()), (0, 0));

        listener.on_trade_submitted(&submission(Trade::buy("AAA").with_quantity(2.0)));
        assert_eq!((listener.submitted(), listener.confirmed()), (1, 1));
        assert_eq!(listener.name(), ORDER_LISTENER);
    }
}
