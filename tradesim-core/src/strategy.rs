//! Execution strategy: decides at the close, releases at the next open.
//!
//! ```text
//!            Closed: decide -> non-empty
//!   Idle ───────────────────────────────► Holding(trades)
//!    ▲                                        │
//!    └────────────────────────────────────────┘
//!        Continuous: queue sells, then buys
//! ```
//!
//! Released trades wait in a queue and leave it one scheduler event at a
//! time. Clearing the queue cancels whatever has not left yet.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::decision::DecisionModule;
use crate::domain::{ExchangeSession, Trade, TradeCollection};
use crate::error::{DecisionError, ServiceError};
use crate::events::{
    EventStream, PriceListener, PriceUpdate, SessionChange, SessionListener, TimeListener,
    TimeUpdate, TradeSubmission,
};
use crate::exchange::{ExchangeData, ExchangeSnapshot};
use crate::logging::LogSink;
use crate::portfolio_manager::PortfolioManager;
use crate::scheduler::Scheduler;
use crate::service::Service;
use crate::settings::EvolverSettings;
use crate::sync::lock;

pub const EXECUTION_STRATEGY: &str = "ExecutionStrategy";

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyState {
    Idle,
    Holding(TradeCollection),
}

pub struct ExecutionStrategy {
    decision: Box<dyn DecisionModule>,
    data: Arc<dyn ExchangeData>,
    snapshot: ExchangeSnapshot,
    scheduler: Scheduler,
    portfolio: Arc<Mutex<PortfolioManager>>,
    state: StrategyState,
    release: Arc<Mutex<VecDeque<Trade>>>,
    trade_submitted: EventStream<TradeSubmission>,
    trading_start: DateTime<Utc>,
    log: Arc<dyn LogSink>,
}

impl fmt::Debug for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionStrategy")
            .field("decision", &self.decision.name())
            .field("state", &self.state)
            .field("queued", &self.queued())
            .finish_non_exhaustive()
    }
}

impl ExecutionStrategy {
    pub fn new(
        settings: &EvolverSettings,
        decision: Box<dyn DecisionModule>,
        data: Arc<dyn ExchangeData>,
        scheduler: Scheduler,
        portfolio: Arc<Mutex<PortfolioManager>>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            decision,
            snapshot: ExchangeSnapshot::as_of(Arc::clone(&data), settings.start),
            data,
            scheduler,
            portfolio,
            state: StrategyState::Idle,
            release: Arc::new(Mutex::new(VecDeque::new())),
            trade_submitted: EventStream::new(),
            trading_start: settings.trading_start(),
            log,
        }
    }

    pub fn trade_submitted(&self) -> &EventStream<TradeSubmission> {
        &self.trade_submitted
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    pub fn snapshot(&self) -> &ExchangeSnapshot {
        &self.snapshot
    }

    pub fn decision_name(&self) -> &str {
        self.decision.name()
    }

    pub fn portfolio_manager(&self) -> Arc<Mutex<PortfolioManager>> {
        Arc::clone(&self.portfolio)
    }

    /// Trades released but not yet submitted.
    pub fn queued(&self) -> usize {
        lock(&self.release).len()
    }

    /// Fit the decision module on the data up to the end of burn-in.
    pub fn calibrate(&mut self, settings: &EvolverSettings) -> Result<(), DecisionError> {
        let history = ExchangeSnapshot::as_of(Arc::clone(&self.data), settings.trading_start());
        self.decision
            .calibrate(settings, &history, self.log.as_ref())
    }

    fn on_close(&mut self, time: DateTime<Utc>) {
        self.snapshot.advance_to(time);
        if time < self.trading_start {
            return;
        }
        let decided = self
            .decision
            .decide(time, &self.snapshot, self.log.as_ref())
            .filter(|c| !c.is_empty());
        let Some(collection) = decided else { return };

        if let StrategyState::Holding(stale) = &self.state {
            self.log.warning(
                EXECUTION_STRATEGY,
                &format!("dropping {} unreleased trades", stale.len()),
            );
        }
        self.log.debug(
            EXECUTION_STRATEGY,
            &format!("holding {} trades decided at {time}", collection.len()),
        );
        self.state = StrategyState::Holding(collection);
    }

    fn on_open(&mut self, time: DateTime<Utc>) {
        let StrategyState::Holding(collection) =
            std::mem::replace(&mut self.state, StrategyState::Idle)
        else {
            return;
        };
        let ordered: Vec<Trade> = collection
            .sells()
            .into_iter()
            .chain(collection.buys())
            .collect();
        let count = ordered.len();
        lock(&self.release).extend(ordered);

        for _ in 0..count {
            let release = Arc::clone(&self.release);
            let stream = self.trade_submitted.clone();
            self.scheduler.schedule_new_event(
                move || {
                    let next = lock(&release).pop_front();
                    if let Some(trade) = next {
                        stream.publish(&TradeSubmission { time, trade });
                    }
                },
                time,
            );
        }
        self.log.debug(
            EXECUTION_STRATEGY,
            &format!("released {count} trades at {time}"),
        );
    }

    fn drop_pending(&mut self) {
        self.state = StrategyState::Idle;
        lock(&self.release).clear();
    }
}

impl SessionListener for ExecutionStrategy {
    fn on_session_change(&mut self, change: &SessionChange) {
        match change.session {
            ExchangeSession::Continuous => self.on_open(change.time),
            ExchangeSession::Closed => self.on_close(change.time),
            ExchangeSession::PreOpen | ExchangeSession::PostClose => {}
        }
    }
}

impl PriceListener for ExecutionStrategy {
    fn on_price_update(&mut self, update: &PriceUpdate) {
        self.snapshot
            .push_candle(&update.instrument, update.candle.clone());
    }
}

impl TimeListener for ExecutionStrategy {
    fn on_time_update(&mut self, update: &TimeUpdate) {
        self.snapshot.advance_to(update.time);
    }
}

impl Service for ExecutionStrategy {
    fn name(&self) -> &str {
        EXECUTION_STRATEGY
    }

    fn initialize(&mut self, settings: &EvolverSettings) -> Result<(), ServiceError> {
        self.trading_start = settings.trading_start();
        self.drop_pending();
        Ok(())
    }

    fn restart(&mut self) -> Result<(), ServiceError> {
        self.drop_pending();
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ServiceError> {
        self.drop_pending();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulationClock;
    use crate::decision::ScriptedDecisions;
    use crate::domain::{Portfolio, SessionTransition};
    use crate::exchange::{ExchangeCalendar, HistoricalPriceService, InMemoryExchangeData};
    use crate::logging::NullLog;
    use crate::settings::TradingSettings;
    use chrono::{NaiveDate, TimeZone};

    struct Fixture {
        strategy: ExecutionStrategy,
        scheduler: Scheduler,
        submitted: Arc<Mutex<Vec<Trade>>>,
    }

    fn fixture(decision: ScriptedDecisions) -> Fixture {
        let cal = ExchangeCalendar::default();
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let candles = InMemoryExchangeData::flat_series(&cal, from, to, 10.0);
        let data: Arc<dyn ExchangeData> =
            Arc::new(InMemoryExchangeData::new(cal).with_candles("AAA", candles));

        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let settings = EvolverSettings::new(start, start + chrono::Duration::days(10));
        let scheduler = Scheduler::new(Arc::new(SimulationClock::new(start)), Arc::new(NullLog));
        let pm = PortfolioManager::new(
            Portfolio::new(1_000.0),
            Arc::new(HistoricalPriceService::new(Arc::clone(&data))),
            TradingSettings::default(),
            Arc::new(NullLog),
        );
        let strategy = ExecutionStrategy::new(
            &settings,
            Box::new(decision),
            data,
            scheduler.clone(),
            Arc::new(Mutex::new(pm)),
            Arc::new(NullLog),
        );
        let submitted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&submitted);
        strategy
            .trade_submitted()
            .subscribe(move |s: &TradeSubmission| lock(&sink).push(s.trade.clone()));
        Fixture {
            strategy,
            scheduler,
            submitted,
        }
    }

    fn change(d: u32, h: u32, m: u32, session: ExchangeSession) -> SessionTransition {
        SessionTransition {
            time: Utc.with_ymd_and_hms(2024, 1, d, h, m, 0).unwrap(),
            session,
        }
    }

    #[test]
    fn decides_on_close_and_releases_sells_first_on_open() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let decision = ScriptedDecisions::new().on(
            day,
            vec![Trade::buy("AAA"), Trade::sell("BBB"), Trade::buy("CCC")],
        );
        let mut fx = fixture(decision);

        fx.strategy
            .on_session_change(&change(2, 21, 0, ExchangeSession::Closed));
        assert!(matches!(fx.strategy.state(), StrategyState::Holding(c) if c.len() == 3));
        // Nothing released on the transition that produced the decision.
        assert_eq!(fx.scheduler.pending(), 0);

        fx.strategy
            .on_session_change(&change(3, 14, 30, ExchangeSession::Continuous));
        assert_eq!(fx.strategy.state(), &StrategyState::Idle);
        assert_eq!(fx.scheduler.pending(), 3);

        while fx.scheduler.pending() > 0 {
            fx.scheduler.drive();
        }
        let order: Vec<_> = lock(&fx.submitted)
            .iter()
            .map(|t| t.instrument.clone())
            .collect();
        assert_eq!(order, vec!["BBB", "AAA", "CCC"]);
    }

    #[test]
    fn shutdown_cancels_released_trades() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let decision = ScriptedDecisions::new().on(day, vec![Trade::buy("AAA")]);
        let mut fx = fixture(decision);

        fx.strategy
            .on_session_change(&change(2, 21, 0, ExchangeSession::Closed));
        fx.strategy
            .on_session_change(&change(3, 14, 30, ExchangeSession::Continuous));
        fx.strategy.shutdown().unwrap();

        while fx.scheduler.pending() > 0 {
            fx.scheduler.drive();
        }
        assert!(lock(&fx.submitted).is_empty());
    }

    #[test]
    fn auction_sessions_leave_state_alone() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut fx = fixture(ScriptedDecisions::new().on(day, vec![Trade::buy("AAA")]));
        fx.strategy
            .on_session_change(&change(2, 21, 0, ExchangeSession::Closed));
        fx.strategy
            .on_session_change(&change(3, 14, 0, ExchangeSession::PreOpen));
        assert!(matches!(fx.strategy.state(), StrategyState::Holding(_)));
    }

    #[test]
    fn price_and_time_updates_advance_snapshot() {
        let mut fx = fixture(ScriptedDecisions::new());
        let before = fx.strategy.snapshot().candles("AAA").len();
        let close = Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap();
        fx.strategy.on_price_update(&PriceUpdate {
            instrument: "AAA".into(),
            candle: crate::domain::Candle::flat(close, 10.0),
        });
        assert_eq!(fx.strategy.snapshot().candles("AAA").len(), before + 1);

        let later = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        fx.strategy.on_time_update(&TimeUpdate { time: later });
        assert_eq!(fx.strategy.snapshot().time(), later);
        assert_eq!(fx.strategy.snapshot().candles("AAA").len(), before + 3);
    }
}
