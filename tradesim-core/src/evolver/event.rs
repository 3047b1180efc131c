//! Event-driven evolver.
//!
//! Construction order: clock, scheduler, session tracker, price feed,
//! execution strategy, simulated exchange, order listener. `initialise`
//! calibrates the decision module, wires the streams, initialises every
//! service and schedules the daily time-update tick plus a one-shot shutdown
//! at the end of the run. The pre-scheduled shutdown is what guarantees the
//! run terminates.
//!
//! Wiring:
//!
//! ```text
//! strategy.trade_submitted   -> order listener
//! tracker.status_changed     -> strategy
//! feed.price_changed         -> strategy, portfolio manager
//! exchange.trade_completed   -> order listener's trade recorder
//! time_updates               -> strategy
//! ```

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::result::{EvolverInputs, EvolverResult};
use super::{setup_failed, validate_inputs};
use crate::clock::Clock;
use crate::error::EvolverError;
use crate::events::{
    CompletionListener, EventStream, PriceListener, SessionListener, SubmissionListener,
    TimeListener, TimeUpdate,
};
use crate::exchange::{
    CostModel, HistoricalPriceService, PriceFeedService, PriceService, SessionTrackerService,
    SimulatedExchange, TradeSubmitter, PRICE_FEED, SESSION_TRACKER, SIMULATED_EXCHANGE,
};
use crate::logging::LogSink;
use crate::order_listener::{OrderListener, ORDER_LISTENER};
use crate::portfolio_manager::PortfolioManager;
use crate::scheduler::{Scheduler, SchedulerError};
use crate::service::{Service, ServiceManager};
use crate::settings::EvolverSettings;
use crate::strategy::{ExecutionStrategy, EXECUTION_STRATEGY};
use crate::sync::lock;

const CATEGORY: &str = "EventEvolver";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Ready,
    Failed,
}

struct Inner {
    settings: EvolverSettings,
    log: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
    scheduler: Scheduler,
    services: Mutex<ServiceManager>,
    tracker: Arc<Mutex<SessionTrackerService>>,
    feed: Arc<Mutex<PriceFeedService>>,
    strategy: Arc<Mutex<ExecutionStrategy>>,
    exchange: Arc<Mutex<SimulatedExchange>>,
    order_listener: Arc<Mutex<OrderListener>>,
    portfolio: Arc<Mutex<PortfolioManager>>,
    time_updates: EventStream<TimeUpdate>,
    phase: Mutex<Phase>,
    active: AtomicBool,
    shut_down: AtomicBool,
    result: Mutex<EvolverResult>,
}

/// Scheduler-driven simulation run. Cloning yields another handle to the
/// same run.
#[derive(Clone)]
pub struct EventEvolver {
    inner: Arc<Inner>,
}

impl fmt::Debug for EventEvolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEvolver")
            .field("phase", &*lock(&self.inner.phase))
            .field("active", &self.is_active())
            .field("scheduler", &self.inner.scheduler)
            .finish()
    }
}

impl EventEvolver {
    /// Validate the inputs and build every component. Nothing runs yet.
    pub fn new(mut inputs: EvolverInputs) -> Result<Self, EvolverError> {
        let log = Arc::clone(&inputs.log);
        validate_inputs(&inputs).map_err(|e| setup_failed(log.as_ref(), e))?;

        let settings = inputs.settings.clone();
        let trading = inputs.trading;
        let data = Arc::clone(&inputs.exchange);
        let starting = inputs.starting_portfolio();

        let clock = settings.clock.build(settings.start);
        let scheduler = Scheduler::new(Arc::clone(&clock), Arc::clone(&log));
        let tracker = Arc::new(Mutex::new(SessionTrackerService::new(
            Arc::clone(&data),
            scheduler.clone(),
            Arc::clone(&log),
        )));
        let feed = Arc::new(Mutex::new(PriceFeedService::new(
            Arc::clone(&data),
            scheduler.clone(),
            Arc::clone(&log),
        )));
        let prices: Arc<dyn PriceService> = Arc::new(
            HistoricalPriceService::new(Arc::clone(&data)).with_spread_bps(trading.spread_bps),
        );
        let portfolio = Arc::new(Mutex::new(PortfolioManager::new(
            starting,
            prices,
            trading,
            Arc::clone(&log),
        )));
        let strategy = Arc::new(Mutex::new(ExecutionStrategy::new(
            &settings,
            inputs.decision,
            Arc::clone(&data),
            scheduler.clone(),
            Arc::clone(&portfolio),
            Arc::clone(&log),
        )));
        let exchange = Arc::new(Mutex::new(SimulatedExchange::new(CostModel::from_settings(
            &trading,
        ))));
        let submitter: Arc<Mutex<dyn TradeSubmitter>> = exchange.clone();
        let order_listener = Arc::new(Mutex::new(OrderListener::new(
            Arc::clone(&portfolio),
            submitter,
            Arc::clone(&log),
        )));

        // Feed before tracker: a candle and a transition at the same instant
        // fire candle first.
        let mut services = ServiceManager::new();
        let registered = [
            services.register_service(PRICE_FEED, Arc::clone(&feed)),
            services.register_service(SESSION_TRACKER, Arc::clone(&tracker)),
            services.register_service(EXECUTION_STRATEGY, Arc::clone(&strategy)),
            services.register_service(SIMULATED_EXCHANGE, Arc::clone(&exchange)),
            services.register_service(ORDER_LISTENER, Arc::clone(&order_listener)),
        ];
        if registered.contains(&false) {
            log.error(CATEGORY, "duplicate service name; a service was not registered");
        }
        debug_assert!(!registered.contains(&false), "duplicate service name");

        Ok(Self {
            inner: Arc::new(Inner {
                settings,
                log,
                clock,
                scheduler,
                services: Mutex::new(services),
                tracker,
                feed,
                strategy,
                exchange,
                order_listener,
                portfolio,
                time_updates: EventStream::new(),
                phase: Mutex::new(Phase::Created),
                active: AtomicBool::new(false),
                shut_down: AtomicBool::new(false),
                result: Mutex::new(EvolverResult::empty()),
            }),
        })
    }

    pub fn settings(&self) -> &EvolverSettings {
        &self.inner.settings
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.utc_now()
    }

    /// Calibrate, wire and schedule. Runs once; later calls return the
    /// first outcome.
    pub fn initialise(&self) -> Result<(), EvolverError> {
        let mut phase = lock(&self.inner.phase);
        match *phase {
            Phase::Ready => return Ok(()),
            Phase::Failed => return Err(EvolverError::SetupFailed),
            Phase::Created => {}
        }
        match self.inner.setup() {
            Ok(()) => {
                *phase = Phase::Ready;
                Ok(())
            }
            Err(e) => {
                *phase = Phase::Failed;
                Err(setup_failed(self.inner.log.as_ref(), e))
            }
        }
    }

    /// Start the scheduler loop. Idempotent.
    pub fn start(&self) -> Result<(), EvolverError> {
        self.initialise()?;
        let inner = &self.inner;
        if inner.shut_down.load(Ordering::SeqCst) || inner.active.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match inner.scheduler.start(inner.settings.scheduler) {
            Ok(()) | Err(SchedulerError::AlreadyRunning) => {
                inner.log.info(
                    CATEGORY,
                    &format!(
                        "started {} .. {} in {:?} mode",
                        inner.settings.start, inner.settings.end, inner.settings.scheduler
                    ),
                );
                Ok(())
            }
            Err(e) => {
                inner.active.store(false, Ordering::SeqCst);
                Err(setup_failed(inner.log.as_ref(), e.into()))
            }
        }
    }

    /// True from `start` until shutdown completes.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Block until the scheduler loop exits. A starved scheduler shuts the
    /// run down and is reported as an error.
    pub fn wait(&self) -> Result<(), EvolverError> {
        if let Err(e) = self.inner.scheduler.join() {
            self.shutdown();
            return Err(e.into());
        }
        Ok(())
    }

    /// Start, wait for the pre-scheduled shutdown and return the result.
    pub fn run(&self) -> Result<EvolverResult, EvolverError> {
        self.start()?;
        self.wait()?;
        self.shutdown();
        Ok(self.result())
    }

    /// Stop the scheduler, shut every service down and freeze the result.
    /// Later calls do nothing.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        if inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        inner.scheduler.stop();
        // Returns at once when called from a scheduler callback.
        let _ = inner.scheduler.join();

        let ready = *lock(&inner.phase) == Phase::Ready;
        if ready {
            if let Err(e) = lock(&inner.services).shutdown() {
                inner.log.error(CATEGORY, &format!("service shutdown failed: {e}"));
            }
            *lock(&inner.result) = inner.freeze();
        }
        inner.scheduler.clear();
        inner.clock.stop();
        inner.active.store(false, Ordering::SeqCst);
        inner.log.info(
            CATEGORY,
            &format!("shut down at {}", inner.clock.utc_now()),
        );
    }

    /// Copy of the result. Empty until shutdown.
    pub fn result(&self) -> EvolverResult {
        lock(&self.inner.result).clone()
    }

    /// Registered service by name and type.
    pub fn service<S: Service + 'static>(&self, name: &str) -> Option<Arc<Mutex<S>>> {
        lock(&self.inner.services).get_service::<S>(name)
    }

    pub fn service_names(&self) -> Vec<String> {
        lock(&self.inner.services)
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn portfolio_manager(&self) -> Arc<Mutex<PortfolioManager>> {
        lock(&self.inner.strategy).portfolio_manager()
    }

    pub fn order_listener(&self) -> Arc<Mutex<OrderListener>> {
        Arc::clone(&self.inner.order_listener)
    }
}

impl Inner {
    fn setup(self: &Arc<Self>) -> Result<(), EvolverError> {
        {
            let mut strategy = lock(&self.strategy);
            let module = strategy.decision_name().to_string();
            strategy
                .calibrate(&self.settings)
                .map_err(|source| EvolverError::Calibration { module, source })?;
        }
        self.wire();
        lock(&self.services).initialize(&self.settings)?;
        self.schedule_time_updates();
        self.schedule_shutdown();
        self.log.info(
            CATEGORY,
            &format!("initialised with {} pending events", self.scheduler.pending()),
        );
        Ok(())
    }

    fn wire(&self) {
        let listener = Arc::clone(&self.order_listener);
        lock(&self.strategy)
            .trade_submitted()
            .subscribe(move |s| lock(&listener).on_trade_submitted(s));

        let strategy = Arc::clone(&self.strategy);
        lock(&self.tracker)
            .status_changed()
            .subscribe(move |c| lock(&strategy).on_session_change(c));

        let feed = lock(&self.feed);
        let strategy = Arc::clone(&self.strategy);
        feed.price_changed()
            .subscribe(move |u| lock(&strategy).on_price_update(u));
        let portfolio = Arc::clone(&self.portfolio);
        feed.price_changed()
            .subscribe(move |u| lock(&portfolio).on_price_update(u));
        drop(feed);

        let recorder = lock(&self.order_listener).recorder();
        lock(&self.exchange)
            .trade_completed()
            .subscribe(move |t| lock(&recorder).on_trade_completed(t));

        let strategy = Arc::clone(&self.strategy);
        self.time_updates
            .subscribe(move |u| lock(&strategy).on_time_update(u));
    }

    fn schedule_time_updates(&self) {
        let step = if self.settings.increment > Duration::zero() {
            self.settings.increment
        } else {
            Duration::days(1)
        };
        let stream = self.time_updates.clone();
        self.scheduler.schedule_recurring(
            self.settings.start + step,
            step,
            self.settings.end,
            move |time| stream.publish(&TimeUpdate { time }),
        );
    }

    fn schedule_shutdown(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.scheduler.schedule_new_event(
            move || {
                if let Some(inner) = weak.upgrade() {
                    EventEvolver { inner }.shutdown();
                }
            },
            self.settings.end,
        );
    }

    fn freeze(&self) -> EvolverResult {
        let (portfolio, start_portfolio) = {
            let pm = lock(&self.portfolio);
            (pm.portfolio().clone(), pm.start_portfolio().clone())
        };
        let recorder = lock(&self.order_listener).recorder();
        let records = lock(&recorder).clone();
        EvolverResult {
            portfolio: Some(portfolio),
            start_portfolio: Some(start_portfolio),
            decisions: records.decisions,
            trades: records.trades,
        }
    }
}
