//! Exchange session tracker: drives the session state machine from the
//! calendar.

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::data::ExchangeData;
use crate::domain::ExchangeSession;
use crate::error::ServiceError;
use crate::events::{EventStream, SessionChange};
use crate::logging::LogSink;
use crate::scheduler::Scheduler;
use crate::service::Service;
use crate::settings::EvolverSettings;

pub const SESSION_TRACKER: &str = "ExchangeSessionTracker";

/// Publishes `status_changed` at every calendar transition inside the run.
pub struct SessionTrackerService {
    data: Arc<dyn ExchangeData>,
    scheduler: Scheduler,
    status_changed: EventStream<SessionChange>,
    generation: Arc<AtomicU64>,
    end: Option<DateTime<Utc>>,
    log: Arc<dyn LogSink>,
}

impl SessionTrackerService {
    pub fn new(data: Arc<dyn ExchangeData>, scheduler: Scheduler, log: Arc<dyn LogSink>) -> Self {
        Self {
            data,
            scheduler,
            status_changed: EventStream::new(),
            generation: Arc::new(AtomicU64::new(0)),
            end: None,
            log,
        }
    }

    pub fn status_changed(&self) -> &EventStream<SessionChange> {
        &self.status_changed
    }

    /// Session in force now.
    pub fn current(&self) -> ExchangeSession {
        self.data.calendar().session_at(self.scheduler.now())
    }

    fn schedule_from(&mut self, from: DateTime<Utc>, inclusive: bool) -> usize {
        let Some(end) = self.end else { return 0 };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let calendar = self.data.calendar();
        // Auctions may start the day before their continuous session.
        let first_day = (from - Duration::days(1)).date_naive();
        let mut scheduled = 0;
        for day in calendar.trading_days(first_day, end.date_naive()) {
            for transition in calendar.transitions_on(day) {
                let due = if inclusive {
                    transition.time >= from
                } else {
                    transition.time > from
                };
                if !due || transition.time > end {
                    continue;
                }
                let stream = self.status_changed.clone();
                let current = Arc::clone(&self.generation);
                self.scheduler.schedule_new_event(
                    move || {
                        if current.load(Ordering::SeqCst) == generation {
                            stream.publish(&transition);
                        }
                    },
                    transition.time,
                );
                scheduled += 1;
            }
        }
        scheduled
    }
}

impl Service for SessionTrackerService {
    fn name(&self) -> &str {
        SESSION_TRACKER
    }

    fn initialize(&mut self, settings: &EvolverSettings) -> Result<(), ServiceError> {
        self.end = Some(settings.end);
        let count = self.schedule_from(settings.start, true);
        self.log.debug(
            SESSION_TRACKER,
            &format!("scheduled {count} session transitions"),
        );
        Ok(())
    }

    fn restart(&mut self) -> Result<(), ServiceError> {
        let now = self.scheduler.now();
        self.schedule_from(now, false);
        self.log.info(
            SESSION_TRACKER,
            &format!("restarted at {now} in session {}", self.current()),
        );
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ServiceError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
