//! Clocks: wall time for live runs, a jumping logical time for simulation.
//!
//! The scheduler reports the time of its next pending event through
//! [`Clock::notify_next_event`]. A [`SimulationClock`] jumps straight to that
//! instant, so a simulated year runs as fast as its callbacks do. A
//! [`RealTimeClock`] ignores the hint and lets wall time catch up.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

/// Source of "now" for the scheduler and every service.
pub trait Clock: Send + Sync {
    fn utc_now(&self) -> DateTime<Utc>;

    fn start(&self);

    fn stop(&self);

    /// Hint from the scheduler: the earliest pending event, or `None`.
    fn notify_next_event(&self, next: Option<DateTime<Utc>>);

    fn is_simulated(&self) -> bool;

    fn is_running(&self) -> bool;
}

/// Which clock a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockKind {
    #[default]
    Simulation,
    RealTime,
}

impl ClockKind {
    /// Build the clock, starting simulated time at `start`.
    pub fn build(self, start: DateTime<Utc>) -> Arc<dyn Clock> {
        match self {
            ClockKind::Simulation => Arc::new(SimulationClock::new(start)),
            ClockKind::RealTime => Arc::new(RealTimeClock::new()),
        }
    }
}

// ── Real time ──

#[derive(Debug, Default)]
pub struct RealTimeClock {
    running: AtomicBool,
}

impl RealTimeClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for RealTimeClock {
    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn notify_next_event(&self, _next: Option<DateTime<Utc>>) {}

    fn is_simulated(&self) -> bool {
        false
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

// ── Simulation ──

/// Logical clock stored as UTC nanoseconds. Only ever moves forward.
#[derive(Debug)]
pub struct SimulationClock {
    nanos: AtomicI64,
    running: AtomicBool,
}

impl SimulationClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            nanos: AtomicI64::new(to_nanos(start)),
            running: AtomicBool::new(false),
        }
    }

    /// Move to `time` if it is later than the current time.
    pub fn advance_to(&self, time: DateTime<Utc>) {
        self.nanos.fetch_max(to_nanos(time), Ordering::SeqCst);
    }
}

impl Clock for SimulationClock {
    fn utc_now(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn notify_next_event(&self, next: Option<DateTime<Utc>>) {
        if let Some(t) = next {
            self.advance_to(t);
        }
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn to_nanos(time: DateTime<Utc>) -> i64 {
    // Out of range only past year 2262.
    time.timestamp_nanos_opt().unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn simulation_clock_jumps_forward_only() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let clock = SimulationClock::new(t0);
        assert_eq!(clock.utc_now(), t0);

        clock.notify_next_event(Some(t0 + Duration::hours(5)));
        assert_eq!(clock.utc_now(), t0 + Duration::hours(5));

        clock.notify_next_event(Some(t0));
        assert_eq!(clock.utc_now(), t0 + Duration::hours(5));

        clock.notify_next_event(None);
        assert_eq!(clock.utc_now(), t0 + Duration::hours(5));
    }

    #[test]
    fn real_time_clock_ignores_hints() {
        let clock = RealTimeClock::new();
        let far = Utc.with_ymd_and_hms(2200, 1, 1, 0, 0, 0).unwrap();
        clock.notify_next_event(Some(far));
        assert!(clock.utc_now() < far);
        assert!(!clock.is_simulated());
    }

    #[test]
    fn start_stop_toggle_running() {
        let clock = ClockKind::Simulation.build(Utc::now());
        assert!(clock.is_simulated());
        assert!(!clock.is_running());
        clock.start();
        assert!(clock.is_running());
        clock.stop();
        assert!(!clock.is_running());
    }
}
