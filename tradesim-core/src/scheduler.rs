//! Event scheduler: a min-heap of timed callbacks driven against a [`Clock`].
//!
//! One mutex guards the heap, the insertion counter and the next-event time.
//! It is held only while the heap is mutated and never while a callback runs,
//! so a callback may schedule further events freely. A drive cycle reads
//! `now` once, pops and runs every event due at or before it in
//! `(time, sequence)` order, then hands the next pending time to the clock. A
//! simulation clock jumps straight to it, which is what lets the next cycle
//! make progress.
//!
//! Re-entrant `drive()` calls (a callback driving the scheduler it runs on)
//! are suppressed by an atomic draining flag.

use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use thiserror::Error;

use crate::clock::Clock;
use crate::logging::LogSink;
use crate::sync::lock;

const CATEGORY: &str = "Scheduler";

/// Callback run when an event fires.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// How the background loop drives the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerMode {
    /// Drive once, then sleep `interval`.
    Timer { interval: std::time::Duration },
    /// Drive continuously until stopped.
    #[default]
    Fast,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("scheduler starved at {0}: no pending events but not stopped")]
    Starved(DateTime<Utc>),

    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(String),

    #[error("scheduler thread panicked")]
    WorkerPanicked,
}

// ── Events ──

/// A timed callback. Ordered so that a `BinaryHeap` pops the earliest time
/// first and, on equal times, the earliest scheduled.
pub struct ScheduleEvent {
    pub time: DateTime<Utc>,
    seq: u64,
    action: Action,
}

impl ScheduleEvent {
    pub fn sequence(&self) -> u64 {
        self.seq
    }
}

impl fmt::Debug for ScheduleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleEvent")
            .field("time", &self.time)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ScheduleEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for ScheduleEvent {}

impl PartialOrd for ScheduleEvent {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduleEvent {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed: BinaryHeap is a max-heap.
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

// ── Shared state ──

#[derive(Default)]
struct Queue {
    heap: BinaryHeap<ScheduleEvent>,
    seq: u64,
    next_event_time: Option<DateTime<Utc>>,
}

struct Shared {
    clock: Arc<dyn Clock>,
    log: Arc<dyn LogSink>,
    queue: Mutex<Queue>,
    draining: AtomicBool,
    stopped: AtomicBool,
    running: AtomicBool,
    cycles: AtomicU64,
    error: Mutex<Option<SchedulerError>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Resets the draining flag even if a callback panics.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Cloneable handle to a shared scheduler.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .field("next_event_time", &self.next_event_time())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>, log: Arc<dyn LogSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                clock,
                log,
                queue: Mutex::new(Queue::default()),
                draining: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                running: AtomicBool::new(false),
                cycles: AtomicU64::new(0),
                error: Mutex::new(None),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.shared.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.shared.clock.utc_now()
    }

    /// Queue `action` to run at `time`. Returns its sequence number.
    pub fn schedule_new_event(
        &self,
        action: impl FnOnce() + Send + 'static,
        time: DateTime<Utc>,
    ) -> u64 {
        let mut queue = lock(&self.shared.queue);
        let seq = queue.seq;
        queue.seq += 1;
        queue.heap.push(ScheduleEvent {
            time,
            seq,
            action: Box::new(action),
        });
        queue.next_event_time = Some(match queue.next_event_time {
            Some(next) if next <= time => next,
            _ => time,
        });
        seq
    }

    /// Run `action` at `first`, then every `interval` while not past `until`.
    ///
    /// Pending repetitions hold only a weak handle, so a dropped scheduler
    /// does not keep itself alive through its own heap.
    pub fn schedule_recurring(
        &self,
        first: DateTime<Utc>,
        interval: Duration,
        until: DateTime<Utc>,
        action: impl Fn(DateTime<Utc>) + Send + Sync + 'static,
    ) {
        if interval <= Duration::zero() || first > until {
            return;
        }
        let action: Arc<dyn Fn(DateTime<Utc>) + Send + Sync> = Arc::new(action);
        schedule_repeat(Arc::downgrade(&self.shared), first, interval, until, action);
    }

    pub fn pending(&self) -> usize {
        lock(&self.shared.queue).heap.len()
    }

    pub fn next_event_time(&self) -> Option<DateTime<Utc>> {
        lock(&self.shared.queue).next_event_time
    }

    /// Number of completed drive cycles.
    pub fn drive_cycles(&self) -> u64 {
        self.shared.cycles.load(Ordering::SeqCst)
    }

    /// Run every event due at the current clock time. Returns how many fired.
    ///
    /// A call made while another drive is in progress returns 0 immediately.
    pub fn drive(&self) -> usize {
        let shared = &self.shared;
        if shared.draining.swap(true, Ordering::SeqCst) {
            return 0;
        }
        let _guard = DrainGuard(&shared.draining);

        let now = shared.clock.utc_now();
        let mut fired = 0;
        while !self.is_stopped() {
            let event = {
                let mut queue = lock(&shared.queue);
                match queue.heap.peek() {
                    Some(e) if e.time <= now => queue.heap.pop(),
                    _ => None,
                }
            };
            let Some(event) = event else { break };
            (event.action)();
            fired += 1;
        }

        let next = {
            let mut queue = lock(&shared.queue);
            queue.next_event_time = queue.heap.peek().map(|e| e.time);
            queue.next_event_time
        };
        shared.clock.notify_next_event(next);
        shared.cycles.fetch_add(1, Ordering::SeqCst);
        fired
    }

    /// Start the background drive loop.
    pub fn start(&self, mode: SchedulerMode) -> Result<(), SchedulerError> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }
        self.shared.stopped.store(false, Ordering::SeqCst);
        self.shared.clock.start();

        let scheduler = self.clone();
        let spawned = thread::Builder::new()
            .name("tradesim-scheduler".into())
            .spawn(move || scheduler.run_loop(mode));
        match spawned {
            Ok(handle) => {
                *lock(&self.shared.worker) = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(SchedulerError::Spawn(e.to_string()))
            }
        }
    }

    fn run_loop(&self, mode: SchedulerMode) {
        self.shared
            .log
            .debug(CATEGORY, &format!("drive loop started in {mode:?} mode"));
        while !self.is_stopped() {
            let fired = self.drive();
            if self.is_stopped() {
                break;
            }
            match mode {
                SchedulerMode::Timer { interval } => thread::sleep(interval),
                SchedulerMode::Fast => {
                    if self.pending() == 0 {
                        let now = self.now();
                        self.shared.log.error(
                            CATEGORY,
                            &format!("no pending events at {now} while still running"),
                        );
                        *lock(&self.shared.error) = Some(SchedulerError::Starved(now));
                        self.shared.stopped.store(true, Ordering::SeqCst);
                        break;
                    }
                    if fired == 0 {
                        thread::yield_now();
                    }
                }
            }
        }
        self.shared.clock.stop();
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.log.debug(
            CATEGORY,
            &format!("drive loop finished after {} cycles", self.drive_cycles()),
        );
    }

    /// Ask the drive loop to finish. Callable from inside a callback; never
    /// waits for the loop.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    /// True while the background loop is alive.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Wait for the background loop to exit and report how it ended.
    ///
    /// Called from the loop's own thread it returns without waiting.
    pub fn join(&self) -> Result<(), SchedulerError> {
        let handle = lock(&self.shared.worker).take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                *lock(&self.shared.worker) = Some(handle);
            } else if handle.join().is_err() {
                self.shared.running.store(false, Ordering::SeqCst);
                return Err(SchedulerError::WorkerPanicked);
            }
        }
        match lock(&self.shared.error).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Drop every pending event.
    pub fn clear(&self) {
        let mut queue = lock(&self.shared.queue);
        queue.heap.clear();
        queue.next_event_time = None;
    }
}

fn schedule_repeat(
    shared: Weak<Shared>,
    time: DateTime<Utc>,
    interval: Duration,
    until: DateTime<Utc>,
    action: Arc<dyn Fn(DateTime<Utc>) + Send + Sync>,
) {
    let Some(strong) = shared.upgrade() else { return };
    let scheduler = Scheduler { shared: strong };
    scheduler.schedule_new_event(
        move || {
            action(time);
            let next = time + interval;
            if next <= until {
                schedule_repeat(shared, next, interval, until, action);
            }
        },
        time,
    );
}
