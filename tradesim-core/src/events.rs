//! Typed publish/subscribe streams and the payloads carried on them.
//!
//! Each service owns the streams it publishes on; the evolver subscribes the
//! consumers at wiring time. Consumers implement the listener trait for the
//! events they handle and sit behind an `Arc<Mutex<_>>`; the subscribed
//! closure locks the consumer and forwards the event to it.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::domain::{Candle, SecurityTrade, SessionTransition, Trade};
use crate::sync::lock;

type Subscriber<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A cloneable handle to a list of subscribers for one event type.
pub struct EventStream<E> {
    subscribers: Arc<Mutex<Vec<Subscriber<E>>>>,
}

impl<E> Clone for EventStream<E> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<E> Default for EventStream<E> {
    fn default() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<E> fmt::Debug for EventStream<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl<E> EventStream<E> {
    pub fn len(&self) -> usize {
        lock(&self.subscribers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.subscribers).clear();
    }
}

impl<E: 'static> EventStream<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: impl Fn(&E) + Send + Sync + 'static) {
        lock(&self.subscribers).push(Arc::new(subscriber));
    }

    /// Deliver `event` to every subscriber in subscription order.
    ///
    /// The subscriber list is copied first, so a subscriber may subscribe
    /// further handlers without deadlocking.
    pub fn publish(&self, event: &E) {
        let subscribers = lock(&self.subscribers).clone();
        for subscriber in subscribers {
            subscriber(event);
        }
    }
}

// ── Payloads ──

/// A new candle became final.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    pub instrument: String,
    pub candle: Candle,
}

/// The daily time-update tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUpdate {
    pub time: DateTime<Utc>,
}

/// A trade released by the strategy for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeSubmission {
    pub time: DateTime<Utc>,
    pub trade: Trade,
}

/// A trade confirmed by an exchange.
pub type TradeCompleted = SecurityTrade;

/// A session transition.
pub type SessionChange = SessionTransition;

// ── Listener traits, one per event ──

pub trait PriceListener {
    fn on_price_update(&mut self, update: &PriceUpdate);
}

pub trait SessionListener {
    fn on_session_change(&mut self, change: &SessionChange);
}

pub trait TimeListener {
    fn on_time_update(&mut self, update: &TimeUpdate);
}

pub trait SubmissionListener {
    fn on_trade_submitted(&mut self, submission: &TradeSubmission);
}

pub trait CompletionListener {
    fn on_trade_completed(&mut self, trade: &TradeCompleted);
}
