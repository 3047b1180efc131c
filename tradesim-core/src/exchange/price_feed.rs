//! Price feed service: replays candles as they become final.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::data::ExchangeData;
use crate::error::ServiceError;
use crate::events::{EventStream, PriceUpdate};
use crate::logging::LogSink;
use crate::scheduler::Scheduler;
use crate::service::Service;
use crate::settings::EvolverSettings;

pub const PRICE_FEED: &str = "PriceFeed";

/// Schedules one `price_changed` publication per candle at the candle's time.
///
/// Pending publications carry the generation they were scheduled under and
/// become no-ops once the generation moves on (restart or shutdown).
pub struct PriceFeedService {
    data: Arc<dyn ExchangeData>,
    scheduler: Scheduler,
    price_changed: EventStream<PriceUpdate>,
    generation: Arc<AtomicU64>,
    end: Option<DateTime<Utc>>,
    log: Arc<dyn LogSink>,
}

impl PriceFeedService {
    pub fn new(data: Arc<dyn ExchangeData>, scheduler: Scheduler, log: Arc<dyn LogSink>) -> Self {
        Self {
            data,
            scheduler,
            price_changed: EventStream::new(),
            generation: Arc::new(AtomicU64::new(0)),
            end: None,
            log,
        }
    }

    pub fn price_changed(&self) -> &EventStream<PriceUpdate> {
        &self.price_changed
    }

    /// Schedule every candle in `[from, end]` (or `(from, end]`).
    fn schedule_from(&mut self, from: DateTime<Utc>, inclusive: bool) -> usize {
        let Some(end) = self.end else { return 0 };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut scheduled = 0;
        for instrument in self.data.instruments() {
            let Some(candles) = self.data.candles(&instrument) else {
                continue;
            };
            let due = candles
                .iter()
                .filter(|c| if inclusive { c.time >= from } else { c.time > from })
                .take_while(|c| c.time <= end);
            for candle in due {
                let update = PriceUpdate {
                    instrument: instrument.clone(),
                    candle: candle.clone(),
                };
                let stream = self.price_changed.clone();
                let current = Arc::clone(&self.generation);
                self.scheduler.schedule_new_event(
                    move || {
                        if current.load(Ordering::SeqCst) == generation {
                            stream.publish(&update);
                        }
                    },
                    candle.time,
                );
                scheduled += 1;
            }
        }
        scheduled
    }
}

impl Service for PriceFeedService {
    fn name(&self) -> &str {
        PRICE_FEED
    }

    fn initialize(&mut self, settings: &EvolverSettings) -> Result<(), ServiceError> {
        self.end = Some(settings.end);
        let count = self.schedule_from(settings.start, true);
        self.log
            .debug(PRICE_FEED, &format!("scheduled {count} candle updates"));
        Ok(())
    }

    fn restart(&mut self) -> Result<(), ServiceError> {
        let now = self.scheduler.now();
        let count = self.schedule_from(now, false);
        self.log.info(
            PRICE_FEED,
            &format!("restarted at {now}, {count} candle updates pending"),
        );
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ServiceError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
