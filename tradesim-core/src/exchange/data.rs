//! Historical exchange data: candle store plus trading calendar.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{Candle, ExchangeSession, SessionTransition};
use crate::error::DataError;

// ── Calendar ──

/// Trading hours (UTC), weekend rule, holidays and optional auctions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeCalendar {
    pub open: NaiveTime,
    pub close: NaiveTime,
    #[serde(default = "default_true")]
    pub skip_weekends: bool,
    #[serde(default)]
    pub holidays: BTreeSet<NaiveDate>,
    /// Length of the pre-open and post-close auctions. `None` means the
    /// exchange goes straight from Closed to Continuous and back.
    #[serde(default)]
    pub auction_minutes: Option<u32>,
}

fn default_true() -> bool {
    true
}

impl Default for ExchangeCalendar {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(14, 30, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(21, 0, 0).unwrap_or_default(),
            skip_weekends: true,
            holidays: BTreeSet::new(),
            auction_minutes: None,
        }
    }
}

impl ExchangeCalendar {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            open,
            close,
            ..Self::default()
        }
    }

    pub fn with_holiday(mut self, date: NaiveDate) -> Self {
        self.holidays.insert(date);
        self
    }

    pub fn with_auctions(mut self, minutes: u32) -> Self {
        self.auction_minutes = Some(minutes);
        self
    }

    pub fn validate(&self) -> Result<(), DataError> {
        if self.close <= self.open {
            return Err(DataError::InvalidCalendar);
        }
        Ok(())
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        if self.skip_weekends && matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        !self.holidays.contains(&date)
    }

    pub fn open_on(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(self.open).and_utc()
    }

    pub fn close_on(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(self.close).and_utc()
    }

    /// Session in force at `time`.
    pub fn session_at(&self, time: DateTime<Utc>) -> ExchangeSession {
        let date = time.date_naive();
        if !self.is_trading_day(date) {
            return ExchangeSession::Closed;
        }
        self.transitions_on(date)
            .into_iter()
            .take_while(|t| t.time <= time)
            .last()
            .map_or(ExchangeSession::Closed, |t| t.session)
    }

    /// Session transitions on `date`, in time order. Empty on non-trading days.
    pub fn transitions_on(&self, date: NaiveDate) -> Vec<SessionTransition> {
        if !self.is_trading_day(date) {
            return Vec::new();
        }
        let open = self.open_on(date);
        let close = self.close_on(date);
        let at = |time, session| SessionTransition { time, session };
        match self.auction_minutes {
            Some(minutes) if minutes > 0 => {
                let auction = Duration::minutes(i64::from(minutes));
                vec![
                    at(open - auction, ExchangeSession::PreOpen),
                    at(open, ExchangeSession::Continuous),
                    at(close, ExchangeSession::PostClose),
                    at(close + auction, ExchangeSession::Closed),
                ]
            }
            _ => vec![
                at(open, ExchangeSession::Continuous),
                at(close, ExchangeSession::Closed),
            ],
        }
    }

    /// Trading days in `[from, to]`.
    pub fn trading_days(&self, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
        from.iter_days()
            .take_while(|d| *d <= to)
            .filter(|d| self.is_trading_day(*d))
            .collect()
    }
}

// ── Data source ──

/// Read-only historical candle store.
pub trait ExchangeData: Send + Sync {
    fn instruments(&self) -> Vec<String>;

    /// Candles in time order, or `None` for an unknown instrument.
    fn candles(&self, instrument: &str) -> Option<&[Candle]>;

    fn calendar(&self) -> &ExchangeCalendar;

    /// Structural checks run before any simulation starts.
    fn validate(&self) -> Result<(), DataError> {
        self.calendar().validate()?;
        let instruments = self.instruments();
        if instruments.is_empty() {
            return Err(DataError::NoInstruments);
        }
        for instrument in instruments {
            let candles = match self.candles(&instrument) {
                Some(c) if !c.is_empty() => c,
                _ => return Err(DataError::NoCandles(instrument)),
            };
            for (index, pair) in candles.windows(2).enumerate() {
                if pair[1].time <= pair[0].time {
                    return Err(DataError::Unordered {
                        instrument,
                        index: index + 1,
                    });
                }
            }
            if let Some(bad) = candles.iter().find(|c| !c.is_sane()) {
                return Err(DataError::InsaneCandle {
                    instrument,
                    time: bad.time.to_rfc3339(),
                });
            }
        }
        Ok(())
    }
}

/// Candle store held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExchangeData {
    calendar: ExchangeCalendar,
    candles: BTreeMap<String, Vec<Candle>>,
}

impl InMemoryExchangeData {
    pub fn new(calendar: ExchangeCalendar) -> Self {
        Self {
            calendar,
            candles: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, instrument: impl Into<String>, candles: Vec<Candle>) {
        self.candles.insert(instrument.into(), candles);
    }

    pub fn with_candles(mut self, instrument: impl Into<String>, candles: Vec<Candle>) -> Self {
        self.insert(instrument, candles);
        self
    }

    /// One flat candle at `price` per trading day in `[from, to]`, closing at
    /// the session close.
    pub fn flat_series(
        calendar: &ExchangeCalendar,
        from: NaiveDate,
        to: NaiveDate,
        price: f64,
    ) -> Vec<Candle> {
        calendar
            .trading_days(from, to)
            .into_iter()
            .map(|d| Candle::flat(calendar.close_on(d), price))
            .collect()
    }
}

impl ExchangeData for InMemoryExchangeData {
    fn instruments(&self) -> Vec<String> {
        self.candles.keys().cloned().collect()
    }

    fn candles(&self, instrument: &str) -> Option<&[Candle]> {
        self.candles.get(instrument).map(Vec::as_slice)
    }

    fn calendar(&self) -> &ExchangeCalendar {
        &self.calendar
    }
}
