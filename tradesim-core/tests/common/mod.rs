//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::Arc;

use tradesim_core::decision::DecisionModule;
use tradesim_core::exchange::{ExchangeCalendar, ExchangeData, InMemoryExchangeData};
use tradesim_core::logging::MemoryLog;
use tradesim_core::settings::{EvolverSettings, TradingSettings};
use tradesim_core::EvolverInputs;

/// January 2024: the 2nd is a Tuesday, the 6th and 7th are a weekend.
pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

pub fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, h, m, 0).unwrap()
}

/// Default calendar close (21:00 UTC) on the 2024-01-`d`.
pub fn close(d: u32) -> DateTime<Utc> {
    at(d, 21, 0)
}

/// Flat daily candles for each `(instrument, price)` from `from` to `to`.
pub fn flat_exchange(instruments: &[(&str, f64)], from: u32, to: u32) -> Arc<dyn ExchangeData> {
    let calendar = ExchangeCalendar::default();
    let mut data = InMemoryExchangeData::new(calendar.clone());
    for (name, price) in instruments {
        data.insert(
            *name,
            InMemoryExchangeData::flat_series(&calendar, day(from), day(to), *price),
        );
    }
    Arc::new(data)
}

/// Run from midnight on the `start`th to midnight on the `end`th.
pub fn settings(start: u32, end: u32) -> EvolverSettings {
    EvolverSettings::new(at(start, 0, 0), at(end, 0, 0))
}

pub fn trading(cash: f64, fee: f64) -> TradingSettings {
    TradingSettings {
        starting_cash: cash,
        trade_fee: fee,
        ..TradingSettings::default()
    }
}

pub fn inputs(
    settings: EvolverSettings,
    trading: TradingSettings,
    exchange: Arc<dyn ExchangeData>,
    decision: impl DecisionModule + 'static,
) -> (EvolverInputs, Arc<MemoryLog>) {
    let log = Arc::new(MemoryLog::new());
    let inputs = EvolverInputs::new(settings, trading, exchange, Box::new(decision), log.clone());
    (inputs, log)
}
