//! Quote lookup.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use super::data::ExchangeData;

/// Source of quotes. `None` means no price is available at that time.
pub trait PriceService: Send + Sync {
    fn ask_price(&self, time: DateTime<Utc>, instrument: &str) -> Option<f64>;

    fn bid_price(&self, time: DateTime<Utc>, instrument: &str) -> Option<f64>;
}

/// Quotes derived from daily candles.
///
/// During the session an instrument trades at the day's open; once the day's
/// candle is final its close applies; before the open the previous close
/// applies. An instrument with no candle for a session day has no price
/// during that session.
#[derive(Clone)]
pub struct HistoricalPriceService {
    data: Arc<dyn ExchangeData>,
    spread_bps: f64,
}

impl fmt::Debug for HistoricalPriceService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoricalPriceService")
            .field("spread_bps", &self.spread_bps)
            .finish_non_exhaustive()
    }
}

impl HistoricalPriceService {
    pub fn new(data: Arc<dyn ExchangeData>) -> Self {
        Self {
            data,
            spread_bps: 0.0,
        }
    }

    pub fn with_spread_bps(mut self, spread_bps: f64) -> Self {
        self.spread_bps = spread_bps;
        self
    }

    /// Mid price at `time`.
    pub fn mid_price(&self, time: DateTime<Utc>, instrument: &str) -> Option<f64> {
        let candles = self.data.candles(instrument)?;
        let calendar = self.data.calendar();
        let date = time.date_naive();

        if calendar.is_trading_day(date)
            && time >= calendar.open_on(date)
            && time < calendar.close_on(date)
        {
            let idx = candles.partition_point(|c| c.date() < date);
            return candles.get(idx).filter(|c| c.date() == date).map(|c| c.open);
        }

        let idx = candles.partition_point(|c| c.time <= time);
        idx.checked_sub(1).map(|i| candles[i].close)
    }

    fn half_spread(&self) -> f64 {
        self.spread_bps / 20_000.0
    }
}

impl PriceService for HistoricalPriceService {
    fn ask_price(&self, time: DateTime<Utc>, instrument: &str) -> Option<f64> {
        self.mid_price(time, instrument)
            .map(|p| p * (1.0 + self.half_spread()))
    }

    fn bid_price(&self, time: DateTime<Utc>, instrument: &str) -> Option<f64> {
        self.mid_price(time, instrument)
            .map(|p| p * (1.0 - self.half_spread()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;
    use crate::exchange::data::{ExchangeCalendar, InMemoryExchangeData};
    use chrono::TimeZone;

    fn service() -> HistoricalPriceService {
        let cal = ExchangeCalendar::default();
        let day = |d| Utc.with_ymd_and_hms(2024, 1, d, 21, 0, 0).unwrap();
        let candles = vec![
            Candle::new(day(2), 10.0, 12.0, 9.0, 11.0, 100),
            Candle::new(day(3), 11.5, 13.0, 11.0, 12.0, 100),
        ];
        HistoricalPriceService::new(Arc::new(
            InMemoryExchangeData::new(cal).with_candles("AAA", candles),
        ))
    }

    #[test]
    fn quotes_follow_session() {
        let svc = service();
        let at = |d, h, m| Utc.with_ymd_and_hms(2024, 1, d, h, m, 0).unwrap();

        assert_eq!(svc.ask_price(at(2, 10, 0), "AAA"), None); // before any candle
        assert_eq!(svc.ask_price(at(2, 15, 0), "AAA"), Some(10.0)); // open
        assert_eq!(svc.ask_price(at(2, 21, 0), "AAA"), Some(11.0)); // close
        assert_eq!(svc.ask_price(at(3, 9, 0), "AAA"), Some(11.0)); // previous close
        assert_eq!(svc.ask_price(at(3, 14, 30), "AAA"), Some(11.5));
        assert_eq!(svc.ask_price(at(4, 15, 0), "AAA"), None); // no candle that day
        assert_eq!(svc.ask_price(at(2, 15, 0), "ZZZ"), None);
    }

    #[test]
    fn spread_widens_ask_and_bid() {
        let svc = service().with_spread_bps(100.0);
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap();
        assert!((svc.ask_price(t, "AAA").unwrap() - 10.05).abs() < 1e-10);
        assert!((svc.bid_price(t, "AAA").unwrap() - 9.95).abs() < 1e-10);
    }
}
