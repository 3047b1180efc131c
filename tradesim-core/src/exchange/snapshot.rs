//! A live-updating view of the exchange data up to a point in time.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::data::{ExchangeCalendar, ExchangeData};
use crate::domain::Candle;

/// Candles visible at `time`: only those that had become final by then.
#[derive(Clone)]
pub struct ExchangeSnapshot {
    data: Arc<dyn ExchangeData>,
    time: DateTime<Utc>,
    visible: BTreeMap<String, Vec<Candle>>,
}

impl fmt::Debug for ExchangeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<_, _> = self.visible.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("ExchangeSnapshot")
            .field("time", &self.time)
            .field("candles", &counts)
            .finish()
    }
}

impl ExchangeSnapshot {
    /// View of `data` as of `time`.
    pub fn as_of(data: Arc<dyn ExchangeData>, time: DateTime<Utc>) -> Self {
        let visible = data
            .instruments()
            .into_iter()
            .map(|instrument| {
                let candles = data
                    .candles(&instrument)
                    .map(|all| {
                        let end = all.partition_point(|c| c.time <= time);
                        all[..end].to_vec()
                    })
                    .unwrap_or_default();
                (instrument, candles)
            })
            .collect();
        Self {
            data,
            time,
            visible,
        }
    }

    /// Reveal every candle that became final in `(self.time, time]`.
    /// Moving backwards is a no-op.
    pub fn advance_to(&mut self, time: DateTime<Utc>) {
        if time <= self.time {
            return;
        }
        for (instrument, visible) in &mut self.visible {
            let Some(all) = self.data.candles(instrument) else {
                continue;
            };
            let last = visible.last().map(|c| c.time);
            let start = match last {
                Some(t) => all.partition_point(|c| c.time <= t),
                None => 0,
            };
            let end = all.partition_point(|c| c.time <= time);
            if start < end {
                visible.extend_from_slice(&all[start..end]);
            }
        }
        self.time = time;
    }

    /// Append a pushed candle. Candles not newer than the last visible one
    /// are ignored.
    pub fn push_candle(&mut self, instrument: &str, candle: Candle) {
        let visible = self.visible.entry(instrument.to_string()).or_default();
        if visible.last().is_some_and(|last| candle.time <= last.time) {
            return;
        }
        if candle.time > self.time {
            self.time = candle.time;
        }
        visible.push(candle);
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn calendar(&self) -> &ExchangeCalendar {
        self.data.calendar()
    }

    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.visible.keys().map(String::as_str)
    }

    pub fn candles(&self, instrument: &str) -> &[Candle] {
        self.visible.get(instrument).map_or(&[], Vec::as_slice)
    }

    pub fn latest(&self, instrument: &str) -> Option<&Candle> {
        self.visible.get(instrument).and_then(|c| c.last())
    }

    /// Last `n` closes, oldest first. Shorter when history is shorter.
    pub fn closes(&self, instrument: &str, n: usize) -> Vec<f64> {
        let candles = self.candles(instrument);
        let start = candles.len().saturating_sub(n);
        candles[start..].iter().map(|c| c.close).collect()
    }

    /// Latest close per instrument with any history.
    pub fn latest_closes(&self) -> BTreeMap<String, f64> {
        self.visible
            .iter()
            .filter_map(|(k, v)| v.last().map(|c| (k.clone(), c.close)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::data::InMemoryExchangeData;
    use chrono::NaiveDate;

    fn data() -> Arc<dyn ExchangeData> {
        let cal = ExchangeCalendar::default();
        let from = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let candles = InMemoryExchangeData::flat_series(&cal, from, to, 50.0);
        Arc::new(InMemoryExchangeData::new(cal).with_candles("AAA", candles))
    }

    #[test]
    fn as_of_hides_future_candles() {
        let data = data();
        let second_close = data.candles("AAA").unwrap()[1].time;
        let snap = ExchangeSnapshot::as_of(Arc::clone(&data), second_close);
        assert_eq!(snap.candles("AAA").len(), 2);
        assert!(snap.candles("BBB").is_empty());
    }

    #[test]
    fn advance_reveals_new_candles_once() {
        let data = data();
        let all = data.candles("AAA").unwrap().to_vec();
        let mut snap = ExchangeSnapshot::as_of(Arc::clone(&data), all[0].time);
        assert_eq!(snap.candles("AAA").len(), 1);

        snap.push_candle("AAA", all[1].clone());
        snap.advance_to(all[2].time);
        assert_eq!(snap.candles("AAA").len(), 3);

        snap.advance_to(all[0].time);
        assert_eq!(snap.time(), all[2].time);
        assert_eq!(snap.closes("AAA", 10), vec![50.0, 50.0, 50.0]);
    }

    #[test]
    fn push_ignores_stale_candles() {
        let data = data();
        let all = data.candles("AAA").unwrap().to_vec();
        let mut snap = ExchangeSnapshot::as_of(Arc::clone(&data), all[1].time);
        snap.push_candle("AAA", all[0].clone());
        assert_eq!(snap.candles("AAA").len(), 2);
        assert_eq!(snap.latest("AAA").map(|c| c.time), Some(all[1].time));
    }
}
