//! TradeHistory: append-only, time-keyed record of trade collections.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::trade::Trade;
use super::trade_collection::TradeCollection;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeHistory {
    entries: BTreeMap<DateTime<Utc>, TradeCollection>,
}

impl TradeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `collection` at `time`, concatenating onto any existing entry.
    pub fn add(&mut self, time: DateTime<Utc>, collection: TradeCollection) {
        match self.entries.get_mut(&time) {
            Some(existing) => existing.extend(collection),
            None => {
                self.entries.insert(time, collection);
            }
        }
    }

    /// Append a single trade at `time`.
    pub fn add_trade(&mut self, time: DateTime<Utc>, trade: Trade) {
        self.entries
            .entry(time)
            .or_insert_with(|| TradeCollection::new(time, time + Duration::days(1)))
            .push(trade);
    }

    pub fn get(&self, time: DateTime<Utc>) -> Option<&TradeCollection> {
        self.entries.get(&time)
    }

    /// Total number of trades across every entry.
    pub fn trade_count(&self) -> usize {
        self.entries.values().map(TradeCollection::len).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DateTime<Utc>, &TradeCollection)> {
        self.entries.iter()
    }

    /// Every trade in time order.
    pub fn trades(&self) -> impl Iterator<Item = (DateTime<Utc>, &Trade)> {
        self.entries
            .iter()
            .flat_map(|(time, coll)| coll.iter().map(move |t| (*time, t)))
    }

    pub fn merge(&mut self, other: TradeHistory) {
        for (time, coll) in other.entries {
            self.add(time, coll);
        }
    }
}
