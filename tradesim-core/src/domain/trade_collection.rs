//! TradeCollection: an ordered batch of intentions with a validity window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::trade::Trade;

/// Ordered list of trades valid over `[start, end)`.
///
/// Insertion order is preserved and duplicates are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeCollection {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    trades: Vec<Trade>,
}

impl TradeCollection {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            trades: Vec::new(),
        }
    }

    pub fn from_trades(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        trades: impl IntoIterator<Item = Trade>,
    ) -> Self {
        Self {
            start,
            end,
            trades: trades.into_iter().collect(),
        }
    }

    pub fn push(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn extend(&mut self, other: TradeCollection) {
        self.trades.extend(other.trades);
    }

    /// New collection with only the buys, same window.
    pub fn buys(&self) -> TradeCollection {
        self.filtered(Trade::is_buy)
    }

    /// New collection with only the sells, same window.
    pub fn sells(&self) -> TradeCollection {
        self.filtered(Trade::is_sell)
    }

    fn filtered(&self, keep: impl Fn(&Trade) -> bool) -> TradeCollection {
        TradeCollection::from_trades(
            self.start,
            self.end,
            self.trades.iter().filter(|t| keep(t)).cloned(),
        )
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trade> {
        self.trades.iter()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// True when `time` falls in `[start, end)`.
    pub fn covers(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && time < self.end
    }
}

impl IntoIterator for TradeCollection {
    type Item = Trade;
    type IntoIter = std::vec::IntoIter<Trade>;

    fn into_iter(self) -> Self::IntoIter {
        self.trades.into_iter()
    }
}

impl<'a> IntoIterator for &'a TradeCollection {
    type Item = &'a Trade;
    type IntoIter = std::slice::Iter<'a, Trade>;

    fn into_iter(self) -> Self::IntoIter {
        self.trades.iter()
    }
}
