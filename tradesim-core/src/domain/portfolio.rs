//! Portfolio: cash account plus security holdings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::security_trade::SecurityTrade;

/// One movement on the cash account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashTransaction {
    pub time: DateTime<Utc>,
    /// Signed amount: negative for debits.
    pub amount: f64,
    pub balance_after: f64,
    pub memo: String,
}

/// Cash balance with its transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashAccount {
    pub balance: f64,
    pub transactions: Vec<CashTransaction>,
}

impl CashAccount {
    pub fn new(balance: f64) -> Self {
        Self {
            balance,
            transactions: Vec::new(),
        }
    }

    pub fn debit(&mut self, time: DateTime<Utc>, amount: f64, memo: impl Into<String>) {
        self.apply(time, -amount, memo.into());
    }

    pub fn credit(&mut self, time: DateTime<Utc>, amount: f64, memo: impl Into<String>) {
        self.apply(time, amount, memo.into());
    }

    fn apply(&mut self, time: DateTime<Utc>, amount: f64, memo: String) {
        self.balance += amount;
        self.transactions.push(CashTransaction {
            time,
            amount,
            balance_after: self.balance,
            memo,
        });
    }
}

/// A held instrument and the confirmed trades applied to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub instrument: String,
    pub quantity: f64,
    pub history: Vec<SecurityTrade>,
}

impl Security {
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            quantity: 0.0,
            history: Vec::new(),
        }
    }

    /// Merge a confirmed trade into the position.
    pub fn apply(&mut self, trade: SecurityTrade) {
        if trade.is_sell() {
            self.quantity = (self.quantity - trade.quantity).max(0.0);
        } else {
            self.quantity += trade.quantity;
        }
        self.history.push(trade);
    }

    pub fn is_held(&self) -> bool {
        self.quantity > 0.0
    }

    /// Total paid on buys, fees included.
    pub fn cost_basis(&self) -> f64 {
        self.history
            .iter()
            .filter(|t| t.is_buy())
            .map(SecurityTrade::total_cost)
            .sum()
    }
}

/// Aggregate portfolio state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: CashAccount,
    pub securities: BTreeMap<String, Security>,
    /// Mark-to-market history.
    pub valuations: BTreeMap<DateTime<Utc>, f64>,
}

impl Portfolio {
    pub fn new(starting_cash: f64) -> Self {
        Self {
            cash: CashAccount::new(starting_cash),
            securities: BTreeMap::new(),
            valuations: BTreeMap::new(),
        }
    }

    pub fn cash_balance(&self) -> f64 {
        self.cash.balance
    }

    /// Held quantity of `instrument` (zero when absent).
    pub fn holding(&self, instrument: &str) -> f64 {
        self.securities.get(instrument).map_or(0.0, |s| s.quantity)
    }

    pub fn is_held(&self, instrument: &str) -> bool {
        self.securities.get(instrument).is_some_and(Security::is_held)
    }

    /// Instruments with a positive holding.
    pub fn held_instruments(&self) -> impl Iterator<Item = &str> {
        self.securities
            .values()
            .filter(|s| s.is_held())
            .map(|s| s.instrument.as_str())
    }

    /// Cash plus holdings valued at `prices`. Missing prices value at zero.
    pub fn value(&self, prices: &BTreeMap<String, f64>) -> f64 {
        let held: f64 = self
            .securities
            .values()
            .map(|s| s.quantity * prices.get(&s.instrument).copied().unwrap_or(0.0))
            .sum();
        self.cash.balance + held
    }

    pub fn record_valuation(&mut self, time: DateTime<Utc>, value: f64) {
        self.valuations.insert(time, value);
    }

    pub fn latest_valuation(&self) -> Option<f64> {
        self.valuations.values().next_back().copied()
    }

    /// Every confirmed trade across all securities, in time order.
    pub fn trades(&self) -> Vec<&SecurityTrade> {
        let mut all: Vec<_> = self.securities.values().flat_map(|s| s.history.iter()).collect();
        all.sort_by_key(|t| t.time);
        all
    }
}
