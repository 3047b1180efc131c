//! SecurityTrade: the priced, fee-inclusive outcome of an executed intention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::trade::{Trade, TradeDirection};

/// A confirmed trade. Built only by a trade submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityTrade {
    pub time: DateTime<Utc>,
    pub instrument: String,
    pub direction: TradeDirection,
    /// Executed share count.
    pub quantity: f64,
    /// Execution price per share, slippage included.
    pub price: f64,
    /// Fixed per-trade fee.
    pub fee: f64,
    /// The intention this trade executed.
    pub trade: Trade,
}

impl SecurityTrade {
    pub fn new(time: DateTime<Utc>, trade: Trade, quantity: f64, price: f64, fee: f64) -> Self {
        Self {
            time,
            instrument: trade.instrument.clone(),
            direction: trade.direction,
            quantity,
            price,
            fee,
            trade,
        }
    }

    pub fn gross(&self) -> f64 {
        self.quantity * self.price
    }

    /// Cash moved by the trade: paid for a buy, received for a sell.
    pub fn total_cost(&self) -> f64 {
        match self.direction {
            TradeDirection::Sell => self.gross() - self.fee,
            _ => self.gross() + self.fee,
        }
    }

    /// The trade as executed: filled quantity, limit at the fill price.
    pub fn executed(&self) -> Trade {
        Trade::new(self.instrument.clone(), self.direction, self.quantity).with_limit(self.price)
    }

    pub fn is_buy(&self) -> bool {
        self.direction == TradeDirection::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.direction == TradeDirection::Sell
    }
}
