//! Trade: an intention to buy or sell an instrument.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
    Unknown,
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeDirection::Buy => "Buy",
            TradeDirection::Sell => "Sell",
            TradeDirection::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// An unvalidated trade intention as produced by a decision module.
///
/// `quantity == 0.0` means "amount unspecified": the portfolio manager sizes
/// the trade at validation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub instrument: String,
    pub direction: TradeDirection,
    pub quantity: f64,
    pub limit_price: Option<f64>,
}

impl Trade {
    pub fn new(instrument: impl Into<String>, direction: TradeDirection, quantity: f64) -> Self {
        Self {
            instrument: instrument.into(),
            direction,
            quantity,
            limit_price: None,
        }
    }

    /// Buy with the amount left to validation.
    pub fn buy(instrument: impl Into<String>) -> Self {
        Self::new(instrument, TradeDirection::Buy, 0.0)
    }

    /// Sell with the amount left to validation.
    pub fn sell(instrument: impl Into<String>) -> Self {
        Self::new(instrument, TradeDirection::Sell, 0.0)
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_limit(mut self, limit_price: f64) -> Self {
        self.limit_price = Some(limit_price);
        self
    }

    pub fn is_buy(&self) -> bool {
        self.direction == TradeDirection::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.direction == TradeDirection::Sell
    }

    pub fn has_quantity(&self) -> bool {
        self.quantity > 0.0
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.direction, self.instrument)?;
        if self.has_quantity() {
            write!(f, " x{}", self.quantity)?;
        }
        if let Some(limit) = self.limit_price {
            write!(f, " @ {limit:.4}")?;
        }
        Ok(())
    }
}
