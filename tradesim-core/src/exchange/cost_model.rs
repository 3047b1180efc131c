//! Cost model: slippage and fee calculation.
//!
//! Slippage is directional: buyers pay more (higher price), sellers receive
//! less (lower price). The fee is a fixed amount per executed trade.

use crate::domain::TradeDirection;
use crate::settings::TradingSettings;

/// Execution friction applied by the simulated exchange.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    /// Slippage in basis points, applied directionally.
    pub slippage_bps: f64,
    /// Fixed fee per trade.
    pub trade_fee: f64,
}

impl CostModel {
    pub fn new(slippage_bps: f64, trade_fee: f64) -> Self {
        Self {
            slippage_bps,
            trade_fee,
        }
    }

    pub fn from_settings(settings: &TradingSettings) -> Self {
        Self::new(settings.slippage_bps, settings.trade_fee)
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Quoted price moved against the trader by the slippage.
    pub fn apply_slippage(&self, quote: f64, direction: TradeDirection) -> f64 {
        let slip_fraction = self.slippage_bps / 10_000.0;
        match direction {
            TradeDirection::Sell => quote * (1.0 - slip_fraction),
            _ => quote * (1.0 + slip_fraction),
        }
    }

    /// Largest whole share count whose cost plus fee fits in `funds`.
    pub fn affordable_quantity(&self, price: f64, funds: f64) -> f64 {
        if price <= 0.0 {
            return 0.0;
        }
        let mut quantity = ((funds - self.trade_fee) / price).floor().max(0.0);
        // Rounding in the division can overshoot by one share.
        if quantity > 0.0 && quantity * price + self.trade_fee > funds {
            quantity -= 1.0;
        }
        quantity
    }
}
