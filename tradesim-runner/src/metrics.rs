//! Performance metrics: pure functions over a run's valuation history.
//!
//! Every metric takes an equity curve (one mark-to-market value per session
//! close, starting capital first) and returns a scalar.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use tradesim_core::domain::TradeDirection;
use tradesim_core::EvolverResult;

/// Aggregate statistics of one completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub starting_value: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub sharpe: f64,
    pub decision_count: usize,
    pub trade_count: usize,
    pub buy_count: usize,
    pub sell_count: usize,
    pub fees_paid: f64,
}

impl RunMetrics {
    /// Metrics of `result`. An incomplete result yields all zeros.
    pub fn compute(result: &EvolverResult) -> Self {
        let (Some(start), Some(end)) = (&result.start_portfolio, &result.portfolio) else {
            return Self::default();
        };

        let starting_value = start.value(&BTreeMap::new());
        let curve = equity_curve(starting_value, end.valuations.values().copied());
        let executed = end.trades();

        Self {
            starting_value,
            final_value: curve.last().copied().unwrap_or(starting_value),
            total_return: total_return(&curve),
            max_drawdown: max_drawdown(&curve),
            sharpe: sharpe_ratio(&curve, 0.0),
            decision_count: result.decisions.trade_count(),
            trade_count: executed.len(),
            buy_count: executed.iter().filter(|t| t.direction == TradeDirection::Buy).count(),
            sell_count: executed.iter().filter(|t| t.direction == TradeDirection::Sell).count(),
            fees_paid: executed.iter().map(|t| t.fee).sum(),
        }
    }
}

/// Starting capital followed by every recorded valuation.
pub fn equity_curve(starting_value: f64, valuations: impl IntoIterator<Item = f64>) -> Vec<f64> {
    std::iter::once(starting_value).chain(valuations).collect()
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    let (Some(&initial), Some(&final_eq)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if equity_curve.len() < 2 || initial <= 0.0 {
        return 0.0;
    }
    (final_eq - initial) / initial
}

/// Largest peak-to-trough decline as a non-positive fraction.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let mut peak = equity_curve[0];
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Annualized Sharpe ratio from daily returns.
///
/// Sharpe = mean(daily returns - rf) / std(daily returns) * sqrt(252).
/// Returns 0.0 if variance is zero or fewer than 2 returns.
pub fn sharpe_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean_f64(&excess);
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * (252.0_f64).sqrt()
}

pub fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
