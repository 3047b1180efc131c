//! Portfolio manager: the single writer of the portfolio.
//!
//! Validation sizes intentions against the current cash and holdings; applying
//! a confirmed trade moves cash and merges the trade into the security's
//! history. Price updates keep a mark-to-market valuation series.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{Portfolio, Security, SecurityTrade, Trade, TradeDirection};
use crate::events::{PriceListener, PriceUpdate};
use crate::exchange::PriceService;
use crate::logging::LogSink;
use crate::settings::TradingSettings;

const CATEGORY: &str = "PortfolioManager";

/// Why an intention failed validation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvalidTrade {
    #[error("no price for {0}")]
    NoPrice(String),

    #[error("cash {cash:.2} does not cover one share at {price:.4}")]
    InsufficientCash { cash: f64, price: f64 },

    #[error("no whole share of {instrument} is affordable at {price:.4}")]
    NothingAffordable { instrument: String, price: f64 },

    #[error("{0} is not held")]
    NotHeld(String),

    #[error("selling {instrument} would leave cash at {cash_after:.2} after the fee")]
    FeeExceedsProceeds { instrument: String, cash_after: f64 },

    #[error("trade has no direction")]
    NoDirection,
}

pub struct PortfolioManager {
    portfolio: Portfolio,
    start_portfolio: Portfolio,
    prices: Arc<dyn PriceService>,
    settings: TradingSettings,
    last_prices: BTreeMap<String, f64>,
    log: Arc<dyn LogSink>,
}

impl fmt::Debug for PortfolioManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortfolioManager")
            .field("cash", &self.portfolio.cash.balance)
            .field("securities", &self.portfolio.securities.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PortfolioManager {
    pub fn new(
        portfolio: Portfolio,
        prices: Arc<dyn PriceService>,
        settings: TradingSettings,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            start_portfolio: portfolio.clone(),
            portfolio,
            prices,
            settings,
            last_prices: BTreeMap::new(),
            log,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// The portfolio as it was handed in.
    pub fn start_portfolio(&self) -> &Portfolio {
        &self.start_portfolio
    }

    pub fn price_service(&self) -> &dyn PriceService {
        self.prices.as_ref()
    }

    pub fn settings(&self) -> &TradingSettings {
        &self.settings
    }

    pub fn available_funds(&self) -> f64 {
        self.portfolio.cash.balance
    }

    /// Size and check an intention against the portfolio at `time`.
    ///
    /// A buy is sized at `floor((fraction * cash - fee) / ask)` shares, capped
    /// by any quantity the intention requested. A sell always covers the
    /// whole position, and is refused when its proceeds at the bid would not
    /// cover the fee out of the remaining cash.
    pub fn validate_trade(&self, time: DateTime<Utc>, trade: &Trade) -> Result<Trade, InvalidTrade> {
        match trade.direction {
            TradeDirection::Buy => {
                let price = self
                    .prices
                    .ask_price(time, &trade.instrument)
                    .ok_or_else(|| InvalidTrade::NoPrice(trade.instrument.clone()))?;
                let cash = self.available_funds();
                if cash <= price {
                    return Err(InvalidTrade::InsufficientCash { cash, price });
                }
                let budget = self.settings.fraction_to_invest * cash - self.settings.trade_fee;
                let affordable = (budget / price).floor();
                if affordable <= 0.0 {
                    return Err(InvalidTrade::NothingAffordable {
                        instrument: trade.instrument.clone(),
                        price,
                    });
                }
                let quantity = if trade.has_quantity() {
                    trade.quantity.min(affordable)
                } else {
                    affordable
                };
                Ok(trade.clone().with_quantity(quantity))
            }
            TradeDirection::Sell => {
                let held = self.portfolio.holding(&trade.instrument);
                if held <= 0.0 {
                    return Err(InvalidTrade::NotHeld(trade.instrument.clone()));
                }
                if let Some(bid) = self.prices.bid_price(time, &trade.instrument) {
                    let cash_after = self.available_funds() + held * bid - self.settings.trade_fee;
                    if cash_after < 0.0 {
                        return Err(InvalidTrade::FeeExceedsProceeds {
                            instrument: trade.instrument.clone(),
                            cash_after,
                        });
                    }
                }
                Ok(trade.clone().with_quantity(held))
            }
            TradeDirection::Unknown => Err(InvalidTrade::NoDirection),
        }
    }

    /// Apply a confirmed trade: merge it into the security and move cash.
    pub fn add_trade(&mut self, trade: SecurityTrade) {
        let time = trade.time;
        let cost = trade.total_cost();
        let memo = format!("{} {} x{}", trade.direction, trade.instrument, trade.quantity);
        let sell = trade.is_sell();
        self.last_prices.insert(trade.instrument.clone(), trade.price);
        self.portfolio
            .securities
            .entry(trade.instrument.clone())
            .or_insert_with(|| Security::new(trade.instrument.clone()))
            .apply(trade);
        if sell {
            self.portfolio.cash.credit(time, cost, memo);
        } else {
            self.portfolio.cash.debit(time, cost, memo);
        }
        if self.portfolio.cash.balance < 0.0 {
            self.log.error(
                CATEGORY,
                &format!("cash went negative: {:.2}", self.portfolio.cash.balance),
            );
        }
    }

    /// Fold `prices` into the last known prices and record a valuation.
    pub fn update_valuation(&mut self, time: DateTime<Utc>, prices: &BTreeMap<String, f64>) -> f64 {
        for (instrument, price) in prices {
            self.last_prices.insert(instrument.clone(), *price);
        }
        let value = self.value();
        self.portfolio.record_valuation(time, value);
        value
    }

    /// Value at the last known prices.
    pub fn value(&self) -> f64 {
        self.portfolio.value(&self.last_prices)
    }

    pub fn into_portfolio(self) -> Portfolio {
        self.portfolio
    }
}

impl PriceListener for PortfolioManager {
    fn on_price_update(&mut self, update: &PriceUpdate) {
        let prices = BTreeMap::from([(update.instrument.clone(), update.candle.close)]);
        self.update_valuation(update.candle.time, &prices);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NullLog;
    use chrono::TimeZone;

    struct Quote(Option<f64>);

    impl PriceService for Quote {
        fn ask_price(&self, _: DateTime<Utc>, _: &str) -> Option<f64> {
            self.0
        }
        fn bid_price(&self, _: DateTime<Utc>, _: &str) -> Option<f64> {
            self.0
        }
    }

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap()
    }

    fn manager(cash: f64, price: Option<f64>, fraction: f64, fee: f64) -> PortfolioManager {
        let settings = TradingSettings {
            starting_cash: cash,
            fraction_to_invest: fraction,
            trade_fee: fee,
            ..TradingSettings::default()
        };
        PortfolioManager::new(
            Portfolio::new(cash),
            Arc::new(Quote(price)),
            settings,
            Arc::new(NullLog),
        )
    }

    #[test]
    fn buy_is_sized_from_cash_fraction_and_fee() {
        let pm = manager(20_000.0, Some(100.0), 0.5, 10.0);
        let sized = pm.validate_trade(t(), &Trade::buy("AAA")).unwrap();
        // (0.5 * 20_000 - 10) / 100 = 99.9 -> 99
        assert_eq!(sized.quantity, 99.0);
    }

    #[test]
    fn requested_quantity_is_capped() {
        let pm = manager(1_000.0, Some(100.0), 1.0, 0.0);
        let small = pm.validate_trade(t(), &Trade::buy("AAA").with_quantity(3.0)).unwrap();
        assert_eq!(small.quantity, 3.0);
        let large = pm.validate_trade(t(), &Trade::buy("AAA").with_quantity(50.0)).unwrap();
        assert_eq!(large.quantity, 10.0);
    }

    #[test]
    fn buy_rejections() {
        let no_price = manager(1_000.0, None, 1.0, 0.0);
        assert_eq!(
            no_price.validate_trade(t(), &Trade::buy("AAA")),
            Err(InvalidTrade::NoPrice("AAA".into()))
        );

        let poor = manager(100.0, Some(100.0), 1.0, 0.0);
        assert!(matches!(
            poor.validate_trade(t(), &Trade::buy("AAA")),
            Err(InvalidTrade::InsufficientCash { .. })
        ));

        let fee_bound = manager(150.0, Some(100.0), 1.0, 60.0);
        assert!(matches!(
            fee_bound.validate_trade(t(), &Trade::buy("AAA")),
            Err(InvalidTrade::NothingAffordable { .. })
        ));
    }

    #[test]
    fn sell_covers_whole_position() {
        let mut pm = manager(1_000.0, Some(10.0), 1.0, 0.0);
        assert_eq!(
            pm.validate_trade(t(), &Trade::sell("AAA")),
            Err(InvalidTrade::NotHeld("AAA".into()))
        );

        pm.add_trade(SecurityTrade::new(t(), Trade::buy("AAA"), 40.0, 10.0, 0.0));
        let sell = pm
            .validate_trade(t(), &Trade::sell("AAA").with_quantity(5.0))
            .unwrap();
        assert_eq!(sell.quantity, 40.0);
    }

    #[test]
    fn sell_refused_when_fee_would_overdraw_cash() {
        let mut pm = manager(60.0, Some(7.5), 1.0, 40.0);
        pm.add_trade(SecurityTrade::new(t(), Trade::buy("BBB"), 1.0, 7.5, 40.0));
        assert_eq!(pm.available_funds(), 12.5);

        // 12.5 + 7.5 - 40 = -20
        assert_eq!(
            pm.validate_trade(t(), &Trade::sell("BBB")),
            Err(InvalidTrade::FeeExceedsProceeds {
                instrument: "BBB".into(),
                cash_after: -20.0,
            })
        );
    }

    #[test]
    fn unknown_direction_is_rejected() {
        let pm = manager(1_000.0, Some(10.0), 1.0, 0.0);
        let trade = Trade::new("AAA", TradeDirection::Unknown, 1.0);
        assert_eq!(pm.validate_trade(t(), &trade), Err(InvalidTrade::NoDirection));
    }

    #[test]
    fn add_trade_moves_cash_both_ways() {
        let mut pm = manager(1_000.0, Some(10.0), 1.0, 1.0);
        pm.add_trade(SecurityTrade::new(t(), Trade::buy("AAA"), 50.0, 10.0, 1.0));
        assert_eq!(pm.available_funds(), 499.0);
        assert_eq!(pm.portfolio().holding("AAA"), 50.0);

        pm.add_trade(SecurityTrade::new(t(), Trade::sell("AAA"), 50.0, 12.0, 1.0));
        assert_eq!(pm.available_funds(), 1_098.0);
        assert!(!pm.portfolio().is_held("AAA"));
        assert_eq!(pm.portfolio().cash.transactions.len(), 2);
        assert_eq!(pm.start_portfolio().cash_balance(), 1_000.0);
    }

    #[test]
    fn price_updates_record_valuations() {
        let mut pm = manager(1_000.0, Some(10.0), 1.0, 0.0);
        pm.add_trade(SecurityTrade::new(t(), Trade::buy("AAA"), 10.0, 10.0, 0.0));
        let close = Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap();
        pm.on_price_update(&PriceUpdate {
            instrument: "AAA".into(),
            candle: crate::domain::Candle::flat(close, 15.0),
        });
        // 900 cash + 10 * 15
        assert_eq!(pm.portfolio().valuations.get(&close), Some(&1_050.0));
    }
}
