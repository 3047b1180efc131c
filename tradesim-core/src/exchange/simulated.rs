//! Simulated exchange: fills validated trades at quoted prices.

use chrono::{DateTime, Utc};

use super::cost_model::CostModel;
use super::price::PriceService;
use crate::domain::{SecurityTrade, Trade, TradeDirection};
use crate::error::ServiceError;
use crate::events::{EventStream, TradeCompleted};
use crate::logging::LogSink;
use crate::service::Service;
use crate::settings::EvolverSettings;

pub const SIMULATED_EXCHANGE: &str = "SimulatedExchange";

/// Turns a validated trade into a confirmed one, or `None` when it cannot be
/// executed.
pub trait TradeSubmitter: Send {
    fn trade(
        &mut self,
        time: DateTime<Utc>,
        trade: &Trade,
        prices: &dyn PriceService,
        available_funds: f64,
        log: &dyn LogSink,
    ) -> Option<SecurityTrade>;
}

/// Fills at the ask (buys) or bid (sells), plus slippage and a fixed fee.
///
/// A buy whose cost would exceed the available funds after slippage is cut
/// down to what the funds cover. A sell whose fee would leave the cash
/// negative is not filled.
#[derive(Debug)]
pub struct SimulatedExchange {
    cost: CostModel,
    trade_completed: EventStream<TradeCompleted>,
    active: bool,
    executed: usize,
}

impl SimulatedExchange {
    pub fn new(cost: CostModel) -> Self {
        Self {
            cost,
            trade_completed: EventStream::new(),
            active: true,
            executed: 0,
        }
    }

    pub fn trade_completed(&self) -> &EventStream<TradeCompleted> {
        &self.trade_completed
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost
    }

    /// Trades filled so far.
    pub fn executed(&self) -> usize {
        self.executed
    }
}

impl TradeSubmitter for SimulatedExchange {
    fn trade(
        &mut self,
        time: DateTime<Utc>,
        trade: &Trade,
        prices: &dyn PriceService,
        available_funds: f64,
        log: &dyn LogSink,
    ) -> Option<SecurityTrade> {
        if !self.active {
            log.warning(SIMULATED_EXCHANGE, &format!("{trade} rejected: exchange is shut down"));
            return None;
        }
        let quote = match trade.direction {
            TradeDirection::Buy => prices.ask_price(time, &trade.instrument),
            TradeDirection::Sell => prices.bid_price(time, &trade.instrument),
            TradeDirection::Unknown => {
                log.warning(SIMULATED_EXCHANGE, &format!("{trade} has no direction"));
                return None;
            }
        };
        let Some(quote) = quote else {
            log.warning(
                SIMULATED_EXCHANGE,
                &format!("no price for {} at {time}", trade.instrument),
            );
            return None;
        };

        if let Some(limit) = trade.limit_price {
            let reached = match trade.direction {
                TradeDirection::Sell => quote >= limit,
                _ => quote <= limit,
            };
            if !reached {
                log.info(
                    SIMULATED_EXCHANGE,
                    &format!("{trade} not filled: quote {quote:.4} beyond limit"),
                );
                return None;
            }
        }

        if !trade.has_quantity() {
            log.warning(SIMULATED_EXCHANGE, &format!("{trade} has no quantity"));
            return None;
        }
        let price = self.cost.apply_slippage(quote, trade.direction);
        let mut quantity = trade.quantity;
        if trade.is_buy() && quantity * price + self.cost.trade_fee > available_funds {
            quantity = quantity.min(self.cost.affordable_quantity(price, available_funds));
            if quantity <= 0.0 {
                log.info(
                    SIMULATED_EXCHANGE,
                    &format!("{trade} not filled: funds {available_funds:.2} too short"),
                );
                return None;
            }
        }

        let confirmed = SecurityTrade::new(time, trade.clone(), quantity, price, self.cost.trade_fee);
        if confirmed.is_sell() && available_funds + confirmed.total_cost() < 0.0 {
            log.info(
                SIMULATED_EXCHANGE,
                &format!("{trade} not filled: proceeds do not cover the fee"),
            );
            return None;
        }
        self.executed += 1;
        log.debug(
            SIMULATED_EXCHANGE,
            &format!(
                "filled {} {} x{} @ {:.4}",
                confirmed.direction, confirmed.instrument, confirmed.quantity, confirmed.price
            ),
        );
        self.trade_completed.publish(&confirmed);
        Some(confirmed)
    }
}

impl Service for SimulatedExchange {
    fn name(&self) -> &str {
        SIMULATED_EXCHANGE
    }

    fn initialize(&mut self, _settings: &EvolverSettings) -> Result<(), ServiceError> {
        self.active = true;
        Ok(())
    }

    fn restart(&mut self) -> Result<(), ServiceError> {
        self.active = true;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ServiceError> {
        self.active = false;
        Ok(())
    }
}
