//! Exchange side of the simulation: historical data, quotes, the session
//! state machine, the price feed and the simulated market.

pub mod cost_model;
pub mod data;
pub mod price;
pub mod price_feed;
pub mod session_tracker;
pub mod simulated;
pub mod snapshot;

pub use cost_model::CostModel;
pub use data::{ExchangeCalendar, ExchangeData, InMemoryExchangeData};
pub use price::{HistoricalPriceService, PriceService};
pub use price_feed::{PriceFeedService, PRICE_FEED};
pub use session_tracker::{SessionTrackerService, SESSION_TRACKER};
pub use simulated::{SimulatedExchange, TradeSubmitter, SIMULATED_EXCHANGE};
pub use snapshot::ExchangeSnapshot;
