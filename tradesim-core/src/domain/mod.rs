//! Domain types for TradeSim

pub mod candle;
pub mod portfolio;
pub mod security_trade;
pub mod session;
pub mod trade;
pub mod trade_collection;
pub mod trade_history;

pub use candle::Candle;
pub use portfolio::{CashAccount, CashTransaction, Portfolio, Security};
pub use security_trade::SecurityTrade;
pub use session::{ExchangeSession, SessionTransition};
pub use trade::{Trade, TradeDirection};
pub use trade_collection::TradeCollection;
pub use trade_history::TradeHistory;

/// Instrument identifier.
pub type Instrument = String;
