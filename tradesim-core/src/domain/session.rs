use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading-hours state of the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangeSession {
    Closed,
    PreOpen,
    Continuous,
    PostClose,
}

impl ExchangeSession {
    pub fn is_open(self) -> bool {
        self == ExchangeSession::Continuous
    }
}

impl fmt::Display for ExchangeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExchangeSession::Closed => "Closed",
            ExchangeSession::PreOpen => "PreOpen",
            ExchangeSession::Continuous => "Continuous",
            ExchangeSession::PostClose => "PostClose",
        };
        f.write_str(s)
    }
}

/// A scheduled session transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTransition {
    pub time: DateTime<Utc>,
    pub session: ExchangeSession,
}
