//! Run settings, passed by value into every component constructor.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::ClockKind;
use crate::scheduler::SchedulerMode;

/// Time range and driving mode of one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct EvolverSettings {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Step of the time-increment driver and cadence of the time-update tick.
    pub increment: Duration,
    /// End of the calibration-only period. Trading starts here when set.
    pub burn_in_end: Option<DateTime<Utc>>,
    pub clock: ClockKind,
    pub scheduler: SchedulerMode,
}

impl EvolverSettings {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            increment: Duration::days(1),
            burn_in_end: None,
            clock: ClockKind::Simulation,
            scheduler: SchedulerMode::Fast,
        }
    }

    pub fn with_increment(mut self, increment: Duration) -> Self {
        self.increment = increment;
        self
    }

    pub fn with_burn_in_end(mut self, burn_in_end: DateTime<Utc>) -> Self {
        self.burn_in_end = Some(burn_in_end);
        self
    }

    pub fn with_clock(mut self, clock: ClockKind) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerMode) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// First instant at which trades may be submitted.
    pub fn trading_start(&self) -> DateTime<Utc> {
        match self.burn_in_end {
            Some(t) if t > self.start => t,
            _ => self.start,
        }
    }

    /// Increment rounded to whole days, minimum one.
    pub fn day_step(&self) -> Duration {
        Duration::days(self.increment.num_days().max(1))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.end <= self.start {
            return Err(format!("end {} is not after start {}", self.end, self.start));
        }
        if self.increment <= Duration::zero() {
            return Err("increment must be positive".into());
        }
        if self.burn_in_end.is_some_and(|b| b >= self.end) {
            return Err("burn-in ends after the run does".into());
        }
        Ok(())
    }
}

/// Portfolio construction and cost settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradingSettings {
    pub starting_cash: f64,
    /// Share of available cash committed to a single buy, in (0, 1].
    pub fraction_to_invest: f64,
    /// Fixed fee charged per executed trade.
    pub trade_fee: f64,
    /// Directional slippage in basis points.
    pub slippage_bps: f64,
    /// Quoted ask/bid spread in basis points.
    #[serde(default)]
    pub spread_bps: f64,
}

impl TradingSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.starting_cash.is_nan() || self.starting_cash < 0.0 {
            return Err(format!("starting cash {} is negative", self.starting_cash));
        }
        if self.fraction_to_invest <= 0.0 || !(0.0..=1.0).contains(&self.fraction_to_invest) {
            return Err(format!(
                "fraction to invest {} is outside (0, 1]",
                self.fraction_to_invest
            ));
        }
        if self.trade_fee < 0.0 || self.slippage_bps < 0.0 || self.spread_bps < 0.0 {
            return Err("fees, slippage and spread must be non-negative".into());
        }
        Ok(())
    }
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            starting_cash: 100_000.0,
            fraction_to_invest: 1.0,
            trade_fee: 0.0,
            slippage_bps: 0.0,
            spread_bps: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn trading_start_defaults_to_start() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let settings = EvolverSettings::new(start, end);
        assert_eq!(settings.trading_start(), start);

        let burn_in = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        assert_eq!(settings.with_burn_in_end(burn_in).trading_start(), burn_in);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(EvolverSettings::new(start, start).validate().is_err());

        let trading = TradingSettings {
            fraction_to_invest: 1.5,
            ..TradingSettings::default()
        };
        assert!(trading.validate().is_err());
        assert!(TradingSettings::default().validate().is_ok());
    }

    #[test]
    fn day_step_is_at_least_one_day() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let settings = EvolverSettings::new(start, start).with_increment(Duration::hours(4));
        assert_eq!(settings.day_step(), Duration::days(1));
        let settings = settings.with_increment(Duration::days(3));
        assert_eq!(settings.day_step(), Duration::days(3));
    }
}
