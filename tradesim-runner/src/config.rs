//! Serializable run configuration (TOML).
//!
//! ```toml
//! [simulation]
//! start = "2024-01-02"
//! end = "2024-06-28"
//! driver = "event"            # or "time_increment"
//!
//! [portfolio]
//! starting_cash = 100000.0
//! fraction_to_invest = 0.25
//! trade_fee = 1.0
//! slippage_bps = 5.0
//!
//! [data]
//! source = "synthetic"        # or "csv" with dir = "..."
//! symbols = ["AAA", "BBB"]
//!
//! [decision]
//! type = "momentum"
//! lookback = 20
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use tradesim_core::clock::ClockKind;
use tradesim_core::exchange::ExchangeCalendar;
use tradesim_core::scheduler::SchedulerMode;
use tradesim_core::settings::{EvolverSettings, TradingSettings};

/// Unique identifier for a run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which evolver drives the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    #[default]
    Event,
    TimeIncrement,
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Driver::Event => f.write_str("event"),
            Driver::TimeIncrement => f.write_str("time_increment"),
        }
    }
}

/// Complete configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    pub simulation: SimulationConfig,
    pub portfolio: TradingSettings,
    #[serde(default)]
    pub exchange: ExchangeCalendar,
    pub data: DataConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    /// First simulated day (inclusive).
    pub start: NaiveDate,
    /// Last simulated day (inclusive).
    pub end: NaiveDate,
    /// Days before this date only feed calibration.
    #[serde(default)]
    pub burn_in_end: Option<NaiveDate>,
    #[serde(default = "default_increment_days")]
    pub increment_days: i64,
    #[serde(default)]
    pub driver: Driver,
    #[serde(default)]
    pub clock: ClockKind,
    /// Poll interval of the event scheduler. Absent means drain as fast as
    /// possible.
    #[serde(default)]
    pub timer_interval_ms: Option<u64>,
}

fn default_increment_days() -> i64 {
    1
}

/// Where candles come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// `<dir>/<SYMBOL>.csv` with columns `date,open,high,low,close,volume`.
    Csv,
    /// Deterministic random walk per symbol.
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    pub source: DataSource,
    pub symbols: Vec<String>,
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Synthetic series only: first day's open.
    #[serde(default = "default_start_price")]
    pub start_price: f64,
    /// First day of candles loaded for calibration. Defaults to the
    /// simulation start.
    #[serde(default)]
    pub history_start: Option<NaiveDate>,
}

fn default_start_price() -> f64 {
    100.0
}

/// Decision module selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionConfig {
    /// Buy every instrument every day.
    #[default]
    BuyAll,
    /// Buy above the trailing mean close, sell below it.
    Momentum { lookback: usize },
}

impl RunConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if sim.end < sim.start {
            return Err(ConfigError::Invalid(format!(
                "end {} is before start {}",
                sim.end, sim.start
            )));
        }
        if sim.increment_days < 1 {
            return Err(ConfigError::Invalid("increment_days must be at least 1".into()));
        }
        if let Some(burn_in) = sim.burn_in_end {
            if burn_in < sim.start || burn_in > sim.end {
                return Err(ConfigError::Invalid(format!(
                    "burn_in_end {burn_in} is outside {} .. {}",
                    sim.start, sim.end
                )));
            }
        }
        self.portfolio.validate().map_err(ConfigError::Invalid)?;
        self.exchange
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.data.symbols.is_empty() {
            return Err(ConfigError::Invalid("data.symbols is empty".into()));
        }
        if self.data.source == DataSource::Csv && self.data.dir.is_none() {
            return Err(ConfigError::Invalid("data.dir is required for csv data".into()));
        }
        if !(self.data.start_price > 0.0) {
            return Err(ConfigError::Invalid("data.start_price must be positive".into()));
        }
        if let DecisionConfig::Momentum { lookback: 0 } = self.decision {
            return Err(ConfigError::Invalid("momentum lookback must be positive".into()));
        }
        Ok(())
    }

    /// Deterministic hash of the configuration.
    ///
    /// Two runs with identical configs share the same RunId.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// Midnight UTC at the start of the first day to midnight after the last.
    pub fn evolver_settings(&self) -> EvolverSettings {
        let sim = &self.simulation;
        let mut settings = EvolverSettings::new(midnight(sim.start), midnight(sim.end) + Duration::days(1))
            .with_increment(Duration::days(sim.increment_days))
            .with_clock(sim.clock)
            .with_scheduler(self.scheduler_mode());
        if let Some(burn_in) = sim.burn_in_end {
            settings = settings.with_burn_in_end(midnight(burn_in));
        }
        settings
    }

    pub fn trading_settings(&self) -> TradingSettings {
        self.portfolio
    }

    fn scheduler_mode(&self) -> SchedulerMode {
        match self.simulation.timer_interval_ms {
            Some(ms) => SchedulerMode::Timer {
                interval: std::time::Duration::from_millis(ms),
            },
            None => SchedulerMode::Fast,
        }
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[simulation]
start = "2024-01-02"
end = "2024-03-29"
burn_in_end = "2024-02-01"
driver = "time_increment"

[portfolio]
starting_cash = 50000.0
fraction_to_invest = 0.25
trade_fee = 1.0
slippage_bps = 5.0

[data]
source = "synthetic"
symbols = ["AAA", "BBB"]

[decision]
type = "momentum"
lookback = 10
"#;

    #[test]
    fn parses_full_config() {
        let config = RunConfig::from_toml(SAMPLE).unwrap();

        assert_eq!(config.simulation.driver, Driver::TimeIncrement);
        assert_eq!(config.simulation.increment_days, 1);
        assert_eq!(config.simulation.clock, ClockKind::Simulation);
        assert_eq!(config.portfolio.spread_bps, 0.0);
        assert_eq!(config.exchange, ExchangeCalendar::default());
        assert_eq!(config.decision, DecisionConfig::Momentum { lookback: 10 });
        assert_eq!(config.data.start_price, 100.0);
    }

    #[test]
    fn evolver_settings_cover_whole_days() {
        let config = RunConfig::from_toml(SAMPLE).unwrap();
        let settings = config.evolver_settings();

        assert_eq!(settings.start, midnight(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));
        assert_eq!(settings.end, midnight(NaiveDate::from_ymd_opt(2024, 3, 30).unwrap()));
        assert_eq!(
            settings.trading_start(),
            midnight(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())
        );
        assert_eq!(settings.scheduler, SchedulerMode::Fast);
    }

    #[test]
    fn timer_interval_selects_timer_mode() {
        let toml = SAMPLE.replace(
            "driver = \"time_increment\"",
            "timer_interval_ms = 2",
        );
        let config = RunConfig::from_toml(&toml).unwrap();

        assert_eq!(config.simulation.driver, Driver::Event);
        assert_eq!(
            config.evolver_settings().scheduler,
            SchedulerMode::Timer {
                interval: std::time::Duration::from_millis(2)
            }
        );
    }

    #[test]
    fn run_id_deterministic_and_sensitive() {
        let config = RunConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.run_id(), config.run_id());
        assert_eq!(config.run_id().len(), 64);

        let mut other = config.clone();
        other.decision = DecisionConfig::Momentum { lookback: 20 };
        assert_ne!(config.run_id(), other.run_id());
    }

    #[test]
    fn rejects_invalid_configs() {
        let cases = [
            ("end = \"2024-03-29\"", "end = \"2023-12-01\""),
            ("fraction_to_invest = 0.25", "fraction_to_invest = 1.5"),
            ("symbols = [\"AAA\", \"BBB\"]", "symbols = []"),
            ("source = \"synthetic\"", "source = \"csv\""),
            ("lookback = 10", "lookback = 0"),
        ];
        for (from, to) in cases {
            let toml = SAMPLE.replace(from, to);
            let err = RunConfig::from_toml(&toml).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{to}: {err}");
        }
    }

    #[test]
    fn parse_errors_are_reported() {
        let err = RunConfig::from_toml("[simulation]\nstart = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
