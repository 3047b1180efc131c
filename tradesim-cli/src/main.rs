//! TradeSim CLI: run and check simulation configs.
//!
//! Commands:
//! - `run`: execute a simulation from a TOML config file and save artifacts
//! - `check`: validate a config and the data it points at without running

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tradesim_core::exchange::ExchangeData;
use tradesim_runner::{load_candles, save_artifacts, Driver, RunConfig, RunReport};

#[derive(Parser)]
#[command(
    name = "tradesim",
    about = "TradeSim CLI: event-driven trading simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DriverArg {
    Event,
    TimeIncrement,
}

impl From<DriverArg> for Driver {
    fn from(arg: DriverArg) -> Self {
        match arg {
            DriverArg::Event => Driver::Event,
            DriverArg::TimeIncrement => Driver::TimeIncrement,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a simulation from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Override the configured driver.
        #[arg(long, value_enum)]
        driver: Option<DriverArg>,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the summary only; write no artifacts.
        #[arg(long, default_value_t = false)]
        no_save: bool,

        /// Print the full report as JSON instead of the summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Validate a config and load its data without running.
    Check {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            driver,
            output_dir,
            no_save,
            json,
        } => run_cmd(config, driver, output_dir, no_save, json),
        Commands::Check { config } => check_cmd(config),
    }
}

fn run_cmd(
    config_path: PathBuf,
    driver: Option<DriverArg>,
    output_dir: PathBuf,
    no_save: bool,
    json: bool,
) -> Result<()> {
    let mut config = RunConfig::from_file(&config_path)?;
    if let Some(driver) = driver {
        config.simulation.driver = driver.into();
    }

    let report = tradesim_runner::run(&config)
        .with_context(|| format!("run of {} failed", config_path.display()))?;

    if json {
        println!("{}", tradesim_runner::export::export_json(&report)?);
    } else {
        print_summary(&config, &report);
    }

    if !no_save {
        let run_dir = save_artifacts(&report, &output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn check_cmd(config_path: PathBuf) -> Result<()> {
    let config = RunConfig::from_file(&config_path)?;
    let sim = &config.simulation;
    let from = config.data.history_start.unwrap_or(sim.start).min(sim.start);
    let loaded = load_candles(&config.data, &config.exchange, from, sim.end)?;
    loaded
        .data
        .validate()
        .context("loaded candles fail validation")?;

    println!("Config OK:      {}", config_path.display());
    println!("Run ID:         {}", config.run_id());
    println!("Dataset Hash:   {}", loaded.dataset_hash);
    for symbol in loaded.data.instruments() {
        let candles = loaded.data.candles(&symbol).unwrap_or_default();
        if let (Some(first), Some(last)) = (candles.first(), candles.last()) {
            println!(
                "  {symbol:<8} {} candles, {} to {}",
                candles.len(),
                first.date(),
                last.date()
            );
        }
    }
    if loaded.has_synthetic {
        println!("WARNING: data is SYNTHETIC");
    }
    Ok(())
}

fn print_summary(config: &RunConfig, report: &RunReport) {
    let m = &report.metrics;
    println!();
    println!("=== Simulation Result ===");
    println!("Run ID:         {}", report.run_id);
    println!(
        "Period:         {} to {}",
        config.simulation.start, config.simulation.end
    );
    println!("Driver:         {}", report.driver);
    println!("Symbols:        {}", config.data.symbols.join(", "));
    println!("Decisions:      {}", m.decision_count);
    println!(
        "Trades:         {} ({} buys, {} sells)",
        m.trade_count, m.buy_count, m.sell_count
    );
    println!();
    println!("--- Performance ---");
    println!("Start Value:    {:.2}", m.starting_value);
    println!("Final Value:    {:.2}", m.final_value);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Fees Paid:      {:.2}", m.fees_paid);
    if report.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
}
