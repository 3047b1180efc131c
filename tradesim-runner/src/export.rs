//! Artifact export: JSON, CSV and Markdown.
//!
//! - **JSON**: the full `RunReport`, schema versioned
//! - **CSV**: executed trades, submitted decisions and the valuation history
//! - **Markdown**: a one-page summary
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tradesim_core::domain::{Portfolio, TradeHistory};

use crate::runner::{RunReport, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize RunReport to JSON")
}

/// Deserialize a `RunReport`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<RunReport> {
    let report: RunReport =
        serde_json::from_str(json).context("failed to deserialize RunReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Executed trades with prices and fees, in time order.
///
/// Columns: time, instrument, direction, quantity, price, fee, cash_moved
pub fn export_trades_csv(portfolio: &Portfolio) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "time",
        "instrument",
        "direction",
        "quantity",
        "price",
        "fee",
        "cash_moved",
    ])?;
    for t in portfolio.trades() {
        wtr.write_record([
            &t.time.to_rfc3339(),
            &t.instrument,
            &t.direction.to_string(),
            &format!("{:.6}", t.quantity),
            &format!("{:.6}", t.price),
            &format!("{:.2}", t.fee),
            &format!("{:.2}", t.total_cost()),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Every submitted intention keyed by submission time.
///
/// Columns: time, instrument, direction, quantity, limit_price. A zero
/// quantity means the amount was left to validation.
pub fn export_decisions_csv(decisions: &TradeHistory) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["time", "instrument", "direction", "quantity", "limit_price"])?;
    for (time, t) in decisions.trades() {
        wtr.write_record([
            &time.to_rfc3339(),
            &t.instrument,
            &t.direction.to_string(),
            &format!("{:.6}", t.quantity),
            &t.limit_price.map(|p| format!("{p:.6}")).unwrap_or_default(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Mark-to-market history with time and value columns.
pub fn export_valuations_csv(portfolio: &Portfolio) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["time", "value"])?;
    for (time, value) in &portfolio.valuations {
        wtr.write_record([&time.to_rfc3339(), &format!("{value:.2}")])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Markdown report ────────────────────────────────────────────────

pub fn generate_report(report: &RunReport) -> String {
    let m = &report.metrics;
    let mut md = String::with_capacity(1024);

    md.push_str("# Simulation Report\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run | `{}` |\n", report.run_id));
    md.push_str(&format!("| Driver | {} |\n", report.driver));
    md.push_str(&format!("| Decision | {:?} |\n", report.decision));
    md.push_str(&format!("| Symbols | {} |\n", report.sources.len()));
    md.push_str(&format!("| Dataset Hash | `{}` |\n", report.dataset_hash));
    if report.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    md.push_str("## Performance\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Starting Value | {:.2} |\n", m.starting_value));
    md.push_str(&format!("| Final Value | {:.2} |\n", m.final_value));
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return * 100.0));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown * 100.0));
    md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe));
    md.push_str(&format!("| Decisions | {} |\n", m.decision_count));
    md.push_str(&format!(
        "| Trades | {} ({} buys, {} sells) |\n",
        m.trade_count, m.buy_count, m.sell_count
    ));
    md.push_str(&format!("| Fees | {:.2} |\n", m.fees_paid));
    md
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set of a run.
///
/// Creates `run_<id prefix>/` under `output_dir` containing:
/// - `report.json`: the full `RunReport`
/// - `report.md`: the summary
/// - `trades.csv`, `decisions.csv`, `valuations.csv`
///
/// Identical configs write to the same directory. Returns its path.
pub fn save_artifacts(report: &RunReport, output_dir: &Path) -> Result<PathBuf> {
    let prefix = report.run_id.get(..12).unwrap_or(&report.run_id);
    let run_dir = output_dir.join(format!("run_{prefix}"));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(run_dir.join("report.md"), generate_report(report))?;
    std::fs::write(
        run_dir.join("decisions.csv"),
        export_decisions_csv(&report.result.decisions)?,
    )?;
    if let Some(portfolio) = &report.result.portfolio {
        std::fs::write(run_dir.join("trades.csv"), export_trades_csv(portfolio)?)?;
        std::fs::write(run_dir.join("valuations.csv"), export_valuations_csv(portfolio)?)?;
    }

    Ok(run_dir)
}

/// Load a `RunReport` from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<RunReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
