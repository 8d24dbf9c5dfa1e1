//! Artifact export — one directory per (run, pair) with the full paper trail.
//!
//! Layout under `<artifact_dir>/<run_id>/<pair>/`:
//!   ledger.csv     money-moving rows
//!   timeline.json  semantic audit trail
//!   equity.json    per-tick equity curve
//!   summary.json   headline statistics
//!   manifest.json  run id plus the exact config that produced the rest

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use fxlab_core::replay::ReplayReport;

use crate::config::{RunId, RunnerConfig};

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    run_id: &'a str,
    pair: String,
    created_utc: chrono::DateTime<chrono::Utc>,
    config: &'a RunnerConfig,
}

/// Write every artifact for one replay report. Returns the directory the
/// files landed in.
pub fn export_report(
    cfg: &RunnerConfig,
    run_id: &RunId,
    report: &ReplayReport,
) -> Result<PathBuf> {
    let dir = cfg
        .artifact_dir
        .join(run_id)
        .join(report.pair.as_str());
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create artifact dir {}", dir.display()))?;

    write_ledger_csv(&dir.join("ledger.csv"), report)?;
    write_json(&dir.join("equity.json"), &report.equity_curve)?;
    write_json(&dir.join("timeline.json"), report.timeline.events())?;
    write_json(&dir.join("summary.json"), &report.summary)?;
    write_json(
        &dir.join("manifest.json"),
        &Manifest {
            run_id,
            pair: report.pair.to_string(),
            created_utc: chrono::Utc::now(),
            config: cfg,
        },
    )?;
    Ok(dir)
}

fn write_ledger_csv(path: &Path, report: &ReplayReport) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create ledger CSV {}", path.display()))?;
    writer.write_record([
        "id", "ts", "kind", "side", "price", "units", "notional", "pnl", "fee", "reasons",
        "open_units_after", "equity_after",
    ])?;
    for row in report.ledger.rows() {
        writer.write_record([
            row.id.to_string(),
            row.ts.to_rfc3339(),
            row.kind.to_string(),
            row.side.to_string(),
            format!("{:.6}", row.price),
            format!("{:.2}", row.units),
            format!("{:.2}", row.notional),
            format!("{:.4}", row.pnl),
            format!("{:.4}", row.fee),
            row.reasons.join("|"),
            format!("{:.2}", row.open_units_after),
            format!("{:.4}", row.equity_after),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
