//! FXLab CLI — replay and scenario commands.
//!
//! Commands:
//! - `replay` — run one recorded fixture through the lifecycle engine and
//!   export the full artifact set
//! - `scenario` — replay a fixture across a seed/severity grid and report
//!   the spread of outcomes
//! - `run-id` — print the content-addressed id a config resolves to

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use fxlab_core::replay::{ReplayDriver, ReplayFixture, ReplayReport};
use fxlab_runner::artifacts::export_report;
use fxlab_runner::config::RunnerConfig;
use fxlab_runner::scenario::{ScenarioGrid, ScenarioReport};

#[derive(Parser)]
#[command(
    name = "fxlab",
    about = "FXLab CLI — FX position lifecycle engine and replay simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded fixture through the lifecycle engine.
    Replay {
        /// Path to a TOML run config. Defaults apply if omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to the JSON quote/signal fixture.
        #[arg(long)]
        fixture: PathBuf,

        /// Override the artifact directory from the config.
        #[arg(long)]
        artifact_dir: Option<PathBuf>,

        /// Master seed override.
        #[arg(long)]
        seed: Option<u64>,

        /// Skip writing artifacts; print the summary only.
        #[arg(long, default_value_t = false)]
        no_artifacts: bool,
    },
    /// Replay a fixture across a scenario grid.
    Scenario {
        /// Path to a TOML run config. Defaults apply if omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to the JSON quote/signal fixture.
        #[arg(long)]
        fixture: PathBuf,

        /// Path to a TOML grid definition. Defaults to a single-cell grid.
        #[arg(long)]
        grid: Option<PathBuf>,

        /// Master seeds, overriding the grid file.
        #[arg(long, num_args = 1.., value_delimiter = ',')]
        seeds: Vec<u64>,
    },
    /// Print the run id a config resolves to.
    RunId {
        /// Path to a TOML run config. Defaults apply if omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Replay {
            config,
            fixture,
            artifact_dir,
            seed,
            no_artifacts,
        } => run_replay(config, &fixture, artifact_dir, seed, no_artifacts),
        Commands::Scenario {
            config,
            fixture,
            grid,
            seeds,
        } => run_scenario(config, &fixture, grid, seeds),
        Commands::RunId { config } => {
            let cfg = load_config(config)?;
            println!("{}", cfg.run_id()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<RunnerConfig> {
    match path {
        Some(path) => RunnerConfig::load(&path),
        None => Ok(RunnerConfig::default()),
    }
}

fn load_fixture(path: &Path) -> Result<ReplayFixture> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read fixture {}", path.display()))?;
    let fixture = ReplayFixture::from_json(&raw)
        .with_context(|| format!("failed to parse fixture {}", path.display()))?;
    Ok(fixture)
}

fn run_replay(
    config: Option<PathBuf>,
    fixture_path: &Path,
    artifact_dir: Option<PathBuf>,
    seed: Option<u64>,
    no_artifacts: bool,
) -> Result<()> {
    let mut cfg = load_config(config)?;
    if let Some(dir) = artifact_dir {
        cfg.artifact_dir = dir;
    }
    if let Some(seed) = seed {
        cfg.replay.master_seed = seed;
    }

    let fixture = load_fixture(fixture_path)?;
    let report = ReplayDriver::new(cfg.replay.clone())
        .run(&fixture)
        .with_context(|| format!("replay failed for {}", fixture.pair))?;

    print_summary(&report);

    if !no_artifacts {
        let run_id = cfg.run_id()?;
        let dir = export_report(&cfg, &run_id, &report)?;
        println!("Artifacts saved to: {}", dir.display());
    }
    Ok(())
}

fn run_scenario(
    config: Option<PathBuf>,
    fixture_path: &Path,
    grid_path: Option<PathBuf>,
    seeds: Vec<u64>,
) -> Result<()> {
    let cfg = load_config(config)?;
    let fixture = load_fixture(fixture_path)?;

    let mut grid = match grid_path {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read grid {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("failed to parse grid {}", path.display()))?
        }
        None => ScenarioGrid::default(),
    };
    if !seeds.is_empty() {
        grid.master_seeds = seeds;
    }

    let report = grid.run(&cfg.replay, &fixture)?;
    print_scenario(&report);
    Ok(())
}

fn print_summary(report: &ReplayReport) {
    let s = &report.summary;
    println!();
    println!("=== Replay Result ===");
    println!("Pair:            {}", report.pair);
    println!("Ticks:           {}", s.ticks);
    println!("Closed legs:     {}", s.closed_legs);
    println!("Blocked entries: {}", s.blocked_entries);
    println!();
    println!("--- Performance ---");
    println!("Initial Equity:  {:.2}", s.initial_equity);
    println!("Final Equity:    {:.2}", s.final_equity);
    println!("Realized PnL:    {:.2}", s.realized_pnl);
    println!("Return:          {:.2}%", s.return_pct);
    match s.win_rate {
        Some(rate) => println!("Win Rate:        {:.1}%", rate * 100.0),
        None => println!("Win Rate:        n/a"),
    }
    println!("Max Drawdown:    {:.2}%", s.max_drawdown_pct);
    println!("Rollover Fees:   {:.2}", s.rollover_fees);
    println!();
}

fn print_scenario(report: &ScenarioReport) {
    println!();
    println!("=== Scenario Matrix ({} cells) ===", report.outcomes.len());
    println!(
        "{:<40} {:>10} {:>10} {:>10}",
        "Cell", "Return %", "Max DD %", "Legs"
    );
    println!("{}", "-".repeat(74));
    for outcome in &report.outcomes {
        println!(
            "{:<40} {:>10.2} {:>10.2} {:>10}",
            outcome.label,
            outcome.summary.return_pct,
            outcome.summary.max_drawdown_pct,
            outcome.summary.closed_legs
        );
    }
    if let (Some(best), Some(worst)) = (report.best(), report.worst()) {
        println!();
        println!("Best:  {} ({:.2}%)", best.label, best.summary.return_pct);
        println!("Worst: {} ({:.2}%)", worst.label, worst.summary.return_pct);
    }
    println!();
}
