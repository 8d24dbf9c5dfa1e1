//! Scenario matrices — one fixture replayed across a grid of conditions.
//!
//! Each cell perturbs the base config along named axes (seed, slippage
//! severity, stress severity, risk per trade) and replays the same fixture.
//! Cells are independent, so the grid runs on the rayon pool; per-cell RNG
//! comes from the cell's own master seed and iteration index, making the
//! whole matrix reproducible regardless of scheduling order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use fxlab_core::replay::{ReplayConfig, ReplayDriver, ReplayError, ReplayFixture, ReplaySummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioGrid {
    pub master_seeds: Vec<u64>,
    /// Multipliers applied to every slippage component.
    pub slippage_scales: Vec<f64>,
    /// Scales the stress penalties: each multiplier m becomes 1 + (m-1)*s.
    pub stress_scales: Vec<f64>,
    pub risk_per_trade_pcts: Vec<f64>,
}

impl Default for ScenarioGrid {
    fn default() -> Self {
        Self {
            master_seeds: vec![0],
            slippage_scales: vec![1.0],
            stress_scales: vec![1.0],
            risk_per_trade_pcts: vec![1.0],
        }
    }
}

/// One fully-resolved grid cell.
#[derive(Debug, Clone)]
pub struct ScenarioCell {
    pub label: String,
    pub config: ReplayConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub label: String,
    pub master_seed: u64,
    pub summary: ReplaySummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub outcomes: Vec<ScenarioOutcome>,
}

impl ScenarioReport {
    pub fn best(&self) -> Option<&ScenarioOutcome> {
        self.outcomes
            .iter()
            .max_by(|a, b| a.summary.return_pct.total_cmp(&b.summary.return_pct))
    }

    pub fn worst(&self) -> Option<&ScenarioOutcome> {
        self.outcomes
            .iter()
            .min_by(|a, b| a.summary.return_pct.total_cmp(&b.summary.return_pct))
    }
}

impl ScenarioGrid {
    pub fn size(&self) -> usize {
        self.master_seeds.len()
            * self.slippage_scales.len()
            * self.stress_scales.len()
            * self.risk_per_trade_pcts.len()
    }

    /// Expand the grid against a base config. Cell order is the fixed
    /// nesting order of the axes, independent of how cells later run.
    pub fn generate(&self, base: &ReplayConfig) -> Vec<ScenarioCell> {
        let mut cells = Vec::with_capacity(self.size());
        for (iteration, &seed) in self.master_seeds.iter().enumerate() {
            for &slip in &self.slippage_scales {
                for &stress in &self.stress_scales {
                    for &risk in &self.risk_per_trade_pcts {
                        let mut config = base.clone();
                        config.master_seed = seed;
                        config.iteration = iteration as u64;
                        config.risk.risk_per_trade_pct = risk;

                        config.slippage.entry_bps *= slip;
                        config.slippage.exit_bps *= slip;
                        config.slippage.medium_event_add_bps *= slip;
                        config.slippage.high_event_add_bps *= slip;
                        config.slippage.shock_add_bps *= slip;
                        config.slippage.random_bps *= slip;

                        let widen = |m: f64| 1.0 + (m - 1.0) * stress;
                        config.stress.session_transition_mult =
                            widen(config.stress.session_transition_mult);
                        config.stress.rollover_mult = widen(config.stress.rollover_mult);
                        config.stress.medium_event_mult =
                            widen(config.stress.medium_event_mult);
                        config.stress.high_event_mult = widen(config.stress.high_event_mult);

                        cells.push(ScenarioCell {
                            label: format!(
                                "seed{seed}-slip{slip:.2}-stress{stress:.2}-risk{risk:.2}"
                            ),
                            config,
                        });
                    }
                }
            }
        }
        cells
    }

    /// Replay the fixture across every cell. Outcomes come back in grid
    /// order; a bad fixture fails the whole matrix.
    pub fn run(
        &self,
        base: &ReplayConfig,
        fixture: &ReplayFixture,
    ) -> Result<ScenarioReport, ReplayError> {
        let cells = self.generate(base);
        info!(cells = cells.len(), pair = %fixture.pair, "running scenario matrix");
        let outcomes = cells
            .into_par_iter()
            .map(|cell| {
                let report = ReplayDriver::new(cell.config.clone()).run(fixture)?;
                Ok(ScenarioOutcome {
                    label: cell.label,
                    master_seed: cell.config.master_seed,
                    summary: report.summary,
                })
            })
            .collect::<Result<Vec<_>, ReplayError>>()?;
        Ok(ScenarioReport { outcomes })
    }
}
