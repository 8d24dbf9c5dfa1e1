//! Serializable runner configuration.
//!
//! One TOML file describes everything a run needs: the pairs, the engine
//! knobs, the replay/scenario settings, and where artifacts land. The
//! content hash of the config doubles as the run identifier, so identical
//! configs produce identical run ids.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use fxlab_core::replay::ReplayConfig;

/// Unique identifier for a run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Pairs this run trades or replays, e.g. `["EURUSD", "GBPJPY"]`.
    pub pairs: Vec<String>,

    /// Engine, risk, stress, slippage, and gate settings shared by replay
    /// and live cycles.
    pub replay: ReplayConfig,

    /// Directory artifacts are written into.
    pub artifact_dir: PathBuf,

    /// Worker threads for the live cycle and scenario matrix; 0 lets rayon
    /// pick.
    pub workers: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pairs: vec!["EURUSD".to_string()],
            replay: ReplayConfig::default(),
            artifact_dir: PathBuf::from("artifacts"),
            workers: 0,
        }
    }
}

impl RunnerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let cfg: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(cfg)
    }

    /// Deterministic content hash of this configuration.
    pub fn run_id(&self) -> anyhow::Result<RunId> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_configs_share_a_run_id() {
        let a = RunnerConfig::default();
        let b = RunnerConfig::default();
        assert_eq!(a.run_id().unwrap(), b.run_id().unwrap());

        let mut c = RunnerConfig::default();
        c.replay.master_seed = 7;
        assert_ne!(a.run_id().unwrap(), c.run_id().unwrap());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: RunnerConfig = toml::from_str(
            r#"
            pairs = ["EURUSD", "USDJPY"]

            [replay]
            master_seed = 42

            [replay.engine]
            partial_at_r = 1.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.pairs.len(), 2);
        assert_eq!(cfg.replay.master_seed, 42);
        assert_eq!(cfg.replay.engine.partial_at_r, 1.5);
        // Untouched sections keep their defaults.
        assert_eq!(cfg.replay.engine.partial_close_pct, 50.0);
        assert_eq!(cfg.workers, 0);
    }
}
