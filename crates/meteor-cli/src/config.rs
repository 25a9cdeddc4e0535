//! TOML config loading for the meteor CLI.
//!
//! Deserializes `configs/dataset.toml`, which has a single `[dataset]`
//! section, then merges it with CLI overrides.

use std::path::{Path, PathBuf};

use meteor::{CandidateLimit, DatasetConfig, SelectionMode};
use serde::Deserialize;

/// Top-level structure matching `configs/dataset.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct MeteorToml {
    #[serde(default)]
    pub dataset: DatasetConfig,
}

/// Dataset settings given on the command line.
#[derive(Debug, Default, Clone)]
pub struct DatasetOverrides {
    pub selection: Option<SelectionMode>,
    pub max_candidates: Option<usize>,
    pub unlimited: bool,
    pub entry_start: Option<usize>,
    pub entry_stop: Option<usize>,
    pub cut: Option<String>,
    pub normalizer: Option<PathBuf>,
}

/// Load and deserialize a `MeteorToml` from a TOML file.
pub fn load_meteor_toml(path: &Path) -> anyhow::Result<MeteorToml> {
    let contents = std::fs::read_to_string(path)?;
    let config: MeteorToml = toml::from_str(&contents)?;
    tracing::info!(path = %path.display(), "Loaded dataset config");
    Ok(config)
}

/// Build the dataset config from defaults, an optional TOML file and CLI flags.
///
/// Priority chain: `DatasetConfig::default()` < TOML values < CLI flags.
pub fn build_dataset_config(
    config_path: Option<&Path>,
    overrides: &DatasetOverrides,
) -> anyhow::Result<DatasetConfig> {
    let mut config = match config_path {
        Some(path) => load_meteor_toml(path)?.dataset,
        None => DatasetConfig::default(),
    };
    apply_overrides(&mut config, overrides)?;
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut DatasetConfig, overrides: &DatasetOverrides) -> anyhow::Result<()> {
    if overrides.unlimited && overrides.max_candidates.is_some() {
        anyhow::bail!("--max-candidates and --unlimited are mutually exclusive");
    }
    if let Some(mode) = overrides.selection {
        config.selection = mode;
    }
    if let Some(n) = overrides.max_candidates {
        config.max_candidates = CandidateLimit::Limited(n);
    }
    if overrides.unlimited {
        config.max_candidates = CandidateLimit::Unlimited;
    }
    if overrides.entry_start.is_some() {
        config.entry_start = overrides.entry_start;
    }
    if overrides.entry_stop.is_some() {
        config.entry_stop = overrides.entry_stop;
    }
    if let Some(cut) = &overrides.cut {
        config.cut = Some(cut.clone());
    }
    if let Some(path) = &overrides.normalizer {
        config.normalizer = Some(path.clone());
    }
    Ok(())
}
