//! Dataset construction settings, usually loaded from TOML.

use std::path::PathBuf;

use ntuple::RowRange;
use serde::{Deserialize, Serialize};

use crate::error::{MeteorError, Result};
use crate::filter::DEFAULT_PT_THRESHOLD;
use crate::select::SelectionMode;
use crate::weighting::{EventWeighter, HistogramWeighter, UniformWeighter};

/// Upper bound on candidates kept per event.
///
/// In TOML either a count (`max_candidates = 64`) or `"unlimited"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LimitRepr", into = "LimitRepr")]
pub enum CandidateLimit {
    Limited(usize),
    Unlimited,
}

impl CandidateLimit {
    pub fn get(self) -> Option<usize> {
        match self {
            Self::Limited(n) => Some(n),
            Self::Unlimited => None,
        }
    }
}

impl From<Option<usize>> for CandidateLimit {
    fn from(limit: Option<usize>) -> Self {
        limit.map_or(Self::Unlimited, Self::Limited)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum LimitRepr {
    Count(usize),
    Keyword(String),
}

impl TryFrom<LimitRepr> for CandidateLimit {
    type Error = String;

    fn try_from(repr: LimitRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            LimitRepr::Count(n) => Ok(Self::Limited(n)),
            LimitRepr::Keyword(k) if k.eq_ignore_ascii_case("unlimited") => Ok(Self::Unlimited),
            LimitRepr::Keyword(k) => Err(format!(
                "max_candidates must be a count or \"unlimited\", got \"{k}\""
            )),
        }
    }
}

impl From<CandidateLimit> for LimitRepr {
    fn from(limit: CandidateLimit) -> Self {
        match limit {
            CandidateLimit::Limited(n) => Self::Count(n),
            CandidateLimit::Unlimited => Self::Keyword("unlimited".into()),
        }
    }
}

/// Source column names for candidate and truth quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchNames {
    pub candidate_pt: String,
    pub candidate_eta: String,
    pub candidate_phi: String,
    pub candidate_pdg_id: String,
    pub candidate_charge: String,
    pub candidate_puppi_weight: String,
    pub gen_met_pt: String,
    pub gen_met_phi: String,
}

impl Default for BranchNames {
    fn default() -> Self {
        Self {
            candidate_pt: "L1PuppiCands_pt".into(),
            candidate_eta: "L1PuppiCands_eta".into(),
            candidate_phi: "L1PuppiCands_phi".into(),
            candidate_pdg_id: "L1PuppiCands_pdgId".into(),
            candidate_charge: "L1PuppiCands_charge".into(),
            candidate_puppi_weight: "L1PuppiCands_puppiWeight".into(),
            gen_met_pt: "genMet_pt".into(),
            gen_met_phi: "genMet_phi".into(),
        }
    }
}

/// How event weights are derived from the true MET magnitude.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WeightingConfig {
    #[default]
    Uniform,
    /// Inverse-frequency weights over `bins` equal bins in `[low, high]`.
    Histogram { low: f32, high: f32, bins: usize },
}

impl WeightingConfig {
    pub fn build(&self) -> Result<Box<dyn EventWeighter>> {
        Ok(match self {
            Self::Uniform => Box::new(UniformWeighter),
            Self::Histogram { low, high, bins } => {
                Box::new(HistogramWeighter::uniform_bins(*low, *high, *bins)?)
            }
        })
    }
}

/// Dataset construction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Candidate reduction policy when an event exceeds `max_candidates`.
    #[serde(default)]
    pub selection: SelectionMode,

    /// Maximum candidates kept per event. `0` keeps none.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: CandidateLimit,

    /// First event to read (inclusive).
    #[serde(default)]
    pub entry_start: Option<usize>,

    /// Last event to read (exclusive).
    #[serde(default)]
    pub entry_stop: Option<usize>,

    /// Event filter over scalar columns, e.g. `"genMet_pt > 10"`.
    #[serde(default)]
    pub cut: Option<String>,

    /// Candidate |pt| above which pt is zeroed.
    #[serde(default = "default_pt_threshold")]
    pub pt_threshold: f32,

    #[serde(default)]
    pub branches: BranchNames,

    #[serde(default)]
    pub weighting: WeightingConfig,

    /// JSON file of a fitted `AffineNormalizer`.
    #[serde(default)]
    pub normalizer: Option<PathBuf>,
}

fn default_max_candidates() -> CandidateLimit {
    CandidateLimit::Limited(100)
}
fn default_pt_threshold() -> f32 {
    DEFAULT_PT_THRESHOLD
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            selection: SelectionMode::default(),
            max_candidates: default_max_candidates(),
            entry_start: None,
            entry_stop: None,
            cut: None,
            pt_threshold: default_pt_threshold(),
            branches: BranchNames::default(),
            weighting: WeightingConfig::default(),
            normalizer: None,
        }
    }
}

impl DatasetConfig {
    pub fn row_range(&self) -> RowRange {
        RowRange::new(self.entry_start, self.entry_stop)
    }

    /// Reject invalid settings and warn about legal but suspicious ones.
    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(stop)) = (self.entry_start, self.entry_stop) {
            if start > stop {
                return Err(MeteorError::Config(format!(
                    "entry_start ({start}) is after entry_stop ({stop})"
                )));
            }
        }
        if self.pt_threshold.is_nan() {
            return Err(MeteorError::Config("pt_threshold is NaN".into()));
        }
        if self.pt_threshold <= 0.0 {
            tracing::warn!(
                pt_threshold = self.pt_threshold,
                "pt_threshold <= 0 zeroes every candidate momentum"
            );
        }
        if self.max_candidates == CandidateLimit::Unlimited
            && self.selection == SelectionMode::TopK
        {
            tracing::warn!("selection = \"topk\" has no effect with unlimited max_candidates");
        }
        if self.max_candidates == CandidateLimit::Limited(0) {
            tracing::warn!("max_candidates = 0 produces records without candidates");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let cfg = DatasetConfig::default();
        assert_eq!(cfg.selection, SelectionMode::Truncate);
        assert_eq!(cfg.max_candidates.get(), Some(100));
        assert_eq!(cfg.pt_threshold, 500.0);
        assert_eq!(cfg.branches.candidate_pt, "L1PuppiCands_pt");
        assert_eq!(cfg.branches.gen_met_phi, "genMet_phi");
        assert_eq!(cfg.weighting, WeightingConfig::Uniform);
        assert!(cfg.cut.is_none());
        assert_eq!(cfg.row_range(), RowRange::all());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: DatasetConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, DatasetConfig::default());
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
            selection = "topk"
            max_candidates = 64
            entry_stop = 1000
            cut = "genMet_pt > 5"

            [branches]
            candidate_pt = "Cands_pt"

            [weighting]
            kind = "histogram"
            low = 0.0
            high = 200.0
            bins = 20
        "#;
        let cfg: DatasetConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.selection, SelectionMode::TopK);
        assert_eq!(cfg.max_candidates, CandidateLimit::Limited(64));
        assert_eq!(cfg.row_range(), RowRange::new(None, Some(1000)));
        assert_eq!(cfg.cut.as_deref(), Some("genMet_pt > 5"));
        assert_eq!(cfg.branches.candidate_pt, "Cands_pt");
        // Unspecified branch names keep their defaults.
        assert_eq!(cfg.branches.candidate_eta, "L1PuppiCands_eta");
        assert_eq!(
            cfg.weighting,
            WeightingConfig::Histogram {
                low: 0.0,
                high: 200.0,
                bins: 20
            }
        );
        assert!(cfg.weighting.build().is_ok());
    }

    #[test]
    fn test_unlimited_keyword() {
        let cfg: DatasetConfig = toml::from_str(r#"max_candidates = "unlimited""#).unwrap();
        assert_eq!(cfg.max_candidates.get(), None);
        assert!(toml::from_str::<DatasetConfig>(r#"max_candidates = "lots""#).is_err());
    }

    #[test]
    fn test_limit_from_option() {
        assert_eq!(CandidateLimit::from(Some(3)), CandidateLimit::Limited(3));
        assert_eq!(CandidateLimit::from(None), CandidateLimit::Unlimited);
    }

    #[test]
    fn test_validate() {
        let mut cfg = DatasetConfig::default();
        assert!(cfg.validate().is_ok());

        cfg.entry_start = Some(10);
        cfg.entry_stop = Some(5);
        assert!(matches!(cfg.validate(), Err(MeteorError::Config(_))));

        cfg.entry_stop = None;
        cfg.max_candidates = CandidateLimit::Unlimited;
        assert!(cfg.validate().is_ok());

        cfg.pt_threshold = f32::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bad_histogram_fails_to_build() {
        let weighting = WeightingConfig::Histogram {
            low: 10.0,
            high: 0.0,
            bins: 5,
        };
        assert!(matches!(weighting.build(), Err(MeteorError::Config(_))));
    }
}
