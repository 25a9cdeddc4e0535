//! Record-to-tensor pipeline for missing transverse momentum regression.
//!
//! Turns ragged per-event candidate lists read from ntuples into fixed-shape
//! burn tensors. Each event becomes a [`Record`]; lists of records become a
//! padded, masked [`MeteorBatch`].
//!
//! # Key types
//!
//! - [`EventAssembler`]: outlier filter, candidate selection, coordinate
//!   transform, categorical encoding and target derivation for one file
//! - [`MeteorDataset`]: concatenated records, usable as a burn `Dataset`
//! - [`MeteorBatcher`] / [`collate`]: padding and mask derivation
//! - [`Normalizer`] / [`EventWeighter`]: pluggable rescaling and weighting
//! - [`DatasetConfig`]: configuration loaded from TOML

pub mod assemble;
pub mod batch;
pub mod bridge;
pub mod config;
pub mod coords;
pub mod dataset;
pub mod encoding;
pub mod error;
pub mod filter;
pub mod mocks;
pub mod normalize;
pub mod record;
pub mod select;
pub mod weighting;

pub use assemble::EventAssembler;
pub use batch::{collate, try_collate, BatchShapes, MeteorBatch, MeteorBatcher};
pub use config::{BranchNames, CandidateLimit, DatasetConfig, WeightingConfig};
pub use coords::polar_to_cartesian;
pub use dataset::{DatasetSummary, MeteorDataset};
pub use encoding::{
    Charge, EncodingError, ParticleType, CHARGE_NUM_EMBEDDINGS, CONT_NUM_FEATURES,
    PDGID_NUM_EMBEDDINGS, TARGET_NUM_FEATURES,
};
pub use error::{MeteorError, Result};
pub use filter::{remove_pt_outliers, DEFAULT_PT_THRESHOLD};
pub use normalize::{transform_ragged, AffineNormalizer, Normalizer};
pub use record::{Record, RecordParts};
pub use select::{select_candidates, Selection, SelectionMode};
pub use weighting::{EventWeighter, HistogramWeighter, UniformWeighter};
