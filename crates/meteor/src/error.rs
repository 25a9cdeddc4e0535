use crate::encoding::EncodingError;

/// Errors that can occur while assembling records or collating batches.
#[derive(Debug, thiserror::Error)]
pub enum MeteorError {
    /// The event source failed to read or filter a file.
    #[error("Source error: {0}")]
    Source(#[from] ntuple::NtupleError),

    /// A raw particle-type or charge code outside the closed tables.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Per-candidate fields of one event disagree on length.
    #[error("Candidate field '{field}' has {found} entries, expected {expected}")]
    RaggedMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    /// The event weighter returned the wrong number of weights.
    #[error("Weighter returned {found} weights for {expected} events")]
    WeightLength { expected: usize, found: usize },

    /// A normalizer changed the shape of its input or could not be fitted.
    #[error("Normalization error: {0}")]
    Normalization(String),

    /// Collation was asked for a batch of zero records.
    #[error("Cannot collate an empty batch")]
    EmptyBatch,

    /// Invalid configuration value.
    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, MeteorError>;
