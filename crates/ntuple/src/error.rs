use crate::types::FieldKind;

/// Errors that can occur while reading or writing ntuple files.
#[derive(Debug, thiserror::Error)]
pub enum NtupleError {
    /// IO error opening or creating a file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Parquet decoding or encoding failure.
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow cast or record batch construction failure.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// A requested column is not present in the file or collection.
    #[error("Column '{0}' not found")]
    MissingColumn(String),

    /// A column exists but does not have the requested shape or dtype.
    #[error("Column '{name}' is {found}, expected {expected}")]
    ColumnType {
        name: String,
        expected: FieldKind,
        found: String,
    },

    /// Columns in one collection disagree on the number of events.
    #[error("Column '{name}' has {found} events, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// Event window with start after stop.
    #[error("Invalid row range: start {start} > stop {stop}")]
    RowRange { start: usize, stop: usize },

    /// Cut expression failed to parse or referenced an unusable column.
    #[error("Cut expression error: {0}")]
    Cut(String),
}

/// Result alias for ntuple operations.
pub type Result<T> = std::result::Result<T, NtupleError>;
