//! Columnar I/O for collider ntuples.
//!
//! Reads and writes flat Parquet files where each row is one event and
//! candidate-level quantities are stored as list columns. A small cut
//! language selects events by their scalar columns.

pub mod cut;
pub mod error;
pub mod reader;
pub mod types;
pub mod writer;

pub use cut::CutExpr;
pub use error::{NtupleError, Result};
pub use reader::{EventSource, ParquetEventReader, DEFAULT_BATCH_SIZE};
pub use types::{Column, EventColumns, FieldKind, FieldSpec, RowRange};
pub use writer::NtupleWriter;
