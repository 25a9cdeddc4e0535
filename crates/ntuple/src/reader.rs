//! Reads per-event columns from Parquet ntuples.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float32Type, Int32Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;

use crate::cut::CutExpr;
use crate::error::{NtupleError, Result};
use crate::types::{Column, EventColumns, FieldKind, FieldSpec, RowRange};

/// A source of per-event columns.
///
/// Implementations read the requested `fields` for the events in `range`,
/// then keep only the events passing `cut` (if any). The returned collection
/// holds exactly the requested fields.
pub trait EventSource {
    fn read(
        &self,
        path: &Path,
        fields: &[FieldSpec],
        range: RowRange,
        cut: Option<&str>,
    ) -> Result<EventColumns>;
}

/// Default number of rows decoded per Arrow record batch.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Reads flat Parquet files where every event is one row.
///
/// Scalar fields map to numeric columns and ragged fields to list columns.
/// Values are cast to `f32`/`i32` as requested; null entries read as zero
/// (scalars) or as empty lists.
#[derive(Debug, Clone)]
pub struct ParquetEventReader {
    batch_size: usize,
}

impl Default for ParquetEventReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ParquetEventReader {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Number of events stored in a file, read from the footer only.
    pub fn num_events(path: &Path) -> Result<usize> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
        Ok(builder.metadata().file_metadata().num_rows().max(0) as usize)
    }
}

impl EventSource for ParquetEventReader {
    fn read(
        &self,
        path: &Path,
        fields: &[FieldSpec],
        range: RowRange,
        cut: Option<&str>,
    ) -> Result<EventColumns> {
        let cut = cut.map(CutExpr::compile).transpose()?;

        // Columns the cut needs that the caller did not ask for are read as
        // floats and dropped after filtering.
        let requested: BTreeSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        let mut specs: Vec<FieldSpec> = fields.to_vec();
        let mut extra = Vec::new();
        if let Some(cut) = &cut {
            for name in &cut.required_columns {
                if !requested.contains(name.as_str()) && !extra.contains(name) {
                    extra.push(name.clone());
                    specs.push(FieldSpec::float(name.clone()));
                }
            }
        }

        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
        let total = builder.metadata().file_metadata().num_rows().max(0) as usize;
        let (start, stop) = range.resolve(total)?;

        let arrow_schema = builder.schema().clone();
        let mut roots = BTreeSet::new();
        for spec in &specs {
            let index = arrow_schema
                .index_of(&spec.name)
                .map_err(|_| NtupleError::MissingColumn(spec.name.clone()))?;
            check_kind(&spec.name, spec.kind, arrow_schema.field(index).data_type())?;
            roots.insert(index);
        }

        let mut columns: Vec<Column> = specs.iter().map(|s| Column::empty(s.kind)).collect();
        if stop > start {
            let mask = ProjectionMask::roots(builder.parquet_schema(), roots);
            let reader = builder
                .with_projection(mask)
                .with_offset(start)
                .with_limit(stop - start)
                .with_batch_size(self.batch_size)
                .build()?;

            for batch in reader {
                let batch = batch?;
                for (spec, column) in specs.iter().zip(columns.iter_mut()) {
                    let array = batch
                        .column_by_name(&spec.name)
                        .ok_or_else(|| NtupleError::MissingColumn(spec.name.clone()))?;
                    append(column, array)?;
                }
            }
        }

        let mut events = EventColumns::from_columns(
            specs.iter().map(|s| s.name.clone()).zip(columns),
        )?;
        let read_events = events.num_events();

        if let Some(cut) = &cut {
            let keep = cut.select(&events)?;
            events = events.filter_events(&keep);
            for name in &extra {
                events.remove(name);
            }
        }

        tracing::debug!(
            path = %path.display(),
            fields = fields.len(),
            start,
            stop,
            read = read_events,
            kept = events.num_events(),
            "Read ntuple columns"
        );

        Ok(events)
    }
}

fn list_of(item: DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", item, true)))
}

/// Reject columns whose stored shape cannot be cast to `kind`.
fn check_kind(name: &str, kind: FieldKind, stored: &DataType) -> Result<()> {
    let ok = match (kind.is_ragged(), stored) {
        (false, dt) => dt.is_numeric(),
        (true, DataType::List(item)) | (true, DataType::LargeList(item)) => {
            item.data_type().is_numeric()
        }
        (true, _) => false,
    };
    if ok {
        Ok(())
    } else {
        Err(NtupleError::ColumnType {
            name: name.to_string(),
            expected: kind,
            found: stored.to_string(),
        })
    }
}

/// Cast one Arrow array to the column's dtype and append its events.
fn append(column: &mut Column, array: &ArrayRef) -> Result<()> {
    match column {
        Column::Float(out) => {
            let converted = cast(array, &DataType::Float32)?;
            out.extend_from_slice(converted.as_primitive::<Float32Type>().values());
        }
        Column::Int(out) => {
            let converted = cast(array, &DataType::Int32)?;
            out.extend_from_slice(converted.as_primitive::<Int32Type>().values());
        }
        Column::FloatList(out) => {
            let converted = cast(array, &list_of(DataType::Float32))?;
            let list = converted.as_list::<i32>();
            let values = list.values().as_primitive::<Float32Type>().values();
            let offsets = list.value_offsets();
            for w in offsets.windows(2) {
                out.push(values[w[0] as usize..w[1] as usize].to_vec());
            }
        }
        Column::IntList(out) => {
            let converted = cast(array, &list_of(DataType::Int32))?;
            let list = converted.as_list::<i32>();
            let values = list.values().as_primitive::<Int32Type>().values();
            let offsets = list.value_offsets();
            for w in offsets.windows(2) {
                out.push(values[w[0] as usize..w[1] as usize].to_vec());
            }
        }
    }
    Ok(())
}
