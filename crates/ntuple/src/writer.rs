//! Writes per-event columns to Parquet ntuples.

use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float32Array, Int32Array, ListArray};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use crate::error::{NtupleError, Result};
use crate::types::{Column, EventColumns};

/// Buffers named columns and writes them as one Parquet row group.
///
/// Scalar columns become `Float32`/`Int32` fields and ragged columns become
/// `List` fields. Column order in the file follows insertion order.
pub struct NtupleWriter {
    columns: Vec<(String, Column)>,
    output_path: PathBuf,
}

impl NtupleWriter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            columns: Vec::new(),
            output_path: output_path.into(),
        }
    }

    /// Buffer a column. All columns must share one event count; a column
    /// with an existing name replaces it.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if let Some((first_name, first)) = self.columns.iter().find(|(n, _)| *n != name) {
            if first.num_events() != column.num_events() {
                tracing::warn!(
                    column = %name,
                    reference = %first_name,
                    "Rejected column with mismatched event count"
                );
                return Err(NtupleError::LengthMismatch {
                    name,
                    expected: first.num_events(),
                    found: column.num_events(),
                });
            }
        }
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = column,
            None => self.columns.push((name, column)),
        }
        Ok(())
    }

    /// Buffer every column of an event collection, in name order.
    pub fn push_all(&mut self, events: &EventColumns) -> Result<()> {
        for name in events.names() {
            if let Some(column) = events.get(name) {
                self.push_column(name, column.clone())?;
            }
        }
        Ok(())
    }

    /// Number of buffered columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Write all buffered columns and return the output path.
    pub fn finish(self) -> Result<PathBuf> {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|(name, column)| Field::new(name.as_str(), data_type(column), false))
            .collect();
        let schema = Arc::new(Schema::new(fields));
        let num_events = self.columns.first().map_or(0, |(_, c)| c.num_events());

        let file = std::fs::File::create(&self.output_path)?;
        let mut writer = ArrowWriter::try_new(file, schema.clone(), None)?;
        if !self.columns.is_empty() {
            let arrays: Vec<ArrayRef> = self.columns.iter().map(|(_, c)| to_array(c)).collect();
            let batch = RecordBatch::try_new(schema, arrays)?;
            writer.write(&batch)?;
        }
        writer.close()?;

        tracing::info!(
            columns = self.columns.len(),
            events = num_events,
            path = %self.output_path.display(),
            "Wrote ntuple Parquet file"
        );

        Ok(self.output_path)
    }
}

fn item_field(item: DataType) -> Arc<Field> {
    Arc::new(Field::new("item", item, true))
}

fn data_type(column: &Column) -> DataType {
    match column {
        Column::Float(_) => DataType::Float32,
        Column::Int(_) => DataType::Int32,
        Column::FloatList(_) => DataType::List(item_field(DataType::Float32)),
        Column::IntList(_) => DataType::List(item_field(DataType::Int32)),
    }
}

fn to_array(column: &Column) -> ArrayRef {
    match column {
        Column::Float(v) => Arc::new(Float32Array::from(v.clone())),
        Column::Int(v) => Arc::new(Int32Array::from(v.clone())),
        Column::FloatList(lists) => {
            let values: Vec<f32> = lists.iter().flatten().copied().collect();
            Arc::new(ListArray::new(
                item_field(DataType::Float32),
                OffsetBuffer::from_lengths(lists.iter().map(Vec::len)),
                Arc::new(Float32Array::from(values)),
                None,
            ))
        }
        Column::IntList(lists) => {
            let values: Vec<i32> = lists.iter().flatten().copied().collect();
            Arc::new(ListArray::new(
                item_field(DataType::Int32),
                OffsetBuffer::from_lengths(lists.iter().map(Vec::len)),
                Arc::new(Int32Array::from(values)),
                None,
            ))
        }
    }
}
