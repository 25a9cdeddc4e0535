//! Column types for per-event data: scalars and ragged candidate lists.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{NtupleError, Result};

/// Shape and dtype of a column as requested from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// One `f32` per event.
    Float,
    /// One `i32` per event.
    Int,
    /// A variable-length list of `f32` per event.
    FloatList,
    /// A variable-length list of `i32` per event.
    IntList,
}

impl FieldKind {
    /// Whether the column holds one list per event.
    pub fn is_ragged(self) -> bool {
        matches!(self, Self::FloatList | Self::IntList)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float => write!(f, "float"),
            Self::Int => write!(f, "int"),
            Self::FloatList => write!(f, "float[]"),
            Self::IntList => write!(f, "int[]"),
        }
    }
}

/// A named column to read, with the shape it is expected to have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Int)
    }

    pub fn float_list(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::FloatList)
    }

    pub fn int_list(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::IntList)
    }
}

/// Values of one column across all events.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<f32>),
    Int(Vec<i32>),
    FloatList(Vec<Vec<f32>>),
    IntList(Vec<Vec<i32>>),
}

impl Column {
    /// An empty column of the given kind.
    pub fn empty(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Float => Self::Float(Vec::new()),
            FieldKind::Int => Self::Int(Vec::new()),
            FieldKind::FloatList => Self::FloatList(Vec::new()),
            FieldKind::IntList => Self::IntList(Vec::new()),
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Float(_) => FieldKind::Float,
            Self::Int(_) => FieldKind::Int,
            Self::FloatList(_) => FieldKind::FloatList,
            Self::IntList(_) => FieldKind::IntList,
        }
    }

    /// Number of events in the column.
    pub fn num_events(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::FloatList(v) => v.len(),
            Self::IntList(v) => v.len(),
        }
    }

    /// Keep only the events at `keep`, in the given order.
    pub fn take(&self, keep: &[usize]) -> Self {
        match self {
            Self::Float(v) => Self::Float(keep.iter().map(|&i| v[i]).collect()),
            Self::Int(v) => Self::Int(keep.iter().map(|&i| v[i]).collect()),
            Self::FloatList(v) => Self::FloatList(keep.iter().map(|&i| v[i].clone()).collect()),
            Self::IntList(v) => Self::IntList(keep.iter().map(|&i| v[i].clone()).collect()),
        }
    }

    /// Per-event values widened to `f64`, for scalar columns only.
    pub fn scalar_values(&self) -> Option<Vec<f64>> {
        match self {
            Self::Float(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Self::Int(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Self::FloatList(_) | Self::IntList(_) => None,
        }
    }
}

/// Half-open event window `[start, stop)`. Unset bounds mean the file edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowRange {
    pub start: Option<usize>,
    pub stop: Option<usize>,
}

impl RowRange {
    pub fn new(start: Option<usize>, stop: Option<usize>) -> Self {
        Self { start, stop }
    }

    /// The whole file.
    pub fn all() -> Self {
        Self::default()
    }

    /// Resolve against a file with `total` events. `stop` is clamped to `total`.
    pub fn resolve(&self, total: usize) -> Result<(usize, usize)> {
        let stop = self.stop.unwrap_or(total).min(total);
        let start = self.start.unwrap_or(0);
        if let (Some(start), Some(stop)) = (self.start, self.stop) {
            if start > stop {
                return Err(NtupleError::RowRange { start, stop });
            }
        }
        Ok((start.min(stop), stop))
    }
}

/// Named columns sharing one event axis.
///
/// Every column has the same number of events; insertion fails otherwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventColumns {
    columns: BTreeMap<String, Column>,
    num_events: usize,
}

impl EventColumns {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, column)` pairs, checking event counts agree.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut out = Self::new();
        for (name, column) in columns {
            out.insert(name, column)?;
        }
        Ok(out)
    }

    /// Add or replace a column.
    pub fn insert(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        let others = self.columns.keys().any(|k| *k != name);
        if others && column.num_events() != self.num_events {
            return Err(NtupleError::LengthMismatch {
                name,
                expected: self.num_events,
                found: column.num_events(),
            });
        }
        self.num_events = column.num_events();
        self.columns.insert(name, column);
        Ok(())
    }

    /// Remove a column, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<Column> {
        let column = self.columns.remove(name);
        if self.columns.is_empty() {
            self.num_events = 0;
        }
        column
    }

    pub fn num_events(&self) -> usize {
        self.num_events
    }

    pub fn is_empty(&self) -> bool {
        self.num_events == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Column names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    fn require(&self, name: &str) -> Result<&Column> {
        self.columns
            .get(name)
            .ok_or_else(|| NtupleError::MissingColumn(name.to_string()))
    }

    pub fn float(&self, name: &str) -> Result<&[f32]> {
        match self.require(name)? {
            Column::Float(v) => Ok(v),
            other => Err(type_error(name, FieldKind::Float, other)),
        }
    }

    pub fn int(&self, name: &str) -> Result<&[i32]> {
        match self.require(name)? {
            Column::Int(v) => Ok(v),
            other => Err(type_error(name, FieldKind::Int, other)),
        }
    }

    pub fn float_list(&self, name: &str) -> Result<&[Vec<f32>]> {
        match self.require(name)? {
            Column::FloatList(v) => Ok(v),
            other => Err(type_error(name, FieldKind::FloatList, other)),
        }
    }

    /// Mutable access to a ragged float column; list lengths cannot change
    /// through the returned slice.
    pub fn float_list_mut(&mut self, name: &str) -> Result<&mut [Vec<f32>]> {
        match self.columns.get_mut(name) {
            Some(Column::FloatList(v)) => Ok(v),
            Some(other) => Err(type_error(name, FieldKind::FloatList, other)),
            None => Err(NtupleError::MissingColumn(name.to_string())),
        }
    }

    pub fn int_list(&self, name: &str) -> Result<&[Vec<i32>]> {
        match self.require(name)? {
            Column::IntList(v) => Ok(v),
            other => Err(type_error(name, FieldKind::IntList, other)),
        }
    }

    /// Keep only the events at `keep`, preserving the given order.
    pub fn filter_events(&self, keep: &[usize]) -> Self {
        let columns: BTreeMap<String, Column> = self
            .columns
            .iter()
            .map(|(name, column)| (name.clone(), column.take(keep)))
            .collect();
        let num_events = if columns.is_empty() { 0 } else { keep.len() };
        Self {
            columns,
            num_events,
        }
    }
}

fn type_error(name: &str, expected: FieldKind, found: &Column) -> NtupleError {
    NtupleError::ColumnType {
        name: name.to_string(),
        expected,
        found: found.kind().to_string(),
    }
}
