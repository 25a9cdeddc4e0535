//! In-memory event source for testing without Parquet files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ntuple::{CutExpr, EventColumns, EventSource, FieldSpec, NtupleError, RowRange};

/// Event source that serves canned columns keyed by path.
///
/// Applies the row range, then the cut, then projects onto the requested
/// fields, the same order as the Parquet reader. Unknown paths fail with a
/// `NotFound` IO error.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    files: HashMap<PathBuf, EventColumns>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the columns served for `path`.
    pub fn add_file(&mut self, path: impl Into<PathBuf>, columns: EventColumns) {
        self.files.insert(path.into(), columns);
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, columns: EventColumns) -> Self {
        self.add_file(path, columns);
        self
    }
}

impl EventSource for MockSource {
    fn read(
        &self,
        path: &Path,
        fields: &[FieldSpec],
        range: RowRange,
        cut: Option<&str>,
    ) -> ntuple::Result<EventColumns> {
        let columns = self.files.get(path).ok_or_else(|| {
            NtupleError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no mock file registered for {}", path.display()),
            ))
        })?;

        let (start, stop) = range.resolve(columns.num_events())?;
        let window: Vec<usize> = (start..stop).collect();
        let mut events = columns.filter_events(&window);
        if let Some(cut) = cut {
            let keep = CutExpr::compile(cut)?.select(&events)?;
            events = events.filter_events(&keep);
        }

        let mut out = EventColumns::new();
        for field in fields {
            let column = events
                .get(&field.name)
                .ok_or_else(|| NtupleError::MissingColumn(field.name.clone()))?;
            if column.kind() != field.kind {
                return Err(NtupleError::ColumnType {
                    name: field.name.clone(),
                    expected: field.kind,
                    found: column.kind().to_string(),
                });
            }
            out.insert(field.name.clone(), column.clone())?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntuple::Column;

    fn source() -> MockSource {
        let columns = EventColumns::from_columns([
            ("met", Column::Float(vec![1.0, 2.0, 3.0, 4.0])),
            ("pt", Column::FloatList(vec![vec![1.0], vec![], vec![2.0, 3.0], vec![4.0]])),
        ])
        .unwrap();
        MockSource::new().with_file("a.parquet", columns)
    }

    #[test]
    fn test_projects_requested_fields() {
        let events = source()
            .read(
                Path::new("a.parquet"),
                &[FieldSpec::float_list("pt")],
                RowRange::all(),
                None,
            )
            .unwrap();
        assert_eq!(events.names().collect::<Vec<_>>(), vec!["pt"]);
        assert_eq!(events.num_events(), 4);
    }

    #[test]
    fn test_range_then_cut() {
        let events = source()
            .read(
                Path::new("a.parquet"),
                &[FieldSpec::float("met")],
                RowRange::new(Some(1), None),
                Some("met != 3"),
            )
            .unwrap();
        assert_eq!(events.float("met").unwrap(), &[2.0, 4.0]);
    }

    #[test]
    fn test_unknown_path_and_kind_mismatch() {
        let src = source();
        let err = src
            .read(Path::new("b.parquet"), &[], RowRange::all(), None)
            .unwrap_err();
        assert!(matches!(err, NtupleError::Io(_)));

        let err = src
            .read(
                Path::new("a.parquet"),
                &[FieldSpec::float("pt")],
                RowRange::all(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, NtupleError::ColumnType { .. }));
    }
}
