//! In-memory dataset of assembled records.

use std::path::{Path, PathBuf};

use burn::data::dataset::Dataset;
use burn::prelude::*;
use ntuple::EventSource;
use serde::Serialize;

use crate::assemble::EventAssembler;
use crate::config::DatasetConfig;
use crate::error::Result;
use crate::normalize::Normalizer;
use crate::record::Record;
use crate::weighting::EventWeighter;

/// Records from one or more source files, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeteorDataset {
    records: Vec<Record>,
}

/// Aggregate statistics over a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub events: usize,
    pub candidates: usize,
    pub min_candidates: usize,
    pub max_candidates: usize,
    pub mean_candidates: f64,
    pub empty_events: usize,
    pub mean_target_met_magnitude: f64,
    pub mean_weight: f64,
}

impl MeteorDataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Read and assemble one file.
    pub fn from_file<B, S>(
        source: &S,
        path: &Path,
        assembler: &EventAssembler<'_, B>,
    ) -> Result<Self>
    where
        B: Backend,
        S: EventSource + ?Sized,
    {
        let config = assembler.config();
        let events = source.read(
            path,
            &assembler.fields(),
            config.row_range(),
            config.cut.as_deref(),
        )?;
        let records = assembler.assemble(events)?;
        tracing::info!(
            path = %path.display(),
            events = records.len(),
            "Assembled records"
        );
        Ok(Self::new(records))
    }

    /// Build a dataset from several files, concatenated in the given order.
    ///
    /// The row range and cut in `config` apply to each file separately.
    pub fn from_files<B, S>(
        source: &S,
        paths: &[PathBuf],
        config: &DatasetConfig,
        weighter: &dyn EventWeighter,
        normalizer: Option<&dyn Normalizer<B>>,
        device: &B::Device,
    ) -> Result<Self>
    where
        B: Backend,
        S: EventSource + ?Sized,
    {
        config.validate()?;
        let mut assembler = EventAssembler::<B>::new(config, weighter, device.clone());
        if let Some(normalizer) = normalizer {
            assembler = assembler.with_normalizer(normalizer);
        }

        let mut dataset = Self::default();
        for (i, path) in paths.iter().enumerate() {
            tracing::info!(
                file = i + 1,
                total = paths.len(),
                path = %path.display(),
                "Reading source file"
            );
            dataset.extend(Self::from_file(source, path, &assembler)?);
        }
        tracing::info!(
            files = paths.len(),
            events = dataset.len(),
            "Built dataset"
        );
        Ok(dataset)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Append another dataset's records after this one's.
    pub fn extend(&mut self, other: MeteorDataset) {
        self.records.extend(other.records);
    }

    /// Concatenate two datasets, `self` first.
    pub fn concat(mut self, other: MeteorDataset) -> Self {
        self.extend(other);
        self
    }

    pub fn summary(&self) -> DatasetSummary {
        let events = self.records.len();
        let lengths: Vec<usize> = self.records.iter().map(Record::len).collect();
        let candidates: usize = lengths.iter().sum();
        let mean = |total: f64| if events == 0 { 0.0 } else { total / events as f64 };

        DatasetSummary {
            events,
            candidates,
            min_candidates: lengths.iter().copied().min().unwrap_or(0),
            max_candidates: lengths.iter().copied().max().unwrap_or(0),
            mean_candidates: mean(candidates as f64),
            empty_events: lengths.iter().filter(|&&n| n == 0).count(),
            mean_target_met_magnitude: mean(
                self.records
                    .iter()
                    .map(|r| r.target_met_magnitude() as f64)
                    .sum(),
            ),
            mean_weight: mean(self.records.iter().map(|r| r.weight() as f64).sum()),
        }
    }
}

impl Dataset<Record> for MeteorDataset {
    fn get(&self, index: usize) -> Option<Record> {
        self.records.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

impl<'a> IntoIterator for &'a MeteorDataset {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
