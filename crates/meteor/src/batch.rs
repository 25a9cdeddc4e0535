//! Collation of records into padded, masked tensor batches.

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;
use serde::Serialize;

use crate::bridge::{pad_ids, pad_rows, rows_to_tensor, values_to_tensor};
use crate::encoding::{CONT_NUM_FEATURES, TARGET_NUM_FEATURES};
use crate::error::{MeteorError, Result};
use crate::record::Record;

/// A stacked batch of records.
///
/// Per-candidate tensors are padded with zeros to the longest record in the
/// batch. `candidate_mask` is true where the type id is non-zero and
/// `candidate_length` counts those entries per record.
#[derive(Debug, Clone)]
pub struct MeteorBatch<B: Backend> {
    /// `[batch, max_len, CONT_NUM_FEATURES]`
    pub candidate_features: Tensor<B, 3>,
    /// `[batch, max_len]`
    pub candidate_type_id: Tensor<B, 2, Int>,
    /// `[batch, max_len]`
    pub candidate_charge_id: Tensor<B, 2, Int>,
    /// `[batch, max_len, TARGET_NUM_FEATURES]`
    pub raw_candidate_px_py: Tensor<B, 3>,
    /// `[batch, max_len]`
    pub candidate_mask: Tensor<B, 2, Bool>,
    /// `[batch]`
    pub candidate_length: Tensor<B, 1, Int>,
    /// `[batch, TARGET_NUM_FEATURES]`
    pub target_met: Tensor<B, 2>,
    /// `[batch]`
    pub target_met_magnitude: Tensor<B, 1>,
    /// `[batch, TARGET_NUM_FEATURES]`
    pub reference_met: Tensor<B, 2>,
    /// `[batch]`
    pub weight: Tensor<B, 1>,
}

/// Tensor dimensions of a batch, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchShapes {
    pub candidate_features: [usize; 3],
    pub candidate_type_id: [usize; 2],
    pub candidate_charge_id: [usize; 2],
    pub raw_candidate_px_py: [usize; 3],
    pub candidate_mask: [usize; 2],
    pub candidate_length: [usize; 1],
    pub target_met: [usize; 2],
    pub target_met_magnitude: [usize; 1],
    pub reference_met: [usize; 2],
    pub weight: [usize; 1],
}

impl<B: Backend> MeteorBatch<B> {
    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.weight.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Padded candidate length of the batch.
    pub fn max_candidates(&self) -> usize {
        self.candidate_type_id.dims()[1]
    }

    pub fn shapes(&self) -> BatchShapes {
        BatchShapes {
            candidate_features: self.candidate_features.dims(),
            candidate_type_id: self.candidate_type_id.dims(),
            candidate_charge_id: self.candidate_charge_id.dims(),
            raw_candidate_px_py: self.raw_candidate_px_py.dims(),
            candidate_mask: self.candidate_mask.dims(),
            candidate_length: self.candidate_length.dims(),
            target_met: self.target_met.dims(),
            target_met_magnitude: self.target_met_magnitude.dims(),
            reference_met: self.reference_met.dims(),
            weight: self.weight.dims(),
        }
    }
}

/// Collate records into one batch, failing on an empty list.
pub fn try_collate<B: Backend>(records: &[Record], device: &B::Device) -> Result<MeteorBatch<B>> {
    if records.is_empty() {
        return Err(MeteorError::EmptyBatch);
    }
    let max_len = records.iter().map(Record::len).max().unwrap_or(0);

    let features: Vec<&[[f32; CONT_NUM_FEATURES]]> =
        records.iter().map(Record::candidate_features).collect();
    let px_py: Vec<&[[f32; TARGET_NUM_FEATURES]]> =
        records.iter().map(Record::raw_candidate_px_py).collect();
    let type_ids: Vec<&[u8]> = records.iter().map(Record::candidate_type_id).collect();
    let charge_ids: Vec<&[u8]> = records.iter().map(Record::candidate_charge_id).collect();

    let candidate_type_id = pad_ids::<B>(&type_ids, max_len, device);
    let candidate_mask = candidate_type_id.clone().not_equal_elem(0);
    let candidate_length = candidate_mask.clone().int().sum_dim(1).squeeze::<1>(1);

    let target_met: Vec<[f32; TARGET_NUM_FEATURES]> =
        records.iter().map(Record::target_met).collect();
    let reference_met: Vec<[f32; TARGET_NUM_FEATURES]> =
        records.iter().map(Record::reference_met).collect();
    let magnitude: Vec<f32> = records.iter().map(Record::target_met_magnitude).collect();
    let weight: Vec<f32> = records.iter().map(Record::weight).collect();

    Ok(MeteorBatch {
        candidate_features: pad_rows::<B, CONT_NUM_FEATURES>(&features, max_len, device),
        candidate_type_id,
        candidate_charge_id: pad_ids::<B>(&charge_ids, max_len, device),
        raw_candidate_px_py: pad_rows::<B, TARGET_NUM_FEATURES>(&px_py, max_len, device),
        candidate_mask,
        candidate_length,
        target_met: rows_to_tensor::<B, TARGET_NUM_FEATURES>(&target_met, device),
        target_met_magnitude: values_to_tensor::<B>(&magnitude, device),
        reference_met: rows_to_tensor::<B, TARGET_NUM_FEATURES>(&reference_met, device),
        weight: values_to_tensor::<B>(&weight, device),
    })
}

/// Collate records into one batch.
///
/// # Panics
/// Panics if `records` is empty.
pub fn collate<B: Backend>(records: &[Record], device: &B::Device) -> MeteorBatch<B> {
    match try_collate(records, device) {
        Ok(batch) => batch,
        Err(e) => panic!("collate failed: {e}"),
    }
}

/// Burn batcher over [`Record`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeteorBatcher;

impl<B: Backend> Batcher<B, Record, MeteorBatch<B>> for MeteorBatcher {
    /// # Panics
    /// Panics if `items` is empty.
    fn batch(&self, items: Vec<Record>, device: &B::Device) -> MeteorBatch<B> {
        collate(&items, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordParts;
    use burn::backend::ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn record(types: &[u8], weight: f32) -> Record {
        let n = types.len();
        Record::new(RecordParts {
            candidate_features: (0..n).map(|i| [i as f32 + 1.0, 0.5, 0.1, 1.0]).collect(),
            candidate_type_id: types.to_vec(),
            candidate_charge_id: vec![2; n],
            raw_candidate_px_py: (0..n).map(|i| [i as f32 + 1.0, 0.5]).collect(),
            target_met: [weight, -weight],
            target_met_magnitude: weight * 2.0,
            reference_met: [0.0, 1.0],
            weight,
        })
        .unwrap()
    }

    fn ints(t: Tensor<TestBackend, 1, Int>) -> Vec<i64> {
        t.into_data().convert::<i64>().to_vec().unwrap()
    }

    fn bools(t: Tensor<TestBackend, 2, Bool>) -> Vec<bool> {
        t.into_data().to_vec().unwrap()
    }

    #[test]
    fn test_shapes_use_batch_local_max() {
        let device = Default::default();
        let records = vec![record(&[1, 3], 1.0), record(&[5], 2.0), record(&[], 3.0)];
        let batch = collate::<TestBackend>(&records, &device);

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.max_candidates(), 2);
        let shapes = batch.shapes();
        assert_eq!(shapes.candidate_features, [3, 2, 4]);
        assert_eq!(shapes.raw_candidate_px_py, [3, 2, 2]);
        assert_eq!(shapes.candidate_mask, [3, 2]);
        assert_eq!(shapes.target_met, [3, 2]);
        assert_eq!(shapes.weight, [3]);
    }

    #[test]
    fn test_mask_and_length_match_records() {
        let device = Default::default();
        let records = vec![record(&[1, 3, 2], 1.0), record(&[5], 2.0), record(&[], 3.0)];
        let batch = collate::<TestBackend>(&records, &device);

        assert_eq!(ints(batch.candidate_length.clone()), vec![3, 1, 0]);
        assert_eq!(
            bools(batch.candidate_mask.clone()),
            vec![true, true, true, true, false, false, false, false, false]
        );
    }

    #[test]
    fn test_padding_is_zero() {
        let device = Default::default();
        let records = vec![record(&[1, 1], 1.0), record(&[4], 2.0)];
        let batch = collate::<TestBackend>(&records, &device);

        let features: Vec<f32> = batch.candidate_features.into_data().to_vec().unwrap();
        assert_eq!(&features[12..16], &[0.0, 0.0, 0.0, 0.0]);
        let charge: Vec<i64> = batch
            .candidate_charge_id
            .into_data()
            .convert::<i64>()
            .to_vec()
            .unwrap();
        assert_eq!(charge, vec![2, 2, 2, 0]);
    }

    #[test]
    fn test_fixed_fields_stacked_in_order() {
        let device = Default::default();
        let records = vec![record(&[1], 1.5), record(&[2], 2.5)];
        let batch = collate::<TestBackend>(&records, &device);

        let weight: Vec<f32> = batch.weight.into_data().to_vec().unwrap();
        assert_eq!(weight, vec![1.5, 2.5]);
        let magnitude: Vec<f32> = batch.target_met_magnitude.into_data().to_vec().unwrap();
        assert_eq!(magnitude, vec![3.0, 5.0]);
        let target: Vec<f32> = batch.target_met.into_data().to_vec().unwrap();
        assert_eq!(target, vec![1.5, -1.5, 2.5, -2.5]);
    }

    #[test]
    fn test_all_empty_records() {
        let device = Default::default();
        let records = vec![record(&[], 1.0), record(&[], 2.0)];
        let batch = collate::<TestBackend>(&records, &device);
        assert_eq!(batch.max_candidates(), 0);
        assert_eq!(batch.shapes().candidate_features, [2, 0, 4]);
    }

    #[test]
    fn test_empty_batch_is_error() {
        let device = Default::default();
        assert!(matches!(
            try_collate::<TestBackend>(&[], &device),
            Err(MeteorError::EmptyBatch)
        ));
    }

    #[test]
    fn test_batcher_impl() {
        let device = Default::default();
        let batcher = MeteorBatcher;
        let batch: MeteorBatch<TestBackend> =
            batcher.batch(vec![record(&[1, 2], 1.0), record(&[3], 1.0)], &device);
        assert_eq!(ints(batch.candidate_length), vec![2, 1]);
    }
}
