//! Feature normalization and the padding-aware round trip around it.
//!
//! A [`Normalizer`] works on dense tensors. Ragged per-event sequences go
//! through [`transform_ragged`], which pads them into one tensor, applies the
//! transform and cuts every sequence back to the length it had before
//! padding.

use std::path::Path;

use burn::prelude::*;
use burn::tensor::TensorData;
use serde::{Deserialize, Serialize};

use crate::bridge::{pad_rows, rows_to_tensor, tensor_to_rows, unpad_rows};
use crate::encoding::{CONT_NUM_FEATURES, TARGET_NUM_FEATURES};
use crate::error::{MeteorError, Result};
use crate::record::Record;

/// Shape-preserving rescaling of continuous inputs.
pub trait Normalizer<B: Backend> {
    /// Rescale `[events, candidates, CONT_NUM_FEATURES]` candidate features.
    /// Trailing zero rows may be padding; their outputs are discarded.
    fn transform_candidate_features(&self, features: Tensor<B, 3>) -> Tensor<B, 3>;

    /// Rescale `[rows, TARGET_NUM_FEATURES]` MET-like vectors.
    fn transform_met(&self, met: Tensor<B, 2>) -> Tensor<B, 2>;
}

/// Pad `sequences`, apply `transform` to the padded tensor and unpad.
///
/// Lengths are captured before padding and used for unpadding, so padded
/// slots never leak into the result. A transform that changes the tensor
/// shape is an error.
pub fn transform_ragged<B, const F: usize, T>(
    sequences: &[Vec<[f32; F]>],
    device: &B::Device,
    transform: T,
) -> Result<Vec<Vec<[f32; F]>>>
where
    B: Backend,
    T: FnOnce(Tensor<B, 3>) -> Tensor<B, 3>,
{
    let lengths: Vec<usize> = sequences.iter().map(Vec::len).collect();
    let max_len = lengths.iter().copied().max().unwrap_or(0);
    if max_len == 0 {
        return Ok(sequences.to_vec());
    }

    let views: Vec<&[[f32; F]]> = sequences.iter().map(Vec::as_slice).collect();
    let padded = pad_rows::<B, F>(&views, max_len, device);
    let expected = padded.dims();
    let transformed = transform(padded);
    let found = transformed.dims();
    if found != expected {
        return Err(MeteorError::Normalization(format!(
            "transform changed shape from {expected:?} to {found:?}"
        )));
    }
    unpad_rows::<B, F>(transformed, &lengths)
}

/// Apply `transform` to fixed-width rows stacked as `[rows, F]`.
pub fn transform_rows<B, const F: usize, T>(
    rows: &[[f32; F]],
    device: &B::Device,
    transform: T,
) -> Result<Vec<[f32; F]>>
where
    B: Backend,
    T: FnOnce(Tensor<B, 2>) -> Tensor<B, 2>,
{
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let input = rows_to_tensor::<B, F>(rows, device);
    let expected = input.dims();
    let transformed = transform(input);
    let found = transformed.dims();
    if found != expected {
        return Err(MeteorError::Normalization(format!(
            "transform changed shape from {expected:?} to {found:?}"
        )));
    }
    tensor_to_rows::<B, F>(transformed)
}

/// Apply a row-wise `transform` to every row of ragged sequences at once.
///
/// Rows are concatenated across sequences, transformed as one `[rows, F]`
/// tensor and split back by the input lengths.
pub fn transform_ragged_rows<B, const F: usize, T>(
    sequences: &[Vec<[f32; F]>],
    device: &B::Device,
    transform: T,
) -> Result<Vec<Vec<[f32; F]>>>
where
    B: Backend,
    T: FnOnce(Tensor<B, 2>) -> Tensor<B, 2>,
{
    let lengths: Vec<usize> = sequences.iter().map(Vec::len).collect();
    let flat: Vec<[f32; F]> = sequences.iter().flatten().copied().collect();
    let transformed = transform_rows::<B, F, T>(&flat, device, transform)?;

    let mut rows = transformed.into_iter();
    Ok(lengths
        .iter()
        .map(|&len| rows.by_ref().take(len).collect())
        .collect())
}

/// Smallest scale used when a feature has (near) zero spread.
pub const MIN_SCALE: f32 = 1e-6;

/// Per-feature `(x - shift) / scale` normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffineNormalizer {
    pub candidate_shift: [f32; CONT_NUM_FEATURES],
    pub candidate_scale: [f32; CONT_NUM_FEATURES],
    pub met_shift: [f32; TARGET_NUM_FEATURES],
    pub met_scale: [f32; TARGET_NUM_FEATURES],
}

impl Default for AffineNormalizer {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineNormalizer {
    pub fn identity() -> Self {
        Self {
            candidate_shift: [0.0; CONT_NUM_FEATURES],
            candidate_scale: [1.0; CONT_NUM_FEATURES],
            met_shift: [0.0; TARGET_NUM_FEATURES],
            met_scale: [1.0; TARGET_NUM_FEATURES],
        }
    }

    /// Fit mean and standard deviation from un-normalized records.
    ///
    /// Candidate statistics skip absent candidates (type id 0). MET
    /// statistics come from `target_met`.
    pub fn fit(records: &[Record]) -> Result<Self> {
        if records.is_empty() {
            return Err(MeteorError::Normalization(
                "cannot fit a normalizer on zero records".into(),
            ));
        }
        let candidates: Vec<[f32; CONT_NUM_FEATURES]> = records
            .iter()
            .flat_map(|r| {
                r.candidate_features()
                    .iter()
                    .zip(r.candidate_type_id())
                    .filter(|(_, &t)| t != 0)
                    .map(|(f, _)| *f)
            })
            .collect();
        if candidates.is_empty() {
            return Err(MeteorError::Normalization(
                "cannot fit a normalizer on records without candidates".into(),
            ));
        }
        let met: Vec<[f32; TARGET_NUM_FEATURES]> =
            records.iter().map(Record::target_met).collect();

        let (candidate_shift, candidate_scale) = mean_std(&candidates);
        let (met_shift, met_scale) = mean_std(&met);
        let fitted = Self {
            candidate_shift,
            candidate_scale,
            met_shift,
            met_scale,
        };
        tracing::info!(
            events = records.len(),
            candidates = candidates.len(),
            candidate_shift = ?fitted.candidate_shift,
            candidate_scale = ?fitted.candidate_scale,
            met_scale = ?fitted.met_scale,
            "Fitted affine normalizer"
        );
        Ok(fitted)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(path = %path.display(), "Saved normalizer");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let normalizer: Self = serde_json::from_str(&contents)?;
        if normalizer
            .candidate_scale
            .iter()
            .chain(&normalizer.met_scale)
            .any(|s| !s.is_finite() || *s == 0.0)
        {
            return Err(MeteorError::Normalization(format!(
                "normalizer at {} has a zero or non-finite scale",
                path.display()
            )));
        }
        tracing::info!(path = %path.display(), "Loaded normalizer");
        Ok(normalizer)
    }
}

fn mean_std<const F: usize>(rows: &[[f32; F]]) -> ([f32; F], [f32; F]) {
    let n = rows.len() as f64;
    let mut mean = [0.0_f64; F];
    for row in rows {
        for (m, &x) in mean.iter_mut().zip(row) {
            *m += x as f64;
        }
    }
    mean.iter_mut().for_each(|m| *m /= n);

    let mut var = [0.0_f64; F];
    for row in rows {
        for ((v, &x), m) in var.iter_mut().zip(row).zip(&mean) {
            *v += (x as f64 - m).powi(2);
        }
    }

    let shift = mean.map(|m| m as f32);
    let mut scale = [1.0_f32; F];
    for (s, v) in scale.iter_mut().zip(var) {
        *s = ((v / n).sqrt() as f32).max(MIN_SCALE);
    }
    (shift, scale)
}

fn affine<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    shift: &[f32],
    scale: &[f32],
) -> Tensor<B, D> {
    let device = input.device();
    let mut shape = [1; D];
    shape[D - 1] = shift.len();
    let shift = Tensor::<B, 1>::from_data(TensorData::new(shift.to_vec(), [shift.len()]), &device)
        .reshape(shape);
    let scale = Tensor::<B, 1>::from_data(TensorData::new(scale.to_vec(), [scale.len()]), &device)
        .reshape(shape);
    (input - shift) / scale
}

impl<B: Backend> Normalizer<B> for AffineNormalizer {
    fn transform_candidate_features(&self, features: Tensor<B, 3>) -> Tensor<B, 3> {
        affine(features, &self.candidate_shift, &self.candidate_scale)
    }

    fn transform_met(&self, met: Tensor<B, 2>) -> Tensor<B, 2> {
        affine(met, &self.met_shift, &self.met_scale)
    }
}
