//! Tensor bridge: conversions between per-event Rust vectors and burn tensors.
//!
//! Ragged per-candidate sequences are padded into batch-local buffers: each
//! row is copied into the leading positions and the remainder stays zero.

use burn::prelude::*;
use burn::tensor::TensorData;

use crate::error::{MeteorError, Result};

/// Stack fixed-width rows into a `[rows, F]` tensor.
pub fn rows_to_tensor<B: Backend, const F: usize>(
    rows: &[[f32; F]],
    device: &B::Device,
) -> Tensor<B, 2> {
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Tensor::from_data(TensorData::new(flat, [rows.len(), F]), device)
}

/// Stack scalars into a `[n]` tensor.
pub fn values_to_tensor<B: Backend>(values: &[f32], device: &B::Device) -> Tensor<B, 1> {
    Tensor::from_data(TensorData::new(values.to_vec(), [values.len()]), device)
}

/// Pad ragged row sequences into a zero-filled `[batch, max_len, F]` tensor.
///
/// # Panics
/// Panics if any sequence is longer than `max_len`.
pub fn pad_rows<B: Backend, const F: usize>(
    sequences: &[&[[f32; F]]],
    max_len: usize,
    device: &B::Device,
) -> Tensor<B, 3> {
    let mut arena = vec![0.0_f32; sequences.len() * max_len * F];
    for (i, seq) in sequences.iter().enumerate() {
        assert!(
            seq.len() <= max_len,
            "sequence {i} has length {}, max is {max_len}",
            seq.len()
        );
        let start = i * max_len * F;
        for (j, row) in seq.iter().enumerate() {
            arena[start + j * F..start + (j + 1) * F].copy_from_slice(row);
        }
    }
    Tensor::from_data(TensorData::new(arena, [sequences.len(), max_len, F]), device)
}

/// Pad ragged id sequences into a zero-filled `[batch, max_len]` int tensor.
///
/// # Panics
/// Panics if any sequence is longer than `max_len`.
pub fn pad_ids<B: Backend>(
    sequences: &[&[u8]],
    max_len: usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let mut arena = vec![0_i64; sequences.len() * max_len];
    for (i, seq) in sequences.iter().enumerate() {
        assert!(
            seq.len() <= max_len,
            "sequence {i} has length {}, max is {max_len}",
            seq.len()
        );
        for (j, &id) in seq.iter().enumerate() {
            arena[i * max_len + j] = i64::from(id);
        }
    }
    Tensor::from_data(TensorData::new(arena, [sequences.len(), max_len]), device)
}

/// Extract the values of a float tensor in row-major order.
pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| MeteorError::Normalization(format!("cannot read tensor data: {e:?}")))
}

/// Split a `[rows, F]` tensor back into fixed-width rows.
pub fn tensor_to_rows<B: Backend, const F: usize>(tensor: Tensor<B, 2>) -> Result<Vec<[f32; F]>> {
    let flat = tensor_to_vec(tensor)?;
    Ok(flat
        .chunks_exact(F)
        .map(|chunk| {
            let mut row = [0.0; F];
            row.copy_from_slice(chunk);
            row
        })
        .collect())
}

/// Cut a padded `[batch, max_len, F]` tensor back to the given lengths.
pub fn unpad_rows<B: Backend, const F: usize>(
    tensor: Tensor<B, 3>,
    lengths: &[usize],
) -> Result<Vec<Vec<[f32; F]>>> {
    let [batch, max_len, width] = tensor.dims();
    if batch != lengths.len() || width != F {
        return Err(MeteorError::Normalization(format!(
            "cannot unpad tensor of shape [{batch}, {max_len}, {width}] \
             into {} sequences of width {F}",
            lengths.len()
        )));
    }
    let flat = tensor_to_vec(tensor)?;
    let mut out = Vec::with_capacity(batch);
    for (i, &len) in lengths.iter().enumerate() {
        if len > max_len {
            return Err(MeteorError::Normalization(format!(
                "sequence {i} has length {len}, padded length is {max_len}"
            )));
        }
        let start = i * max_len * F;
        let seq = flat[start..start + len * F]
            .chunks_exact(F)
            .map(|chunk| {
                let mut row = [0.0; F];
                row.copy_from_slice(chunk);
                row
            })
            .collect();
        out.push(seq);
    }
    Ok(out)
}
