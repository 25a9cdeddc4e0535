//! One training example per physics event.

use serde::Serialize;

use crate::encoding::{CONT_NUM_FEATURES, TARGET_NUM_FEATURES};
use crate::error::{MeteorError, Result};

/// Unvalidated fields of a [`Record`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordParts {
    /// `(px, py, eta, puppi weight)` per selected candidate.
    pub candidate_features: Vec<[f32; CONT_NUM_FEATURES]>,
    pub candidate_type_id: Vec<u8>,
    pub candidate_charge_id: Vec<u8>,
    /// Un-normalized `(px, py)` per selected candidate.
    pub raw_candidate_px_py: Vec<[f32; TARGET_NUM_FEATURES]>,
    pub target_met: [f32; TARGET_NUM_FEATURES],
    pub target_met_magnitude: f32,
    pub reference_met: [f32; TARGET_NUM_FEATURES],
    pub weight: f32,
}

/// A validated, immutable event record.
///
/// All per-candidate sequences share one length. Absent candidates carry
/// type id 0, the same as padding, and are masked out at collation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    parts: RecordParts,
}

impl Record {
    pub fn new(parts: RecordParts) -> Result<Self> {
        let len = parts.candidate_features.len();
        let lengths = [
            ("candidate_type_id", parts.candidate_type_id.len()),
            ("candidate_charge_id", parts.candidate_charge_id.len()),
            ("raw_candidate_px_py", parts.raw_candidate_px_py.len()),
        ];
        for (field, found) in lengths {
            if found != len {
                return Err(MeteorError::RaggedMismatch {
                    field: field.to_string(),
                    expected: len,
                    found,
                });
            }
        }
        Ok(Self { parts })
    }

    /// Number of candidates in the record.
    pub fn len(&self) -> usize {
        self.parts.candidate_features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn candidate_features(&self) -> &[[f32; CONT_NUM_FEATURES]] {
        &self.parts.candidate_features
    }

    pub fn candidate_type_id(&self) -> &[u8] {
        &self.parts.candidate_type_id
    }

    pub fn candidate_charge_id(&self) -> &[u8] {
        &self.parts.candidate_charge_id
    }

    pub fn raw_candidate_px_py(&self) -> &[[f32; TARGET_NUM_FEATURES]] {
        &self.parts.raw_candidate_px_py
    }

    pub fn target_met(&self) -> [f32; TARGET_NUM_FEATURES] {
        self.parts.target_met
    }

    pub fn target_met_magnitude(&self) -> f32 {
        self.parts.target_met_magnitude
    }

    pub fn reference_met(&self) -> [f32; TARGET_NUM_FEATURES] {
        self.parts.reference_met
    }

    pub fn weight(&self) -> f32 {
        self.parts.weight
    }

    pub fn into_parts(self) -> RecordParts {
        self.parts
    }
}
